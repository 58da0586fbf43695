use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_preloader::api::{self, AssetTree};
use asset_preloader::config::{get_config_path, DEFAULT_MANIFEST_NAME};
use asset_preloader::error::SessionError;
use asset_preloader::models::{Progress, SessionState};
use asset_preloader::{indexer, AssetRegistry, LoadOrchestrator, PreloadConfig, ResourceStore};

#[derive(Parser)]
#[command(name = "preload")]
#[command(about = "Reconcile a remote asset manifest against the local cache and load every resource")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one load session and report the result
    Load {
        /// Base URL of the asset host
        #[arg(long)]
        asset_root: Option<String>,

        /// Resource store path
        #[arg(long)]
        store: Option<PathBuf>,

        /// Maximum simultaneous file fetches
        #[arg(long)]
        concurrency: Option<usize>,

        /// Extra attempts for a failed file fetch
        #[arg(long)]
        retries: Option<u32>,

        /// Write every loaded resource to this directory, named by key
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Generate a manifest for a local asset tree
    Index {
        /// Asset tree root
        dir: PathBuf,

        /// Output file (defaults to <dir>/index.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve a local asset tree over HTTP
    Serve {
        /// Asset tree root
        dir: PathBuf,

        /// Port for HTTP
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the user config file
        #[arg(long)]
        save: bool,
    },
    /// Inspect the resource store
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Print record count and total size
    Stats {
        /// Resource store path
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

/// Initialize tracing with output to stderr (when stdout shows progress) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "asset_preloader=info,tower_http=info".into()),
    );

    if use_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PreloadConfig> {
    match path {
        Some(path) => Ok(PreloadConfig::from_file(path)?.with_env()),
        None => Ok(PreloadConfig::load()),
    }
}

/// Render "N/total" on stdout until the session reaches a terminal state.
async fn render_progress(mut rx: watch::Receiver<Progress>) {
    let mut stdout = std::io::stdout();
    while rx.changed().await.is_ok() {
        let progress = *rx.borrow_and_update();
        match progress.state {
            SessionState::FilesInFlight => {
                let _ = write!(stdout, "\rLoading resources: {}", progress);
                let _ = stdout.flush();
            }
            SessionState::Ready => {
                let _ = write!(stdout, "\r\x1b[2K");
                let _ = stdout.flush();
                break;
            }
            SessionState::Stalled => {
                let _ = writeln!(stdout, "\rLoading resources: {}", progress);
                break;
            }
            SessionState::Failed => {
                let _ = writeln!(stdout, "\rLoading failed: manifest unavailable");
                break;
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(cli.command, Commands::Load { .. });
    init_tracing(use_stderr);

    match cli.command {
        Commands::Load {
            asset_root,
            store,
            concurrency,
            retries,
            export,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(root) = asset_root {
                config.asset_root = root;
            }
            if store.is_some() {
                config.store_path = store;
            }
            if concurrency.is_some() {
                config.concurrency_limit = concurrency;
            }
            if let Some(retries) = retries {
                config.fetch_retries = retries;
            }

            let orchestrator = LoadOrchestrator::from_config(&config)?;
            tracing::info!(
                "Loading assets from {} (store: {})",
                config.asset_root,
                orchestrator.store().location()
            );

            let registry = AssetRegistry::new();
            let renderer = tokio::spawn(render_progress(orchestrator.subscribe()));
            let result = orchestrator.run(&registry).await;
            renderer.await?;

            match result {
                Ok(report) => {
                    println!("Ready: {}", report);
                    if let Some(dir) = export {
                        let written = registry.export_to(&dir)?;
                        println!("Exported {} resources to {}", written, dir.display());
                    }
                }
                Err(SessionError::Incomplete {
                    completed,
                    total,
                    failures,
                }) => {
                    for failure in &failures {
                        eprintln!("  {}: {}", failure.path, failure.reason);
                    }
                    anyhow::bail!(
                        "Loading stalled at {}/{}: {} file(s) could not be fetched",
                        completed,
                        total,
                        failures.len()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Index { dir, output } => {
            let output = output.unwrap_or_else(|| dir.join(DEFAULT_MANIFEST_NAME));
            let manifest = indexer::write_manifest(&dir, &output)?;
            println!(
                "{} directories, {} files -> {}",
                manifest.directories.len(),
                manifest.files.len(),
                output.display()
            );
        }
        Commands::Serve { dir, port } => {
            tracing::info!("Serving assets from {} on port {}", dir.display(), port);

            let app = api::create_router(AssetTree::new(dir));

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!("Asset server listening on http://127.0.0.1:{}/assets", port);

            axum::serve(listener, app).await?;
        }
        Commands::Config { save } => {
            let config = load_config(cli.config.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                config.save()?;
                println!("Saved to {}", get_config_path()?.display());
            }
        }
        Commands::Cache {
            command: CacheCommands::Stats { store },
        } => {
            let config = load_config(cli.config.as_ref())?;
            let store = match store.or(config.store_path) {
                Some(path) => ResourceStore::open(path)?,
                None => ResourceStore::open_default()?,
            };
            println!("Store:     {}", store.location());
            println!("Resources: {}", store.len().await?);
            println!("Bytes:     {}", store.total_bytes().await?);
        }
    }

    Ok(())
}
