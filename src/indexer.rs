//! Manifest generation for a local asset tree.
//!
//! Every directory below the root goes to `dirs` and every regular file to
//! `files`, as `/`-separated paths relative to the root, sorted. The
//! top-level `server` subtree holds server-only data and is left out, as is
//! a manifest already sitting at the root.

use std::path::{Component, Path};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::config::DEFAULT_MANIFEST_NAME;
use crate::models::Manifest;

/// Top-level directory never shipped to clients.
pub const EXCLUDED_DIR: &str = "server";

pub fn build_manifest(root: &Path) -> Result<Manifest> {
    if !root.is_dir() {
        anyhow::bail!("Asset root {} is not a directory", root.display());
    }

    let mut manifest = Manifest::default();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == EXCLUDED_DIR));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_broken_link(&err) => {
                tracing::warn!("Skipping unreadable link: {}", err);
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to walk {}", root.display()))
            }
        };
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{} is outside the asset root", entry.path().display()))?;
        let path = to_manifest_path(relative);

        if entry.file_type().is_dir() {
            manifest.directories.push(path);
        } else if entry.file_type().is_file() && path != DEFAULT_MANIFEST_NAME {
            manifest.files.push(path);
        }
    }

    manifest.directories.sort();
    manifest.files.sort();
    Ok(manifest)
}

/// Generate the manifest for `root` and write it as JSON to `output`.
pub fn write_manifest(root: &Path, output: &Path) -> Result<Manifest> {
    let manifest = build_manifest(root)?;
    let json = serde_json::to_string(&manifest).context("Failed to serialize manifest")?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write manifest to {}", output.display()))?;
    tracing::info!(
        "Wrote manifest with {} directories and {} files to {}",
        manifest.directories.len(),
        manifest.files.len(),
        output.display()
    );
    Ok(manifest)
}

/// Symlink loops and links whose target is gone.
fn is_broken_link(err: &walkdir::Error) -> bool {
    err.loop_ancestor().is_some()
        || err
            .io_error()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

fn to_manifest_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn asset_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("voxel/sprite")).unwrap();
        fs::create_dir_all(root.join("server/npc")).unwrap();
        fs::write(root.join("voxel/sprite/grass.vox"), b"vox").unwrap();
        fs::write(root.join("voxel/base.ron"), b"()").unwrap();
        fs::write(root.join("server/npc/names.ron"), b"[]").unwrap();
        fs::write(root.join("readme.txt"), b"hello").unwrap();
        dir
    }

    #[test]
    fn lists_directories_and_files_relative_to_root() {
        let dir = asset_tree();
        let manifest = build_manifest(dir.path()).unwrap();

        assert_eq!(manifest.directories, vec!["voxel", "voxel/sprite"]);
        assert_eq!(
            manifest.files,
            vec!["readme.txt", "voxel/base.ron", "voxel/sprite/grass.vox"]
        );
    }

    #[test]
    fn skips_server_subtree() {
        let dir = asset_tree();
        let manifest = build_manifest(dir.path()).unwrap();

        assert!(manifest.directories.iter().all(|d| !d.starts_with("server")));
        assert!(manifest.files.iter().all(|f| !f.starts_with("server")));
    }

    #[test]
    fn nested_server_directory_is_kept() {
        let dir = asset_tree();
        fs::create_dir_all(dir.path().join("voxel/server")).unwrap();
        let manifest = build_manifest(dir.path()).unwrap();
        assert!(manifest.directories.contains(&"voxel/server".to_string()));
    }

    #[test]
    fn written_manifest_is_not_listed_on_rebuild() {
        let dir = asset_tree();
        let output = dir.path().join(DEFAULT_MANIFEST_NAME);
        write_manifest(dir.path(), &output).unwrap();

        let parsed: Manifest = serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
        assert_eq!(parsed.files.len(), 3);

        let rebuilt = build_manifest(dir.path()).unwrap();
        assert!(!rebuilt.files.contains(&DEFAULT_MANIFEST_NAME.to_string()));
    }

    #[test]
    fn empty_tree_yields_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = build_manifest(dir.path()).unwrap();
        assert!(manifest.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loops_and_dangling_links_are_skipped() {
        let dir = asset_tree();
        let root = dir.path();
        std::os::unix::fs::symlink(root, root.join("voxel/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("gone.png"), root.join("dangling.png")).unwrap();

        let manifest = build_manifest(root).unwrap();

        assert_eq!(manifest.directories, vec!["voxel", "voxel/sprite"]);
        assert_eq!(
            manifest.files,
            vec!["readme.txt", "voxel/base.ron", "voxel/sprite/grass.vox"]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(build_manifest(&dir.path().join("missing")).is_err());
    }
}
