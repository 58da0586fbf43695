//! Asset preloading for runtimes that need their full resource set up front.
//!
//! A [`LoadOrchestrator`] reconciles the remote manifest against the local
//! [`ResourceStore`], fetches whatever is missing, streams every resource to
//! a [`ConsumerBridge`], and signals it ready once everything has arrived.

pub mod api;
pub mod client;
pub mod config;
pub mod consumer;
pub mod db;
pub mod error;
pub mod indexer;
pub mod models;
pub mod resolver;
pub mod session;

pub use client::{AssetClient, AssetSource};
pub use config::PreloadConfig;
pub use consumer::{AssetRegistry, ConsumerBridge};
pub use db::ResourceStore;
pub use error::SessionError;
pub use resolver::ResourceResolver;
pub use session::{LoadOrchestrator, SessionReport};
