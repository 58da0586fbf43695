//! Domain models for the asset preloader.
//!
//! # Core Concepts
//!
//! - [`Manifest`]: The directories and files a runtime needs, fetched once per session.
//! - [`ResourceKey`]: A separator-agnostic identifier derived from a file path. It is
//!   the lookup key in the persistent store and the name the runtime sees.
//! - [`CacheRecord`]: Resource bytes persisted under their key, never invalidated.
//! - [`Progress`]: Per-session completion counters, published as files resolve.
//! - [`SessionState`]: Where a load session currently is in its lifecycle.

mod manifest;
mod progress;
mod record;

pub use manifest::*;
pub use progress::*;
pub use record::*;
