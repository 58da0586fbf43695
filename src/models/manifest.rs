use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delimiter that replaces every path separator in a [`ResourceKey`].
pub const KEY_DELIMITER: char = '.';

const SEPARATORS: &[char] = &['/', '\\'];

/// A normalized, separator-agnostic identifier for a resource path.
///
/// `textures/a.png` and `textures\a.png` both become `textures.a.png`.
/// Normalizing an already-normalized key returns it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn normalize(path: &str) -> Self {
        Self(path.replace(SEPARATORS, &KEY_DELIMITER.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [`ResourceKey::normalize`].
pub fn normalize(path: &str) -> ResourceKey {
    ResourceKey::normalize(path)
}

/// The declared set of directories and files a runtime needs.
///
/// Wire shape is `{ "dirs": [...], "files": [...] }`. Both lists are required;
/// a document missing either, or carrying a non-string entry, fails to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "dirs")]
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

/// Two distinct file paths in one manifest normalize to the same key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("paths '{first}' and '{second}' both normalize to key '{key}'")]
pub struct KeyCollision {
    pub key: ResourceKey,
    pub first: String,
    pub second: String,
}

impl Manifest {
    pub fn new(directories: Vec<String>, files: Vec<String>) -> Self {
        Self { directories, files }
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// Verify that every file path maps to its own key.
    ///
    /// Listing the exact same path twice is also a collision, since the
    /// session would deliver and count that key twice.
    pub fn check_keys(&self) -> Result<(), KeyCollision> {
        let mut seen: HashMap<ResourceKey, &str> = HashMap::with_capacity(self.files.len());
        for path in &self.files {
            let key = ResourceKey::normalize(path);
            if let Some(first) = seen.get(&key) {
                return Err(KeyCollision {
                    key,
                    first: first.to_string(),
                    second: path.clone(),
                });
            }
            seen.insert(key, path);
        }
        Ok(())
    }
}
