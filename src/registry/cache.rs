//! In-process cache of resolved packages.
//!
//! Keyed by `(community, full_name)`. Entries never expire; the cache lives
//! as long as the [`super::RegistryClient`] that owns it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Package;

#[derive(Debug, Default)]
pub struct PackageCache {
    entries: RwLock<HashMap<(String, String), Arc<Package>>>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, community: &str, full_name: &str) -> Option<Arc<Package>> {
        self.entries
            .read()
            .get(&(community.to_string(), full_name.to_string()))
            .cloned()
    }

    /// Stores a package. Concurrent inserts for the same key: last write wins.
    pub fn insert(&self, community: &str, full_name: &str, package: Arc<Package>) {
        self.entries
            .write()
            .insert((community.to_string(), full_name.to_string()), package);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
