use super::handle::LocalFile;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

const SCHEME_PREFIX: &str = "blob:localfile/";

/// Process-local table of ephemeral resource URLs.
///
/// URLs minted here are meaningless after a restart; every URL must be
/// revoked once nothing references it.
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    entries: Mutex<HashMap<String, LocalFile>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, file: LocalFile) -> String {
        let url = format!("{SCHEME_PREFIX}{}", Uuid::new_v4());
        self.entries.lock().insert(url.clone(), file);
        url
    }

    /// A URL that is revoked when the guard is dropped.
    pub fn scoped(&self, file: LocalFile) -> ScopedObjectUrl<'_> {
        let url = self.create(file);
        ScopedObjectUrl {
            registry: self,
            url,
        }
    }

    pub fn resolve(&self, url: &str) -> Option<LocalFile> {
        self.entries.lock().get(url).cloned()
    }

    /// Returns false if the URL was unknown, e.g. minted by an earlier process.
    pub fn revoke(&self, url: &str) -> bool {
        self.entries.lock().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ScopedObjectUrl<'a> {
    registry: &'a ObjectUrlRegistry,
    url: String,
}

impl ScopedObjectUrl<'_> {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ScopedObjectUrl<'_> {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}
