use super::schema::ImageRecord;
use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;

type Subscriber = Arc<dyn Fn(&[ImageRecord]) + Send + Sync>;

/// Application-wide ordered list of image records.
///
/// Writers hand in a function from the current list to the next one; the last
/// writer wins. Subscribers see every committed list, called outside the lock.
#[derive(Clone, Default)]
pub struct ImageList {
    records: Arc<RwLock<Vec<ImageRecord>>>,
    subscribers: Arc<Mutex<Vec<(u64, Subscriber)>>>,
    next_subscriber: Arc<Mutex<u64>>,
}

impl ImageList {
    pub fn new(records: Vec<ImageRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
            ..Self::default()
        }
    }

    /// Load a list saved by [`ImageList::save`]; a missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let records = serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                Ok(Self::new(records))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*self.records.read())?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Snapshot of the current list.
    pub fn read(&self) -> Vec<ImageRecord> {
        self.records.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<ImageRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(Vec<ImageRecord>) -> Vec<ImageRecord>,
    {
        // `f` works on a copy so a panic inside it leaves the list intact.
        let snapshot = {
            let mut records = self.records.write();
            *records = f(records.clone());
            records.clone()
        };
        let subscribers: Vec<Subscriber> =
            self.subscribers.lock().iter().map(|(_, s)| Arc::clone(s)).collect();
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }

    /// Apply `f` to the record with `id`. Returns false (and changes nothing)
    /// when the record no longer exists.
    pub fn update_record<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ImageRecord),
    {
        let mut found = false;
        self.update(|mut records| {
            if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                f(record);
                found = true;
            }
            records
        });
        found
    }

    pub fn subscribe<F>(&self, f: F) -> u64
    where
        F: Fn(&[ImageRecord]) + Send + Sync + 'static,
    {
        let id = {
            let mut next = self.next_subscriber.lock();
            *next += 1;
            *next
        };
        self.subscribers.lock().push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().retain(|(sid, _)| *sid != id);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ImageList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageList")
            .field("records", &self.len())
            .finish()
    }
}
