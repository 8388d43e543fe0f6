use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// Completed results keyed by the exact prompt string.
///
/// An entry only ever exists for a prompt whose generation succeeded in this session.
pub trait ResultCache: Send + Sync {
    fn get(&self, prompt: &str) -> Option<CacheEntry>;

    fn put(&self, prompt: &str, url: &str);

    fn remove(&self, prompt: &str) -> Option<CacheEntry>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory cache that lives as long as the owning generator
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResultCache for SessionCache {
    fn get(&self, prompt: &str) -> Option<CacheEntry> {
        self.entries.get(prompt).map(|entry| entry.value().clone())
    }

    fn put(&self, prompt: &str, url: &str) {
        self.entries.insert(
            prompt.to_string(),
            CacheEntry {
                url: url.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    fn remove(&self, prompt: &str) -> Option<CacheEntry> {
        self.entries.remove(prompt).map(|(_, entry)| entry)
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
