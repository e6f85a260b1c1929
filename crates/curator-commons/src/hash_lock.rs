//! Short-lived named locks keyed by content hash.
//!
//! Two workers racing to upload the same bytes would trip MediaWiki's own
//! duplicate detection halfway through a stash; the loser takes a
//! `HashLock` error instead and comes back through the retry driver.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct HashLockRegistry {
    held: Mutex<HashSet<String>>,
}

impl HashLockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Try to take the lock for a content hash. `None` means another holder
    /// owns it right now.
    pub fn try_acquire(self: &Arc<Self>, sha1: &str) -> Option<HashLockGuard> {
        let mut held = self.held.lock().unwrap();
        if !held.insert(sha1.to_string()) {
            return None;
        }
        Some(HashLockGuard {
            registry: Arc::clone(self),
            sha1: sha1.to_string(),
        })
    }

    fn release(&self, sha1: &str) {
        self.held.lock().unwrap().remove(sha1);
    }
}

/// Releases the lock on drop, so every exit path gives it back.
pub struct HashLockGuard {
    registry: Arc<HashLockRegistry>,
    sha1: String,
}

impl Drop for HashLockGuard {
    fn drop(&mut self) {
        self.registry.release(&self.sha1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let registry = HashLockRegistry::new();
        let guard = registry.try_acquire("abc").unwrap();
        assert!(registry.try_acquire("abc").is_none());
        // A different hash is independent.
        assert!(registry.try_acquire("def").is_some());
        drop(guard);
        assert!(registry.try_acquire("abc").is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = HashLockRegistry::new();
        {
            let _guard = registry.try_acquire("abc").unwrap();
        }
        assert!(registry.try_acquire("abc").is_some());
    }
}
