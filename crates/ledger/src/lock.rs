//! Posting lock check.
//!
//! Posting and locking belong to the accounting layer; the ledger only asks
//! whether a document is locked before it writes.

use std::collections::HashSet;
use std::sync::RwLock;

pub trait PostingLock: Send + Sync + 'static {
    fn is_locked(&self, document_id: &str) -> bool;
}

/// Nothing is ever locked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverLocked;

impl PostingLock for NeverLocked {
    fn is_locked(&self, _document_id: &str) -> bool {
        false
    }
}

/// An explicit set of locked document ids.
#[derive(Debug, Default)]
pub struct StaticLocks {
    locked: RwLock<HashSet<String>>,
}

impl StaticLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self, document_id: &str) {
        self.locked
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(document_id.to_string());
    }

    pub fn unlock(&self, document_id: &str) {
        self.locked
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(document_id);
    }
}

impl PostingLock for StaticLocks {
    fn is_locked(&self, document_id: &str) -> bool {
        self.locked
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains(document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_locks_toggle() {
        let locks = StaticLocks::new();
        assert!(!locks.is_locked("inv-1"));
        locks.lock("inv-1");
        assert!(locks.is_locked("inv-1"));
        assert!(!locks.is_locked("inv-2"));
        locks.unlock("inv-1");
        assert!(!locks.is_locked("inv-1"));
    }
}
