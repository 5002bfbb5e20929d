//! Build-scoped record of dev dependencies already invalidated.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::request::DevDepKey;

/// Keys whose runtime caches were cleared during the current build.
///
/// Create one per build and drop it when the build ends. `mark` performs the
/// lookup and insert under one lock, so concurrent callers for the same key
/// see exactly one `true`.
#[derive(Debug, Default)]
pub struct InvalidationLedger {
    invalidated: Mutex<HashSet<DevDepKey>>,
}

impl InvalidationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key`, returning `false` if it was already present.
    pub fn mark(&self, key: DevDepKey) -> bool {
        self.invalidated.lock().insert(key)
    }

    pub fn contains(&self, key: &DevDepKey) -> bool {
        self.invalidated.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.invalidated.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.invalidated.lock().is_empty()
    }
}
