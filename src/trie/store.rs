//! # Concurrent Trie Store
//!
//! Wraps the persistent trie for shared use. Readers grab the current
//! root under a short read lock and then work on their own snapshot;
//! writers serialize on a dedicated mutex, compute the new version
//! outside the root lock, and swap it in at the end. A slow writer
//! never blocks readers.

use parking_lot::{Mutex, RwLock};
use std::ops::Deref;
use std::sync::Arc;

use crate::trie::Trie;

/// Keeps a value reachable even after the store has moved on to newer
/// roots.
pub struct ValueGuard<T> {
    value: Arc<T>,
}

impl<T> Deref for ValueGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

pub struct TrieStore<T> {
    root: RwLock<Trie<T>>,
    write_lock: Mutex<()>,
}

impl<T> Default for TrieStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TrieStore<T> {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Trie::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &str) -> Option<ValueGuard<T>> {
        let snapshot = self.root.read().clone();
        snapshot.get_shared(key).map(|value| ValueGuard { value })
    }

    pub fn put(&self, key: &str, value: T) {
        let _writer = self.write_lock.lock();
        let snapshot = self.root.read().clone();
        let next = snapshot.put(key, value);
        *self.root.write() = next;
    }

    pub fn remove(&self, key: &str) {
        let _writer = self.write_lock.lock();
        let snapshot = self.root.read().clone();
        let next = snapshot.remove(key);
        *self.root.write() = next;
    }
}
