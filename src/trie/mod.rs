//! # Persistent Trie
//!
//! A copy-on-write trie over string keys. Mutation never touches an
//! existing node: `put` and `remove` rebuild only the path from the root
//! to the affected key and share every other subtree with the previous
//! version, so old roots remain valid snapshots forever.
//!
//! Values live behind `Arc`, which is what lets move-only types be
//! stored and read without cloning them.
//!
//! [`TrieStore`] adds the concurrency layer: a reader-writer lock over
//! the current root plus a writer-exclusion mutex, so readers never
//! block and writers serialize.

mod store;

pub use store::{TrieStore, ValueGuard};

use std::collections::HashMap;
use std::sync::Arc;

struct TrieNode<T> {
    children: HashMap<u8, Arc<TrieNode<T>>>,
    value: Option<Arc<T>>,
}

impl<T> Default for TrieNode<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            value: None,
        }
    }
}

impl<T> TrieNode<T> {
    /// Shallow copy: children and value are shared, the node itself is
    /// fresh and mutable.
    fn shallow_clone(&self) -> Self {
        Self {
            children: self.children.clone(),
            value: self.value.clone(),
        }
    }
}

pub struct Trie<T> {
    root: Option<Arc<TrieNode<T>>>,
}

impl<T> Clone for Trie<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Trie<T> {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Looks up a key in this snapshot.
    pub fn get(&self, key: &str) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        for byte in key.bytes() {
            node = node.children.get(&byte)?.as_ref();
        }
        node.value.as_deref()
    }

    /// Like [`Trie::get`] but hands out the shared handle, for guards
    /// that must outlive the snapshot borrow.
    pub fn get_shared(&self, key: &str) -> Option<Arc<T>> {
        let mut node = self.root.as_deref()?;
        for byte in key.bytes() {
            node = node.children.get(&byte)?.as_ref();
        }
        node.value.clone()
    }

    /// Returns a new trie with `key` bound to `value`. The receiver is
    /// unchanged.
    pub fn put(&self, key: &str, value: T) -> Trie<T> {
        let root = put_path(self.root.as_ref(), key.as_bytes(), Arc::new(value));
        Trie { root: Some(root) }
    }

    /// Returns a new trie without `key`. Nodes left with no value and no
    /// children are pruned. Removing an absent key returns an identical
    /// snapshot.
    pub fn remove(&self, key: &str) -> Trie<T> {
        let Some(root) = self.root.as_ref() else {
            return self.clone();
        };
        match remove_path(root, key.as_bytes()) {
            RemoveOutcome::NotFound => self.clone(),
            RemoveOutcome::Pruned => Trie { root: None },
            RemoveOutcome::Replaced(node) => Trie { root: Some(node) },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

fn put_path<T>(node: Option<&Arc<TrieNode<T>>>, key: &[u8], value: Arc<T>) -> Arc<TrieNode<T>> {
    let mut new_node = match node {
        Some(n) => n.shallow_clone(),
        None => TrieNode::default(),
    };
    match key.split_first() {
        None => new_node.value = Some(value),
        Some((byte, rest)) => {
            let child = put_path(new_node.children.get(byte), rest, value);
            new_node.children.insert(*byte, child);
        }
    }
    Arc::new(new_node)
}

enum RemoveOutcome<T> {
    /// Key absent; nothing changed.
    NotFound,
    /// The node vanished entirely (no value, no children left).
    Pruned,
    Replaced(Arc<TrieNode<T>>),
}

fn remove_path<T>(node: &Arc<TrieNode<T>>, key: &[u8]) -> RemoveOutcome<T> {
    match key.split_first() {
        None => {
            if node.value.is_none() {
                return RemoveOutcome::NotFound;
            }
            if node.children.is_empty() {
                return RemoveOutcome::Pruned;
            }
            let mut new_node = node.shallow_clone();
            new_node.value = None;
            RemoveOutcome::Replaced(Arc::new(new_node))
        }
        Some((byte, rest)) => {
            let Some(child) = node.children.get(byte) else {
                return RemoveOutcome::NotFound;
            };
            match remove_path(child, rest) {
                RemoveOutcome::NotFound => RemoveOutcome::NotFound,
                RemoveOutcome::Pruned => {
                    let mut new_node = node.shallow_clone();
                    new_node.children.remove(byte);
                    if new_node.children.is_empty() && new_node.value.is_none() {
                        RemoveOutcome::Pruned
                    } else {
                        RemoveOutcome::Replaced(Arc::new(new_node))
                    }
                }
                RemoveOutcome::Replaced(new_child) => {
                    let mut new_node = node.shallow_clone();
                    new_node.children.insert(*byte, new_child);
                    RemoveOutcome::Replaced(Arc::new(new_node))
                }
            }
        }
    }
}
