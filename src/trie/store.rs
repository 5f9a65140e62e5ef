use std::any::Any;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::trie::Trie;

/// Keeps a trie snapshot alive for as long as a looked-up value is in use.
///
/// The guard owns both the value and the snapshot it was read from, so the
/// value stays valid no matter how many writes land on the store after the
/// lookup.
pub struct ValueGuard<T> {
    /// The snapshot the value was read from. Holding it pins the whole
    /// root, not just the value, matching snapshot read semantics.
    _snapshot: Trie,
    value: Arc<T>,
}

impl<T> ValueGuard<T> {
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for ValueGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// A thread-safe front-end over [`Trie`] with snapshot semantics.
///
/// Readers sample the current root under a short-lived lock and then read
/// the captured snapshot without any locking; concurrent readers never
/// block each other. Writers are serialized: a single write mutex is held
/// for the whole duration of a `put` or `remove`, and the root mutex only
/// for the final publish.
#[derive(Default)]
pub struct TrieStore {
    /// Protects the current root handle. Critical sections are a clone or
    /// an assignment, nothing more.
    root: Mutex<Trie>,
    /// Serializes writers end to end.
    write_lock: Mutex<()>,
}

impl TrieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key` in the current snapshot.
    ///
    /// Returns `None` when the key is absent or the stored value is not of
    /// type `T`. The returned guard remains valid across concurrent writes,
    /// including writes to the same key.
    pub fn get<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<ValueGuard<T>> {
        let snapshot = self.root.lock().clone();
        let value = snapshot.get_raw(key)?.downcast::<T>().ok()?;
        Some(ValueGuard {
            _snapshot: snapshot,
            value,
        })
    }

    /// Stores `value` under `key`.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) {
        let _serialized = self.write_lock.lock();
        let snapshot = self.root.lock().clone();
        let updated = snapshot.put(key, value);
        *self.root.lock() = updated;
    }

    /// Removes `key`.
    pub fn remove(&self, key: &[u8]) {
        let _serialized = self.write_lock.lock();
        let snapshot = self.root.lock().clone();
        let updated = snapshot.remove(key);
        *self.root.lock() = updated;
    }
}
