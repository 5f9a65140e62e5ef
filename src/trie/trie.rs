use std::any::Any;
use std::sync::Arc;

use super::node::{SharedValue, TrieNode};

/// A persistent key-value trie with structural sharing.
///
/// Keys are byte sequences; each level of the trie consumes one byte. The
/// empty key is legal and addresses the value slot of the root node.
///
/// None of the operations mutate `self`: `put` and `remove` return a new
/// `Trie` that shares every untouched subtree with the original, so any
/// number of versions can coexist and be read concurrently. A `Clone` of a
/// `Trie` is a cheap copy of the root pointer.
///
/// Values are typed. `get::<T>` succeeds only when the stored value is of
/// type `T`; a mismatched type reads as absence, not as an error.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

/// Result of removing a key from a subtree.
enum Removal {
    /// The key was absent; the subtree is unchanged.
    Unchanged,
    /// The subtree was rebuilt along the removal path.
    Replaced(Arc<TrieNode>),
    /// The subtree became value-less and child-less and must be dropped.
    Pruned,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key` and returns a reference to its value, if the key is
    /// present and the stored value is of type `T`.
    pub fn get<T: Any>(&self, key: &[u8]) -> Option<&T> {
        let node = self.lookup(key)?;
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Returns a new trie with `value` stored under `key`.
    ///
    /// Only the nodes on the root-to-key path are reallocated; sibling
    /// subtrees are shared with `self`. An existing value under `key` is
    /// replaced, whatever its type, and its children are preserved.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) -> Trie {
        let value: SharedValue = Arc::new(value);
        let root = Self::put_node(self.root.as_deref(), key, value);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    /// Returns a new trie with `key` removed.
    ///
    /// Nodes left value-less and child-less by the removal are pruned all
    /// the way up. Removing an absent key returns a handle sharing the
    /// input root.
    pub fn remove(&self, key: &[u8]) -> Trie {
        let root = match &self.root {
            Some(root) => root,
            None => return self.clone(),
        };
        match Self::remove_node(root, key) {
            Removal::Unchanged => self.clone(),
            Removal::Replaced(root) => Trie { root: Some(root) },
            Removal::Pruned => Trie { root: None },
        }
    }

    /// Walks from the root, descending one byte at a time.
    fn lookup(&self, key: &[u8]) -> Option<&TrieNode> {
        let mut node = self.root.as_deref()?;
        for byte in key {
            node = node.children.get(byte)?.as_ref();
        }
        Some(node)
    }

    /// Shared-ownership access to the raw value under `key`, used by the
    /// store to hand out guards.
    pub(crate) fn get_raw(&self, key: &[u8]) -> Option<SharedValue> {
        self.lookup(key).and_then(|node| node.value.clone())
    }

    /// Rebuilds the path from `node` down to the end of `key`, rebinding
    /// one child edge per level so that everything off the path stays
    /// shared. `node` is `None` below the deepest existing ancestor.
    fn put_node(node: Option<&TrieNode>, key: &[u8], value: SharedValue) -> TrieNode {
        match key.split_first() {
            None => {
                // Terminal position: keep the children, install the value.
                let children = node.map(|n| n.children.clone()).unwrap_or_default();
                TrieNode::with_value(children, value)
            }
            Some((&byte, rest)) => {
                let existing = node.and_then(|n| n.children.get(&byte)).map(Arc::as_ref);
                let child = Self::put_node(existing, rest, value);

                let mut children = node.map(|n| n.children.clone()).unwrap_or_default();
                children.insert(byte, Arc::new(child));
                TrieNode {
                    children,
                    value: node.and_then(|n| n.value.clone()),
                }
            }
        }
    }

    fn remove_node(node: &TrieNode, key: &[u8]) -> Removal {
        match key.split_first() {
            None => {
                if !node.has_value() {
                    return Removal::Unchanged;
                }
                if node.children.is_empty() {
                    return Removal::Pruned;
                }
                // Keep the subtree, drop the value.
                Removal::Replaced(Arc::new(TrieNode::with_children(node.children.clone())))
            }
            Some((&byte, rest)) => {
                let child = match node.children.get(&byte) {
                    Some(child) => child,
                    None => return Removal::Unchanged,
                };
                match Self::remove_node(child, rest) {
                    Removal::Unchanged => Removal::Unchanged,
                    Removal::Replaced(child) => {
                        let mut children = node.children.clone();
                        children.insert(byte, child);
                        Removal::Replaced(Arc::new(TrieNode {
                            children,
                            value: node.value.clone(),
                        }))
                    }
                    Removal::Pruned => {
                        let mut children = node.children.clone();
                        children.remove(&byte);
                        if children.is_empty() && !node.has_value() {
                            Removal::Pruned
                        } else {
                            Removal::Replaced(Arc::new(TrieNode {
                                children,
                                value: node.value.clone(),
                            }))
                        }
                    }
                }
            }
        }
    }
}
