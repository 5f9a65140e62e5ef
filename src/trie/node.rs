use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A value stored in the trie. The concrete type is recovered at lookup
/// time with a downcast; a mismatched type reads as absence.
pub(crate) type SharedValue = Arc<dyn Any + Send + Sync>;

/// A single trie node: a children map keyed by byte, plus an optional
/// typed payload.
///
/// Nodes are never mutated after publication. Every modification builds
/// new nodes along the affected path; untouched subtrees stay shared
/// through their `Arc`s, which is also what the derived `Clone` preserves
/// (a shallow copy of the children map).
#[derive(Clone, Default)]
pub(crate) struct TrieNode {
    pub(crate) children: HashMap<u8, Arc<TrieNode>>,
    pub(crate) value: Option<SharedValue>,
}

impl TrieNode {
    /// A value-less node over the given children.
    pub(crate) fn with_children(children: HashMap<u8, Arc<TrieNode>>) -> Self {
        Self {
            children,
            value: None,
        }
    }

    /// A value-carrying node over the given children.
    pub(crate) fn with_value(children: HashMap<u8, Arc<TrieNode>>, value: SharedValue) -> Self {
        Self {
            children,
            value: Some(value),
        }
    }

    pub(crate) fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_clone_shares_children() {
        let leaf = Arc::new(TrieNode::default());
        let mut children = HashMap::new();
        children.insert(b'a', Arc::clone(&leaf));

        let node = TrieNode::with_children(children);
        let copy = node.clone();

        assert!(Arc::ptr_eq(&node.children[&b'a'], &copy.children[&b'a']));
    }

    #[test]
    fn test_node_value_downcast() {
        let node = TrieNode::with_value(HashMap::new(), Arc::new(42u32));

        assert!(node.has_value());
        let value = node.value.as_ref().unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert!(value.downcast_ref::<u64>().is_none());
    }

    #[test]
    fn test_plain_node_has_no_value() {
        let node = TrieNode::default();

        assert!(!node.has_value());
        assert!(node.children.is_empty());
    }
}
