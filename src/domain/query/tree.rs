//! Dotted-path trees shared by projection and sort compilation.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Node of a [`PathTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathNode<T> {
    Leaf(T),
    Branch(PathTree<T>),
}

/// Insertion-ordered nested map built from dotted paths.
///
/// `["a.b", "a.c", "d"]` becomes `{ a: { b: leaf, c: leaf }, d: leaf }`.
/// When a path ends where another path keeps going, the leaf wins and the
/// deeper segments are absorbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTree<T> {
    entries: Vec<(String, PathNode<T>)>,
}

impl<T> Default for PathTree<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> PathTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from `(dotted path, leaf)` pairs.
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = (&'a str, T)>) -> Self {
        let mut tree = Self::new();
        for (path, leaf) in paths {
            let segments: Vec<&str> = path.split('.').collect();
            tree.insert(&segments, leaf);
        }
        tree
    }

    fn insert(&mut self, segments: &[&str], leaf: T) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };

        let position = self.entries.iter().position(|(key, _)| key == head);

        if rest.is_empty() {
            match position {
                Some(index) => self.entries[index].1 = PathNode::Leaf(leaf),
                None => self
                    .entries
                    .push(((*head).to_string(), PathNode::Leaf(leaf))),
            }
            return;
        }

        let index = match position {
            Some(index) => index,
            None => {
                self.entries
                    .push(((*head).to_string(), PathNode::Branch(PathTree::new())));
                self.entries.len() - 1
            }
        };

        match &mut self.entries[index].1 {
            // A shorter path already selected the whole subtree.
            PathNode::Leaf(_) => {}
            PathNode::Branch(child) => child.insert(rest, leaf),
        }
    }
}

impl<T> PathTree<T> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PathNode<T>> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, node)| node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathNode<T>)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }
}

impl<T: Serialize> Serialize for PathNode<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathNode::Leaf(value) => value.serialize(serializer),
            PathNode::Branch(tree) => tree.serialize(serializer),
        }
    }
}

impl<T: Serialize> Serialize for PathTree<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn build(paths: &[&str]) -> PathTree<bool> {
        PathTree::from_paths(paths.iter().map(|p| (*p, true)))
    }

    #[test]
    fn test_nested_paths_merge_under_common_prefix() {
        let tree = build(&["a.b", "a.c", "d"]);
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({ "a": { "b": true, "c": true }, "d": true })
        );
    }

    #[test]
    fn test_prefix_leaf_absorbs_deeper_paths() {
        let tree = build(&["a", "a.b"]);
        assert_eq!(serde_json::to_value(&tree).unwrap(), json!({ "a": true }));

        let tree = build(&["a.b", "a"]);
        assert_eq!(serde_json::to_value(&tree).unwrap(), json!({ "a": true }));
    }

    #[test]
    fn test_empty_input_gives_empty_tree() {
        assert!(build(&[]).is_empty());
    }
}
