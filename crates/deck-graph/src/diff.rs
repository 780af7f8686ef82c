use std::borrow::Cow;
use std::collections::HashSet;

use deck_protocol::{GraphEdge, GraphNode};

/// Anything with a stable identity across snapshots.
pub trait Keyed {
    fn key(&self) -> Cow<'_, str>;
}

impl Keyed for GraphNode {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.id)
    }
}

impl Keyed for GraphEdge {
    fn key(&self) -> Cow<'_, str> {
        Cow::Owned(GraphEdge::key(self))
    }
}

/// Minimal mutation list turning one collection into the next.
///
/// The three parts are disjoint by key.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff<T> {
    pub added: Vec<T>,
    pub updated: Vec<T>,
    pub removed: Vec<String>,
}

impl<T> Default for Diff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T> Diff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Compare the previous collection (key, value pairs) with the next one.
///
/// Removal order follows `previous`; additions and updates follow `next`.
pub fn diff_collection<'a, T, I>(previous: I, next: &[T]) -> Diff<T>
where
    T: Keyed + PartialEq + Clone + 'a,
    I: IntoIterator<Item = (&'a str, &'a T)>,
{
    let previous: Vec<(&str, &T)> = previous.into_iter().collect();
    let next_keys: HashSet<Cow<'_, str>> = next.iter().map(Keyed::key).collect();

    let mut diff = Diff::default();
    for (key, _) in &previous {
        if !next_keys.contains(*key) {
            diff.removed.push((*key).to_string());
        }
    }

    let lookup: std::collections::HashMap<&str, &T> = previous.into_iter().collect();
    for item in next {
        match lookup.get(item.key().as_ref()) {
            None => diff.added.push(item.clone()),
            Some(old) if *old != item => diff.updated.push(item.clone()),
            Some(_) => {}
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_protocol::NodeGroup;
    use std::collections::BTreeMap;

    fn map(nodes: &[GraphNode]) -> BTreeMap<String, GraphNode> {
        nodes.iter().map(|n| (n.id.clone(), n.clone())).collect()
    }

    #[test]
    fn empty_previous_adds_everything() {
        let next = vec![
            GraphNode::new("a", NodeGroup::Agent),
            GraphNode::new("b", NodeGroup::Task),
        ];
        let prev = BTreeMap::<String, GraphNode>::new();
        let diff = diff_collection(prev.iter().map(|(k, v)| (k.as_str(), v)), &next);
        assert_eq!(diff.added.len(), 2);
        assert!(diff.updated.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn attribute_change_is_an_update() {
        let before = vec![GraphNode::new("a", NodeGroup::Agent).with_attr("priority", "low")];
        let after = vec![GraphNode::new("a", NodeGroup::Agent).with_attr("priority", "high")];
        let prev = map(&before);
        let diff = diff_collection(prev.iter().map(|(k, v)| (k.as_str(), v)), &after);
        assert_eq!(diff.updated.len(), 1);
        assert!(diff.added.is_empty() && diff.removed.is_empty());
    }

    #[test]
    fn edges_diff_by_derived_key() {
        let before = vec![GraphEdge::new("t", "a", Some("Working on"))];
        let after = vec![GraphEdge::new("t", "b", Some("Working on"))];
        let prev: BTreeMap<String, GraphEdge> =
            before.iter().map(|e| (GraphEdge::key(e), e.clone())).collect();
        let diff = diff_collection(prev.iter().map(|(k, v)| (k.as_str(), v)), &after);
        assert_eq!(diff.removed, vec!["t->a:Working on".to_string()]);
        assert_eq!(diff.added.len(), 1);
    }
}
