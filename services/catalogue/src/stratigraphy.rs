//! Stratigraphic precedence graph.
//!
//! Nodes are stratigraphic units, edges run from the later unit to the
//! earlier one. A valid sequence is a directed acyclic graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct StratigraphicGraph {
    earlier: BTreeMap<Uuid, BTreeSet<Uuid>>,
}

impl StratigraphicGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = (Uuid, Uuid)>) -> Self {
        let mut graph = Self::new();
        for (later, earlier) in edges {
            graph.add_edge(later, earlier);
        }
        graph
    }

    pub fn add_edge(&mut self, later: Uuid, earlier: Uuid) {
        self.earlier.entry(later).or_default().insert(earlier);
        self.earlier.entry(earlier).or_default();
    }

    pub fn edge_count(&self) -> usize {
        self.earlier.values().map(BTreeSet::len).sum()
    }

    pub fn has_edge(&self, later: Uuid, earlier: Uuid) -> bool {
        self.earlier
            .get(&later)
            .map_or(false, |targets| targets.contains(&earlier))
    }

    /// Shortest chain of edges leading from `from` down to `to`, both ends included.
    pub fn path(&self, from: Uuid, to: Uuid) -> Option<Vec<Uuid>> {
        if from == to {
            return Some(vec![from]);
        }

        let mut parent: HashMap<Uuid, Uuid> = HashMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(node) = queue.pop_front() {
            for &next in self.earlier.get(&node).into_iter().flatten() {
                if next == from || parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next, node);
                if next == to {
                    let mut path = vec![to];
                    let mut cursor = to;
                    while let Some(&previous) = parent.get(&cursor) {
                        path.push(previous);
                        cursor = previous;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// The cycle a new `later -> earlier` edge would close, as
    /// `[later, earlier, .., later]`.
    pub fn would_create_cycle(&self, later: Uuid, earlier: Uuid) -> Option<Vec<Uuid>> {
        let mut cycle = vec![later];
        cycle.extend(self.path(earlier, later)?);
        Some(cycle)
    }

    /// Any cycle already in the graph, first node repeated at the end.
    pub fn find_cycle(&self) -> Option<Vec<Uuid>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        let mut marks: HashMap<Uuid, Mark> = HashMap::new();

        for &root in self.earlier.keys() {
            if marks.contains_key(&root) {
                continue;
            }

            let mut stack: Vec<(Uuid, Vec<Uuid>)> = vec![(root, self.successors(root))];
            marks.insert(root, Mark::Active);

            while let Some((node, pending)) = stack.last_mut() {
                let node = *node;
                match pending.pop() {
                    Some(next) => match marks.get(&next).copied() {
                        Some(Mark::Active) => {
                            let start = stack.iter().position(|(n, _)| *n == next)?;
                            let mut cycle: Vec<Uuid> = stack[start..].iter().map(|(n, _)| *n).collect();
                            cycle.push(next);
                            return Some(cycle);
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(next, Mark::Active);
                            stack.push((next, self.successors(next)));
                        }
                    },
                    None => {
                        marks.insert(node, Mark::Done);
                        stack.pop();
                    }
                }
            }
        }
        None
    }

    /// Successors in reverse order so popping visits them ascending.
    fn successors(&self, node: Uuid) -> Vec<Uuid> {
        self.earlier
            .get(&node)
            .map(|targets| targets.iter().rev().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn units(n: usize) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_chain_has_no_cycle() {
        let su = units(3);
        let graph = StratigraphicGraph::from_edges([(su[0], su[1]), (su[1], su[2])]);
        assert!(graph.find_cycle().is_none());
        assert_eq!(graph.path(su[0], su[2]), Some(vec![su[0], su[1], su[2]]));
        assert_eq!(graph.path(su[2], su[0]), None);
    }

    #[test]
    fn test_closing_edge_reports_cycle_path() {
        let su = units(3);
        let graph = StratigraphicGraph::from_edges([(su[0], su[1]), (su[1], su[2])]);

        // su[2] later than su[0] closes the loop.
        let cycle = graph.would_create_cycle(su[2], su[0]).unwrap();
        assert_eq!(cycle, vec![su[2], su[0], su[1], su[2]]);
        assert!(graph.would_create_cycle(su[0], su[2]).is_none());
    }

    #[test]
    fn test_two_cycle() {
        let su = units(2);
        let graph = StratigraphicGraph::from_edges([(su[0], su[1])]);
        assert_eq!(graph.would_create_cycle(su[1], su[0]), Some(vec![su[1], su[0], su[1]]));
    }

    #[test]
    fn test_find_existing_cycle() {
        let su = units(4);
        let graph = StratigraphicGraph::from_edges([
            (su[0], su[1]),
            (su[1], su[2]),
            (su[2], su[3]),
            (su[3], su[1]),
        ]);
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        for pair in cycle.windows(2) {
            assert!(graph.has_edge(pair[0], pair[1]));
        }
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let su = units(2);
        let graph = StratigraphicGraph::from_edges([(su[0], su[1]), (su[0], su[1])]);
        assert_eq!(graph.edge_count(), 1);
    }

    proptest! {
        #[test]
        fn forward_edges_never_cycle(
            n in 2usize..12,
            raw in prop::collection::vec((0usize..12, 0usize..12), 0..40),
        ) {
            let su = units(n);
            let mut graph = StratigraphicGraph::new();
            for (a, b) in raw {
                let (a, b) = (a % n, b % n);
                if a < b {
                    graph.add_edge(su[a], su[b]);
                }
            }
            prop_assert!(graph.find_cycle().is_none());
        }

        #[test]
        fn reported_cycles_are_real(
            n in 2usize..10,
            raw in prop::collection::vec((0usize..10, 0usize..10), 1..30),
        ) {
            let su = units(n);
            let mut graph = StratigraphicGraph::new();
            for (a, b) in raw {
                let (a, b) = (a % n, b % n);
                if a == b {
                    continue;
                }
                if let Some(cycle) = graph.would_create_cycle(su[a], su[b]) {
                    prop_assert_eq!(cycle.first(), cycle.last());
                    prop_assert_eq!(cycle[1], su[b]);
                    for pair in cycle[1..].windows(2) {
                        prop_assert!(graph.has_edge(pair[0], pair[1]));
                    }
                } else {
                    graph.add_edge(su[a], su[b]);
                }
                prop_assert!(graph.find_cycle().is_none());
            }
        }
    }
}
