//! # Flow Graph Module
//!
//! Turns the flow indicators of every playlist into a directed graph between
//! playlists. An edge `(child, parent)` means items of `child` flow into
//! `parent`.
//!
//! ## Construction
//!
//! 1. **Direct edges**: a glyph that is a child indicator of `B` and a parent
//!    indicator of `A` (with `A != B`) links `B -> A`.
//! 2. **Relay edges**: for a relay `R` (both parent and child indicators),
//!    every child flowing into `R` is also linked to every parent `R` flows
//!    into. This is a single pass: chains with more than one relay hop are
//!    not expanded further.
//!
//! Both directions are kept so lookups by either endpoint are O(1). Map
//! iteration follows playlist enumeration order, which makes batching in the
//! executor deterministic.

use crate::collection::{Collection, CollectionId, Glyph};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};
use std::collections::HashSet;

/// Adjacency list keyed by playlist id.
pub type Adjacency = IndexMap<CollectionId, Vec<CollectionId>>;

/// Counts gathered while building a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub direct_edges: usize,
    pub transitive_edges: usize,
}

/// Parent/child relationships between playlists for a single run.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    parent_to_children: Adjacency,
    child_to_parents: Adjacency,
    edges: HashSet<(CollectionId, CollectionId)>,
    stats: GraphStats,
}

impl FlowGraph {
    /// Builds the graph from already parsed collections.
    ///
    /// A child links to every parent sharing one of its glyphs. A relay
    /// (parent and child at once) then links its own children to its own
    /// parents, one hop only. Self links and repeated edges are dropped.
    ///
    /// # Arguments
    ///
    /// * `collections` - Playlists with their indicators already parsed
    ///
    /// # Returns
    ///
    /// The graph with adjacency in enumeration order and [`GraphStats`]
    /// split by direct and relay edges.
    pub fn build<'a, I>(collections: I) -> Self
    where
        I: IntoIterator<Item = &'a Collection>,
    {
        let collections: Vec<&Collection> = collections.into_iter().collect();

        let mut glyph_to_parents: IndexMap<&Glyph, Vec<&str>> = IndexMap::new();
        let mut glyph_to_children: IndexMap<&Glyph, Vec<&str>> = IndexMap::new();

        for collection in &collections {
            for glyph in &collection.parent_indicators {
                glyph_to_parents.entry(glyph).or_default().push(&collection.id);
            }
            for glyph in &collection.child_indicators {
                glyph_to_children.entry(glyph).or_default().push(&collection.id);
            }
        }

        let mut graph = Self::default();

        // Direct edges: shared glyph between a parent and a child
        for (glyph, parent_ids) in &glyph_to_parents {
            let Some(child_ids) = glyph_to_children.get(glyph) else {
                continue;
            };
            for parent_id in parent_ids {
                for child_id in child_ids {
                    if parent_id != child_id && graph.insert_edge(child_id, parent_id) {
                        graph.stats.direct_edges += 1;
                    }
                }
            }
        }

        // Relay edges: child -> relay -> parent becomes child -> parent
        for relay in collections.iter().filter(|c| c.is_relay()) {
            for parent_glyph in &relay.parent_indicators {
                let Some(children_into_relay) = glyph_to_children.get(parent_glyph) else {
                    continue;
                };
                for child_glyph in &relay.child_indicators {
                    let Some(parents_from_relay) = glyph_to_parents.get(child_glyph) else {
                        continue;
                    };
                    for child_id in children_into_relay {
                        for final_parent_id in parents_from_relay {
                            if child_id == final_parent_id
                                || *child_id == relay.id
                                || *final_parent_id == relay.id
                            {
                                continue;
                            }
                            if graph.insert_edge(child_id, final_parent_id) {
                                debug!(
                                    "Relay `{}' links `{child_id}' -> `{final_parent_id}'",
                                    relay.name
                                );
                                graph.stats.transitive_edges += 1;
                            }
                        }
                    }
                }
            }
        }

        info!(
            "Flow graph: {} parents, {} direct and {} transitive relationships",
            graph.parent_to_children.len(),
            graph.stats.direct_edges,
            graph.stats.transitive_edges
        );

        graph
    }

    /// Adds `child -> parent` unless already present. Returns whether the
    /// edge is new.
    fn insert_edge(&mut self, child: &str, parent: &str) -> bool {
        if !self.edges.insert((child.to_string(), parent.to_string())) {
            return false;
        }
        self.parent_to_children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        self.child_to_parents
            .entry(child.to_string())
            .or_default()
            .push(parent.to_string());
        true
    }

    pub fn parent_to_children(&self) -> &Adjacency {
        &self.parent_to_children
    }

    pub fn child_to_parents(&self) -> &Adjacency {
        &self.child_to_parents
    }

    pub fn children_of(&self, parent: &str) -> &[CollectionId] {
        self.parent_to_children
            .get(parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn parents_of(&self, child: &str) -> &[CollectionId] {
        self.child_to_parents
            .get(child)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_edge(&self, child: &str, parent: &str) -> bool {
        self.edges.contains(&(child.to_string(), parent.to_string()))
    }

    /// Parent ids in enumeration order.
    pub fn parents(&self) -> impl Iterator<Item = &CollectionId> {
        self.parent_to_children.keys()
    }

    /// Every id that appears as parent or child.
    pub fn nodes(&self) -> IndexSet<&CollectionId> {
        self.parent_to_children
            .keys()
            .chain(self.child_to_parents.keys())
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    /// Copy of the graph with every edge touching `excluded` removed.
    ///
    /// Parents left without children disappear from the result. The stats
    /// of the original build are carried over unchanged.
    pub fn without_nodes(&self, excluded: &HashSet<CollectionId>) -> Self {
        let mut filtered = Self {
            stats: self.stats,
            ..Self::default()
        };
        for (parent, children) in &self.parent_to_children {
            if excluded.contains(parent) {
                continue;
            }
            for child in children.iter().filter(|child| !excluded.contains(*child)) {
                filtered.insert_edge(child, parent);
            }
        }
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collections(named: &[(&str, &str)]) -> Vec<Collection> {
        named
            .iter()
            .map(|(id, name)| Collection::new(*id, *name))
            .collect()
    }

    #[test]
    fn test_direct_edge_direction() {
        let all = collections(&[("a", "🎵 Parent"), ("b", "Child 🎵")]);
        let graph = FlowGraph::build(&all);

        assert!(graph.has_edge("b", "a"));
        assert!(!graph.has_edge("a", "b"));
        assert_eq!(graph.children_of("a"), ["b".to_string()]);
        assert_eq!(graph.parents_of("b"), ["a".to_string()]);
        assert_eq!(graph.stats().direct_edges, 1);
    }

    #[test]
    fn test_child_flows_to_every_matching_parent() {
        let all = collections(&[
            ("parent1", "🜀 Collection One"),
            ("parent2", "🜀🜁 Collection Two"),
            ("child1", "Daily Mix 🜀"),
        ]);
        let graph = FlowGraph::build(&all);

        assert_eq!(graph.parents_of("child1"), ["parent1".to_string(), "parent2".to_string()]);
    }

    #[test]
    fn test_orphans_and_self_references_have_no_edges() {
        let all = collections(&[
            ("parent", "🜀 Collection"),
            ("child", "Mix 🜀"),
            ("orphan", "Mix 🜁"),
            ("self_ref", "🜂 Self Mix 🜂"),
            ("no_letters", "🎵🎵"),
        ]);
        let graph = FlowGraph::build(&all);

        assert_eq!(graph.edge_count(), 1);
        assert!(graph.parents_of("orphan").is_empty());
        assert!(graph.parents_of("self_ref").is_empty());
        assert!(graph.children_of("self_ref").is_empty());
        assert!(!graph.nodes().contains(&"no_letters".to_string()));
    }

    #[test]
    fn test_relay_adds_single_hop_transitive_edge() {
        let all = collections(&[
            ("x", "Start 🜀"),
            ("r", "🜀 Middle 🜁"),
            ("y", "🜁 End"),
        ]);
        let graph = FlowGraph::build(&all);

        assert!(graph.has_edge("x", "r"));
        assert!(graph.has_edge("r", "y"));
        assert!(graph.has_edge("x", "y"));
        assert_eq!(graph.stats().transitive_edges, 1);
    }

    #[test]
    fn test_two_relay_chain_is_not_fully_closed() {
        let all = collections(&[
            ("w", "Source 🜀"),
            ("r1", "🜀 First 🜁"),
            ("r2", "🜁 Second 🜂"),
            ("z", "🜂 Sink"),
        ]);
        let graph = FlowGraph::build(&all);

        assert!(graph.has_edge("w", "r2"));
        assert!(graph.has_edge("r1", "z"));
        assert!(!graph.has_edge("w", "z"));
    }

    #[test]
    fn test_transitive_step_skips_existing_and_self_edges() {
        let all = collections(&[("a", "♪A♫"), ("b", "♫B♪")]);
        let graph = FlowGraph::build(&all);

        assert!(graph.has_edge("a", "b"));
        assert!(graph.has_edge("b", "a"));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.stats().transitive_edges, 0);
    }

    #[test]
    fn test_duplicate_indicators_do_not_duplicate_edges() {
        let all = collections(&[("p", "★★ Stars"), ("c", "Mix ★")]);
        let graph = FlowGraph::build(&all);

        assert_eq!(graph.children_of("p").len(), 1);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_without_nodes_drops_touching_edges() {
        let all = collections(&[
            ("a", "♪A♫"),
            ("b", "♫B♪"),
            ("p", "🎵 Parent"),
            ("c", "Child 🎵"),
        ]);
        let graph = FlowGraph::build(&all);
        let excluded: HashSet<CollectionId> = ["a".to_string(), "b".to_string()].into();
        let filtered = graph.without_nodes(&excluded);

        assert_eq!(filtered.edge_count(), 1);
        assert!(filtered.has_edge("c", "p"));
        assert_eq!(filtered.parents().collect::<Vec<_>>(), vec!["p"]);
    }
}
