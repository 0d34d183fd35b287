//! Cycle detection over the child -> parent relation.
//!
//! Depth-first search with a visited set and a path stack. The walk keeps
//! its own frame stack instead of recursing, so pathological naming schemes
//! cannot exhaust the call stack. Ids are mapped to dense indices first and
//! all bookkeeping is done on those.

use crate::collection::CollectionId;
use crate::graph::Adjacency;
use indexmap::IndexSet;
use log::{debug, warn};
use std::collections::HashSet;

/// Playlist ids along a cycle. The first id is repeated at the end:
/// `[a, b, a]`.
pub type Cycle = Vec<CollectionId>;

struct Frame {
    node: usize,
    next_parent: usize,
}

/// Finds cycles in `child_to_parents`.
///
/// Roots are tried in key order. Every edge back to a node on the current
/// path reports the path from that node's first occurrence back to it; the
/// walk then carries on with the remaining parents, so a cycle through the
/// entry path of another one is still found. A node is fully explored at
/// most once across all roots.
///
/// # Arguments
///
/// * `child_to_parents` - Each playlist id mapped to the parents it feeds
///
/// # Returns
///
/// The cycles in discovery order, each closed with its first id. The same
/// cycle may appear more than once; use [`cycle_members`] for filtering.
pub fn detect_cycles(child_to_parents: &Adjacency) -> Vec<Cycle> {
    let mut ids: IndexSet<&str> = IndexSet::new();
    for (child, parents) in child_to_parents {
        ids.insert(child);
        for parent in parents {
            ids.insert(parent);
        }
    }

    let adjacency: Vec<Vec<usize>> = ids
        .iter()
        .map(|id| {
            child_to_parents
                .get(*id)
                .map(|parents| {
                    parents
                        .iter()
                        .filter_map(|parent| ids.get_index_of(parent.as_str()))
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let mut visited = vec![false; ids.len()];
    let mut on_path = vec![false; ids.len()];
    let mut path: Vec<usize> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut cycles = Vec::new();

    for root in child_to_parents.keys().filter_map(|id| ids.get_index_of(id.as_str())) {
        if visited[root] {
            continue;
        }

        visited[root] = true;
        on_path[root] = true;
        path.push(root);
        stack.push(Frame { node: root, next_parent: 0 });

        while let Some(frame) = stack.last_mut() {
            let Some(&parent) = adjacency[frame.node].get(frame.next_parent) else {
                on_path[frame.node] = false;
                path.pop();
                stack.pop();
                continue;
            };
            frame.next_parent += 1;

            if on_path[parent] {
                let start = path.iter().position(|&node| node == parent).unwrap_or(0);
                let cycle: Cycle = path[start..]
                    .iter()
                    .chain(std::iter::once(&parent))
                    .map(|&node| ids[node].to_string())
                    .collect();
                debug!("Cycle found: {}", cycle.join(" -> "));
                cycles.push(cycle);
                continue;
            }

            if visited[parent] {
                continue;
            }

            visited[parent] = true;
            on_path[parent] = true;
            path.push(parent);
            stack.push(Frame { node: parent, next_parent: 0 });
        }
    }

    if !cycles.is_empty() {
        warn!("Detected {} cycle(s) in the flow graph", cycles.len());
    }

    cycles
}

/// Every playlist id that sits on at least one cycle.
pub fn cycle_members(cycles: &[Cycle]) -> HashSet<CollectionId> {
    cycles.iter().flatten().cloned().collect()
}
