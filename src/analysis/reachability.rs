//! 可达集与状态图：在标识副本上做显式栈的深度优先搜索.
//!
//! 状态以去零后的标识为键，`{a: 0}` 与 `{}` 视为同一状态。
//! 前提：从根标识出发的可达状态空间有限，否则须设置 `state_limit`。
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;

use crate::net::ids::PlaceKey;
use crate::net::marking::Marking;
use crate::net::structure::Transition;

#[derive(Debug, Clone, Default)]
pub struct ReachabilityConfig {
    /// 最多探索的状态数量. None 表示不设上限.
    pub state_limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpaceStats {
    pub state_count: usize,
    pub edge_count: usize,
    pub dead_count: usize,
    pub truncated: bool,
}

/// Reachability graph: nodes are canonical markings, edge weights are the
/// index of the fired transition in the explored universe.
#[derive(Debug)]
pub struct StateSpace<P: PlaceKey> {
    pub graph: StableGraph<Marking<P>, usize>,
    pub initial: NodeIndex,
    pub truncated: bool,
    dead: Vec<NodeIndex>,
    index: HashMap<Marking<P>, NodeIndex>,
}

impl<P: PlaceKey> StateSpace<P> {
    pub fn initial_marking(&self) -> &Marking<P> {
        &self.graph[self.initial]
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, marking: &Marking<P>) -> bool {
        self.index.contains_key(marking)
    }

    pub fn markings(&self) -> HashSet<Marking<P>> {
        self.index.keys().cloned().collect()
    }

    pub fn into_markings(self) -> HashSet<Marking<P>> {
        self.index.into_keys().collect()
    }

    /// States where no transition of the universe is enabled.
    pub fn dead_states(&self) -> impl Iterator<Item = &Marking<P>> {
        self.dead.iter().map(|node| &self.graph[*node])
    }

    /// `(transition index, successor)` pairs leaving `marking`.
    pub fn successors(&self, marking: &Marking<P>) -> Vec<(usize, &Marking<P>)> {
        let Some(&node) = self.index.get(marking) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .edges(node)
            .map(|edge| (*edge.weight(), &self.graph[edge.target()]))
            .collect();
        out.sort_by_key(|(transition, _)| *transition);
        out
    }

    pub fn stats(&self) -> StateSpaceStats {
        StateSpaceStats {
            state_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            dead_count: self.dead.len(),
            truncated: self.truncated,
        }
    }
}

/// Every marking reachable from `root` through `universe`, `root` included.
pub fn reachable_from<P: PlaceKey>(
    root: &Marking<P>,
    universe: &[Transition<P>],
) -> HashSet<Marking<P>> {
    explore(root, universe, &ReachabilityConfig::default()).into_markings()
}

pub fn explore<P: PlaceKey>(
    root: &Marking<P>,
    universe: &[Transition<P>],
    config: &ReachabilityConfig,
) -> StateSpace<P> {
    let mut graph = StableGraph::new();
    let mut index = HashMap::new();
    let mut dead = Vec::new();
    let mut truncated = false;

    let root = root.canonical();
    let initial = graph.add_node(root.clone());
    index.insert(root, initial);
    let mut stack = vec![initial];

    while let Some(node) = stack.pop() {
        let current = graph[node].clone();
        let mut enabled_any = false;

        for (transition_index, transition) in universe.iter().enumerate() {
            let Some(next) = transition.successor(&current) else {
                continue;
            };
            enabled_any = true;

            let target = match index.entry(next.canonical()) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    if config
                        .state_limit
                        .is_some_and(|limit| graph.node_count() >= limit)
                    {
                        truncated = true;
                        continue;
                    }
                    let target = graph.add_node(entry.key().clone());
                    entry.insert(target);
                    stack.push(target);
                    target
                }
            };
            graph.add_edge(node, target, transition_index);
        }

        if !enabled_any {
            dead.push(node);
        }
    }

    if truncated {
        log::warn!(
            "state space truncated at {} states",
            graph.node_count()
        );
    }
    log::debug!(
        "explored {} states, {} edges over {} transitions",
        graph.node_count(),
        graph.edge_count(),
        universe.len()
    );

    StateSpace {
        graph,
        initial,
        truncated,
        dead,
        index,
    }
}
