//! Reachability graphs with solver-controlled edge enables.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustsat::types::Lit;
use std::collections::{HashMap, HashSet, VecDeque};

/// Handle for a graph owned by a [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(pub(crate) usize);

/// A reachability atom: `lit` must agree with whether `to` is reachable
/// from `from` over enabled edges (within `bound` edges, if bounded).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReachAtom {
    pub(crate) lit: Lit,
    pub(crate) from: NodeIndex,
    pub(crate) to: NodeIndex,
    pub(crate) bound: Option<u32>,
}

/// A directed graph whose edges carry enable literals.
///
/// Node weights are display names (used for debug route traces); edge
/// weights are the enable literals the SAT backend assigns.
#[derive(Debug, Default)]
pub struct ReachGraph {
    graph: DiGraph<String, Lit>,
    atoms: Vec<ReachAtom>,
}

impl ReachGraph {
    pub(crate) fn add_node(&mut self, name: &str) -> NodeIndex {
        self.graph.add_node(name.to_string())
    }

    pub(crate) fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, enable: Lit) -> EdgeIndex {
        self.graph.add_edge(from, to, enable)
    }

    pub(crate) fn add_atom(&mut self, atom: ReachAtom) {
        self.atoms.push(atom);
    }

    pub(crate) fn atoms(&self) -> &[ReachAtom] {
        &self.atoms
    }

    /// The enable literal of an edge.
    pub fn enable(&self, edge: EdgeIndex) -> Lit {
        self.graph[edge]
    }

    /// The display name of a node.
    pub fn node_name(&self, node: NodeIndex) -> &str {
        &self.graph[node]
    }

    /// Source and target of an edge.
    pub fn edge_endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.graph
            .edge_endpoints(edge)
            .expect("edge belongs to this graph")
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edge enable literals, for model snapshots.
    pub(crate) fn edges(&self) -> impl Iterator<Item = (EdgeIndex, Lit)> + '_ {
        self.graph.edge_references().map(|e| (e.id(), *e.weight()))
    }

    /// Breadth-first search from `from` to `to` over `enabled` edges,
    /// respecting `bound` if given. Returns the edge sequence of a shortest
    /// path, or `None` if unreachable within the bound.
    pub(crate) fn bfs(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        bound: Option<u32>,
        enabled: &HashSet<EdgeIndex>,
    ) -> Option<Vec<EdgeIndex>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut dist: HashMap<NodeIndex, u32> = HashMap::new();
        let mut pred: HashMap<NodeIndex, EdgeIndex> = HashMap::new();
        let mut queue = VecDeque::new();
        dist.insert(from, 0);
        queue.push_back(from);

        while let Some(node) = queue.pop_front() {
            let d = dist[&node];
            if bound.is_some_and(|b| d >= b) {
                continue;
            }
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                if !enabled.contains(&edge.id()) {
                    continue;
                }
                let next = edge.target();
                if dist.contains_key(&next) {
                    continue;
                }
                dist.insert(next, d + 1);
                pred.insert(next, edge.id());
                if next == to {
                    return Some(self.unwind(from, to, &pred));
                }
                queue.push_back(next);
            }
        }
        None
    }

    fn unwind(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        pred: &HashMap<NodeIndex, EdgeIndex>,
    ) -> Vec<EdgeIndex> {
        let mut path = Vec::new();
        let mut node = to;
        while node != from {
            let edge = pred[&node];
            path.push(edge);
            node = self.edge_endpoints(edge).0;
        }
        path.reverse();
        path
    }

    /// Enable literals of currently-disabled edges departing the set of
    /// nodes reachable from `from` (within `bound - 1` edges, if bounded).
    ///
    /// When a positive reachability atom has no supporting path, at least
    /// one of these edges must be enabled in any model that keeps the atom.
    pub(crate) fn frontier(
        &self,
        from: NodeIndex,
        bound: Option<u32>,
        enabled: &HashSet<EdgeIndex>,
    ) -> Vec<Lit> {
        let mut dist: HashMap<NodeIndex, u32> = HashMap::new();
        let mut queue = VecDeque::new();
        dist.insert(from, 0);
        queue.push_back(from);
        let mut lits = HashSet::new();

        while let Some(node) = queue.pop_front() {
            let d = dist[&node];
            if bound.is_some_and(|b| d >= b) {
                continue;
            }
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                if !enabled.contains(&edge.id()) {
                    lits.insert(*edge.weight());
                    continue;
                }
                let next = edge.target();
                if !dist.contains_key(&next) {
                    dist.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        lits.into_iter().collect()
    }
}
