//! The scoped solver session.

use crate::error::SolverError;
use crate::graph::{GraphId, ReachAtom, ReachGraph};
use crate::term::{BitVec, Bool};
use petgraph::graph::{EdgeIndex, NodeIndex};
use rustsat::instances::{BasicVarManager, ManageVars};
use rustsat::solvers::{Solve, SolverResult};
use rustsat::types::{Clause, Lit, TernaryVal};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Result of a [`Session::solve`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// A model consistent with every asserted constraint exists.
    Sat,
    /// No model exists.
    Unsat,
}

type Backend = rustsat_glucose::core::Glucose;

/// One solver session: a SAT backend, a variable manager, and the
/// reachability graphs whose atoms the session keeps consistent.
///
/// Model accessors ([`value_bv`](Self::value_bv), [`route_path`](Self::route_path))
/// are valid after `solve` returns [`SolveOutcome::Sat`] and before any
/// further assertion.
pub struct Session {
    solver: Backend,
    varman: BasicVarManager,
    pending: Vec<Clause>,
    graphs: Vec<ReachGraph>,
    deadline: Option<Instant>,
    trivially_unsat: bool,
    has_model: bool,
}

impl Session {
    /// Opens a session on the named backend with an optional wall-clock
    /// budget.
    pub fn new(backend: &str, budget: Option<Duration>) -> Result<Self, SolverError> {
        if backend != "glucose" {
            return Err(SolverError::UnknownBackend(backend.to_string()));
        }
        Ok(Self {
            solver: Backend::default(),
            varman: BasicVarManager::default(),
            pending: Vec::new(),
            graphs: Vec::new(),
            deadline: budget.map(|b| Instant::now() + b),
            trivially_unsat: false,
            has_model: false,
        })
    }

    fn fresh_lit(&mut self) -> Lit {
        self.varman.new_var().pos_lit()
    }

    /// Allocates a fresh bit-vector variable.
    pub fn bv_var(&mut self, bits: usize) -> BitVec {
        BitVec::new((0..bits).map(|_| self.fresh_lit()).collect())
    }

    /// Conjunction. Constants fold; a single literal passes through.
    pub fn and(&mut self, terms: &[Bool]) -> Bool {
        let mut lits = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Bool::Const(false) => return Bool::Const(false),
                Bool::Const(true) => {}
                Bool::Term(lit) => lits.push(*lit),
            }
        }
        match lits.len() {
            0 => Bool::Const(true),
            1 => Bool::Term(lits[0]),
            _ => {
                let gate = self.fresh_lit();
                for &lit in &lits {
                    self.pending.push(clause_from([!gate, lit]));
                }
                let mut big: Vec<Lit> = lits.iter().map(|&l| !l).collect();
                big.push(gate);
                self.pending.push(big.into_iter().collect());
                Bool::Term(gate)
            }
        }
    }

    /// Disjunction. Constants fold; a single literal passes through.
    pub fn or(&mut self, terms: &[Bool]) -> Bool {
        let mut lits = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Bool::Const(true) => return Bool::Const(true),
                Bool::Const(false) => {}
                Bool::Term(lit) => lits.push(*lit),
            }
        }
        match lits.len() {
            0 => Bool::Const(false),
            1 => Bool::Term(lits[0]),
            _ => {
                let gate = self.fresh_lit();
                for &lit in &lits {
                    self.pending.push(clause_from([gate, !lit]));
                }
                let mut big = lits;
                big.push(!gate);
                self.pending.push(big.into_iter().collect());
                Bool::Term(gate)
            }
        }
    }

    /// Negation.
    pub fn not(&self, term: Bool) -> Bool {
        term.negate()
    }

    fn xnor(&mut self, a: Lit, b: Lit) -> Lit {
        let gate = self.fresh_lit();
        self.pending.push(clause_from([!gate, !a, b]));
        self.pending.push(clause_from([!gate, a, !b]));
        self.pending.push(clause_from([gate, a, b]));
        self.pending.push(clause_from([gate, !a, !b]));
        gate
    }

    /// Bit-vector equality. Widths may differ; the shorter side is
    /// zero-extended.
    pub fn eq(&mut self, a: &BitVec, b: &BitVec) -> Bool {
        let bits = a.bits().max(b.bits());
        let mut terms = Vec::with_capacity(bits);
        for i in 0..bits {
            match (a.lits().get(i), b.lits().get(i)) {
                (Some(&la), Some(&lb)) => {
                    let g = self.xnor(la, lb);
                    terms.push(Bool::Term(g));
                }
                (Some(&l), None) | (None, Some(&l)) => terms.push(Bool::Term(!l)),
                (None, None) => {}
            }
        }
        self.and(&terms)
    }

    /// Equality with an unsigned constant.
    pub fn eq_const(&mut self, a: &BitVec, value: u64) -> Bool {
        if a.bits() < 64 && value >> a.bits() != 0 {
            return Bool::Const(false);
        }
        let terms: Vec<Bool> = a
            .lits()
            .iter()
            .enumerate()
            .map(|(i, &lit)| {
                if value >> i & 1 == 1 {
                    Bool::Term(lit)
                } else {
                    Bool::Term(!lit)
                }
            })
            .collect();
        self.and(&terms)
    }

    /// Bit-vector disequality.
    pub fn neq(&mut self, a: &BitVec, b: &BitVec) -> Bool {
        let eq = self.eq(a, b);
        eq.negate()
    }

    /// Pairwise distinctness over a set of equal-purpose vectors.
    pub fn distinct(&mut self, vectors: &[&BitVec]) -> Bool {
        let mut terms = Vec::new();
        for i in 0..vectors.len() {
            for j in i + 1..vectors.len() {
                let neq = self.neq(vectors[i], vectors[j]);
                terms.push(neq);
            }
        }
        self.and(&terms)
    }

    /// Asserts that a term must hold.
    pub fn assert_(&mut self, term: Bool) {
        self.has_model = false;
        match term {
            Bool::Const(true) => {}
            Bool::Const(false) => self.trivially_unsat = true,
            Bool::Term(lit) => self.pending.push(clause_from([lit])),
        }
    }

    /// Creates a new reachability graph owned by this session.
    pub fn add_graph(&mut self) -> GraphId {
        self.graphs.push(ReachGraph::default());
        GraphId(self.graphs.len() - 1)
    }

    /// Read access to a graph (node names, edge endpoints).
    pub fn graph(&self, id: GraphId) -> &ReachGraph {
        &self.graphs[id.0]
    }

    /// Adds a named node.
    pub fn add_node(&mut self, id: GraphId, name: &str) -> NodeIndex {
        self.graphs[id.0].add_node(name)
    }

    /// Adds a directed edge with a fresh enable literal.
    pub fn add_edge(&mut self, id: GraphId, from: NodeIndex, to: NodeIndex) -> EdgeIndex {
        let enable = self.fresh_lit();
        self.graphs[id.0].add_edge(from, to, enable)
    }

    /// A Boolean atom holding iff `to` is reachable from `from` over
    /// enabled edges.
    pub fn reaches(&mut self, id: GraphId, from: NodeIndex, to: NodeIndex) -> Bool {
        let lit = self.fresh_lit();
        self.graphs[id.0].add_atom(ReachAtom {
            lit,
            from,
            to,
            bound: None,
        });
        Bool::Term(lit)
    }

    /// A Boolean atom holding iff `to` is reachable from `from` within `k`
    /// enabled edges.
    pub fn distance_leq(
        &mut self,
        id: GraphId,
        from: NodeIndex,
        to: NodeIndex,
        k: u32,
    ) -> Bool {
        let lit = self.fresh_lit();
        self.graphs[id.0].add_atom(ReachAtom {
            lit,
            from,
            to,
            bound: Some(k),
        });
        Bool::Term(lit)
    }

    fn check_budget(&self) -> Result<(), SolverError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SolverError::Timeout),
            _ => Ok(()),
        }
    }

    fn flush(&mut self) -> Result<(), SolverError> {
        for clause in self.pending.drain(..) {
            self.solver.add_clause(clause)?;
        }
        Ok(())
    }

    fn lit_true(&self, lit: Lit) -> Result<bool, SolverError> {
        Ok(matches!(self.solver.lit_val(lit)?, TernaryVal::True))
    }

    fn enabled_edges(&self, graph: &ReachGraph) -> Result<HashSet<EdgeIndex>, SolverError> {
        let mut enabled = HashSet::new();
        for (edge, lit) in graph.edges() {
            if self.lit_true(lit)? {
                enabled.insert(edge);
            }
        }
        Ok(enabled)
    }

    /// Solves the accumulated constraints, refining reachability atoms
    /// until the Boolean model and the graph theory agree.
    pub fn solve(&mut self) -> Result<SolveOutcome, SolverError> {
        if self.trivially_unsat {
            return Ok(SolveOutcome::Unsat);
        }
        let mut round = 0usize;
        loop {
            self.check_budget()?;
            self.flush()?;
            match self.solver.solve()? {
                SolverResult::Unsat => return Ok(SolveOutcome::Unsat),
                SolverResult::Sat => {}
                SolverResult::Interrupted => return Err(SolverError::Interrupted),
            }

            let mut learned: Vec<Clause> = Vec::new();
            for graph in &self.graphs {
                let enabled = self.enabled_edges(graph)?;
                for atom in graph.atoms() {
                    let asserted = self.lit_true(atom.lit)?;
                    let path = graph.bfs(atom.from, atom.to, atom.bound, &enabled);
                    match (asserted, path) {
                        (true, None) => {
                            // The atom needs more edges: one of the disabled
                            // edges leaving the reachable region must come up.
                            let mut clause = vec![!atom.lit];
                            clause.extend(graph.frontier(atom.from, atom.bound, &enabled));
                            learned.push(clause.into_iter().collect());
                        }
                        (false, Some(edges)) => {
                            // A forbidden connection exists: break this path
                            // or concede the atom.
                            let mut clause = vec![atom.lit];
                            clause.extend(edges.iter().map(|&e| !graph.enable(e)));
                            learned.push(clause.into_iter().collect());
                        }
                        _ => {}
                    }
                }
            }

            if learned.is_empty() {
                self.has_model = true;
                log::debug!("solve converged after {round} refinement rounds");
                return Ok(SolveOutcome::Sat);
            }
            round += 1;
            log::debug!("refinement round {round}: {} clauses", learned.len());
            self.pending.extend(learned);
        }
    }

    /// Reads a bit-vector's value from the model.
    pub fn value_bv(&self, bv: &BitVec) -> Result<u64, SolverError> {
        if !self.has_model {
            return Err(SolverError::NoModel);
        }
        let mut value = 0u64;
        for (i, &lit) in bv.lits().iter().enumerate() {
            if self.lit_true(lit)? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    /// Reads a Boolean term's value from the model.
    pub fn value_bool(&self, term: Bool) -> Result<bool, SolverError> {
        if !self.has_model {
            return Err(SolverError::NoModel);
        }
        match term {
            Bool::Const(b) => Ok(b),
            Bool::Term(lit) => self.lit_true(lit),
        }
    }

    /// Extracts a shortest enabled path between two nodes from the model.
    ///
    /// Returns the node sequence (including endpoints) and the edge
    /// sequence, or `NoModel`/`None`-like `Ok(None)` when unreachable.
    pub fn route_path(
        &self,
        id: GraphId,
        from: NodeIndex,
        to: NodeIndex,
    ) -> Result<Option<(Vec<NodeIndex>, Vec<EdgeIndex>)>, SolverError> {
        if !self.has_model {
            return Err(SolverError::NoModel);
        }
        let graph = &self.graphs[id.0];
        let enabled = self.enabled_edges(graph)?;
        let Some(edges) = graph.bfs(from, to, None, &enabled) else {
            return Ok(None);
        };
        let mut nodes = vec![from];
        for &edge in &edges {
            nodes.push(graph.edge_endpoints(edge).1);
        }
        Ok(Some((nodes, edges)))
    }
}

fn clause_from<const N: usize>(lits: [Lit; N]) -> Clause {
    lits.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("glucose", None).unwrap()
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(matches!(
            Session::new("z3", None),
            Err(SolverError::UnknownBackend(_))
        ));
    }

    #[test]
    fn pin_and_read_bitvector() {
        let mut sess = session();
        let x = sess.bv_var(4);
        let c = sess.eq_const(&x, 11);
        sess.assert_(c);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        assert_eq!(sess.value_bv(&x).unwrap(), 11);
    }

    #[test]
    fn eq_propagates() {
        let mut sess = session();
        let x = sess.bv_var(3);
        let y = sess.bv_var(3);
        let c = sess.eq_const(&x, 5);
        sess.assert_(c);
        let e = sess.eq(&x, &y);
        sess.assert_(e);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        assert_eq!(sess.value_bv(&y).unwrap(), 5);
    }

    #[test]
    fn eq_const_out_of_range_is_false() {
        let mut sess = session();
        let x = sess.bv_var(2);
        assert_eq!(sess.eq_const(&x, 4), Bool::Const(false));
    }

    #[test]
    fn distinct_conflicts_with_pins() {
        let mut sess = session();
        let x = sess.bv_var(2);
        let y = sess.bv_var(2);
        let cx = sess.eq_const(&x, 2);
        let cy = sess.eq_const(&y, 2);
        sess.assert_(cx);
        sess.assert_(cy);
        let d = sess.distinct(&[&x, &y]);
        sess.assert_(d);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Unsat);
    }

    #[test]
    fn distinct_satisfiable() {
        let mut sess = session();
        let x = sess.bv_var(2);
        let y = sess.bv_var(2);
        let d = sess.distinct(&[&x, &y]);
        sess.assert_(d);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        assert_ne!(sess.value_bv(&x).unwrap(), sess.value_bv(&y).unwrap());
    }

    #[test]
    fn assert_false_is_unsat() {
        let mut sess = session();
        sess.assert_(Bool::Const(false));
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Unsat);
    }

    #[test]
    fn or_of_pins() {
        let mut sess = session();
        let x = sess.bv_var(2);
        let a = sess.eq_const(&x, 1);
        let b = sess.eq_const(&x, 2);
        let either = sess.or(&[a, b]);
        sess.assert_(either);
        let not_one = sess.eq_const(&x, 1).negate();
        sess.assert_(not_one);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        assert_eq!(sess.value_bv(&x).unwrap(), 2);
    }

    #[test]
    fn reachability_finds_path() {
        let mut sess = session();
        let g = sess.add_graph();
        let a = sess.add_node(g, "a");
        let b = sess.add_node(g, "b");
        let c = sess.add_node(g, "c");
        sess.add_edge(g, a, b);
        sess.add_edge(g, b, c);
        let r = sess.reaches(g, a, c);
        sess.assert_(r);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        let (nodes, edges) = sess.route_path(g, a, c).unwrap().unwrap();
        assert_eq!(nodes, vec![a, b, c]);
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn negative_reachability_blocks_only_path() {
        // a -> b -> c with (a ~> c) required and (a ~> b) forbidden: the
        // only path to c runs through b, so this must be UNSAT.
        let mut sess = session();
        let g = sess.add_graph();
        let a = sess.add_node(g, "a");
        let b = sess.add_node(g, "b");
        let c = sess.add_node(g, "c");
        sess.add_edge(g, a, b);
        sess.add_edge(g, b, c);
        let r = sess.reaches(g, a, c);
        sess.assert_(r);
        let forbidden = sess.reaches(g, a, b);
        sess.assert_(forbidden.negate());
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Unsat);
    }

    #[test]
    fn negative_reachability_steers_around() {
        // Diamond a -> {b, c} -> d: forbidding a ~> b must route via c.
        let mut sess = session();
        let g = sess.add_graph();
        let a = sess.add_node(g, "a");
        let b = sess.add_node(g, "b");
        let c = sess.add_node(g, "c");
        let d = sess.add_node(g, "d");
        sess.add_edge(g, a, b);
        sess.add_edge(g, b, d);
        sess.add_edge(g, a, c);
        sess.add_edge(g, c, d);
        let r = sess.reaches(g, a, d);
        sess.assert_(r);
        let forbidden = sess.reaches(g, a, b);
        sess.assert_(forbidden.negate());
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
        let (nodes, _) = sess.route_path(g, a, d).unwrap().unwrap();
        assert_eq!(nodes, vec![a, c, d]);
    }

    #[test]
    fn distance_bound_unsat_on_long_path() {
        let mut sess = session();
        let g = sess.add_graph();
        let a = sess.add_node(g, "a");
        let b = sess.add_node(g, "b");
        let c = sess.add_node(g, "c");
        let d = sess.add_node(g, "d");
        sess.add_edge(g, a, b);
        sess.add_edge(g, b, c);
        sess.add_edge(g, c, d);
        let within = sess.distance_leq(g, a, d, 2);
        sess.assert_(within);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Unsat);
    }

    #[test]
    fn distance_bound_sat_on_short_path() {
        let mut sess = session();
        let g = sess.add_graph();
        let a = sess.add_node(g, "a");
        let b = sess.add_node(g, "b");
        let c = sess.add_node(g, "c");
        sess.add_edge(g, a, b);
        sess.add_edge(g, b, c);
        let within = sess.distance_leq(g, a, c, 2);
        sess.assert_(within);
        assert_eq!(sess.solve().unwrap(), SolveOutcome::Sat);
    }

    #[test]
    fn model_read_before_solve_fails() {
        let mut sess = session();
        let x = sess.bv_var(2);
        assert!(matches!(sess.value_bv(&x), Err(SolverError::NoModel)));
    }

    #[test]
    fn zero_budget_times_out() {
        let mut sess = Session::new("glucose", Some(Duration::ZERO)).unwrap();
        let x = sess.bv_var(2);
        let c = sess.eq_const(&x, 1);
        sess.assert_(c);
        assert!(matches!(sess.solve(), Err(SolverError::Timeout)));
    }
}
