//! Solver façade: bit-vectors and reachability graphs over a SAT backend.
//!
//! The place-and-route engines talk to one [`Session`] type that composes
//! two theories:
//!
//! - **Bit-vectors** — coordinate variables with equality, constant
//!   equality, and pairwise distinctness, Tseitin-encoded straight into the
//!   backend's clause database.
//! - **Reachability graphs** — directed graphs whose edges carry *enable*
//!   literals. `reaches(u, v)` and `distance_leq(u, v, k)` produce Boolean
//!   atoms that are made consistent with the enabled-edge subgraph by a
//!   lazy refinement loop inside [`Session::solve`]: violated atoms learn a
//!   frontier or path clause and the backend re-solves until a fixpoint.
//!
//! Sessions are scoped: one per placement or routing attempt, dropped on
//! every exit path. A wall-clock budget may be attached; it is checked
//! between refinement rounds and surfaces as [`SolverError::Timeout`].

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod session;
pub mod term;

pub use error::SolverError;
pub use graph::{GraphId, ReachGraph};
pub use session::{Session, SolveOutcome};
pub use term::{bits_needed, BitVec, Bool};

/// Node handle within a reachability graph.
pub type NodeRef = petgraph::graph::NodeIndex;
/// Edge handle within a reachability graph.
pub type EdgeRef = petgraph::graph::EdgeIndex;
