//! The mapped design graph consumed by the Weft place-and-route engine.
//!
//! A [`Design`] is a set of coarse-grained [`Module`]s (PEs, memories,
//! pipeline registers, I/O endpoints) connected by [`Net`]s. Designs are
//! loaded from the mapped-design JSON emitted by the front-end mapper.
//!
//! Fused modules (collapsed into their producer during technology mapping)
//! are kept in the graph but excluded from placement and routing; the
//! [`VirtualNet`] view contracts every fused chain down to its nearest
//! non-fused producer so the solvers only ever see placeable endpoints.

#![warn(missing_docs)]

pub mod data;
pub mod error;
pub mod loader;

pub use data::{Design, Module, Net, VirtualNet};
pub use error::DesignError;
pub use loader::{load_design, parse_design, PE_OUT};
