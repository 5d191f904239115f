//! Shared foundational types for the Weft CGRA toolchain.
//!
//! This crate provides the opaque ID newtypes used as arena indices, the
//! fabric geometry primitives ([`Side`], [`Resource`], side mapping), and the
//! switch-box / memory wire-name grammar shared by the fabric builder and the
//! bitstream writer.

#![warn(missing_docs)]

pub mod geom;
pub mod ids;
pub mod wire;

pub use geom::{map_side, Resource, Side};
pub use ids::{ModuleId, NetId, PortId, TrackId};
pub use wire::{parse_mem_wire, parse_sb_wire, WireDir, WireName, WireNameError};
