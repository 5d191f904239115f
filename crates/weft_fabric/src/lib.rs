//! In-memory CGRA fabric model and XML fabric builder.
//!
//! A [`Fabric`] is the routable view of a rectangular CGRA: per-bus-width
//! [`FabricLayer`]s of [`Port`]s connected by directed [`Track`]s, plus the
//! resource location sets used by placement. The [`builder`] module parses
//! the fabric XML description, synthesizes the port/track graph (collapsing
//! redundant adjacency ports between neighboring tiles), and records the
//! wire-name annotations consumed by the bitstream writer.
//!
//! The fabric is immutable after construction with one exception: the
//! register-split pass, which materializes pipeline-register ports at the
//! switch-box slots chosen by placement.

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod fabric;
pub mod layer;
pub mod port;

pub use builder::{load_fabric, parse_fabric};
pub use error::FabricError;
pub use fabric::Fabric;
pub use layer::FabricLayer;
pub use port::{Port, PortDir, PortKey, PortRole, Track, TrackNote, TrackParent};
