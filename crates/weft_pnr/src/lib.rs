//! Constraint-based place-and-route engine for the Weft CGRA toolchain.
//!
//! This crate takes a mapped [`Design`](weft_design::Design) and a parsed
//! [`Fabric`](weft_fabric::Fabric) and drives the two solver-backed
//! engines:
//!
//! 1. **Place** — module-to-tile assignment as bit-vector constraints
//!    (legality, distinctness, register colors, adjacency, I/O pinning),
//!    with a strict-then-relaxed retry driver.
//! 2. **Route** — net routing as reachability on the fabric port/track
//!    graph, with driver exclusivity and per-net distance bounds.
//!
//! Between the two phases the fabric is mutated exactly once: every placed
//! pipeline register's switch-box port is split into a (sink, source) pair.
//!
//! # Usage
//!
//! ```ignore
//! let mut flow = PnrFlow::new(fabric, design, config);
//! flow.place()?;
//! flow.route()?;
//! assert_eq!(flow.stage(), Stage::Routed);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod place;
pub mod position;
pub mod route;
pub mod state;

pub use config::{Adjacency, AdjacencySpec, ConfigError, PnrConfig};
pub use error::PnrError;
pub use place::{assign_register_sides, split_registers, PlaceOutcome, Placer};
pub use position::Position;
pub use route::Router;
pub use state::{
    Placement, PlacementRecord, PlacementState, RoutedNet, RouteStep, RoutingState,
};

use weft_design::Design;
use weft_fabric::Fabric;

/// The bus width the router currently operates on. The 1-bit layer is
/// built by the fabric builder but stays unrouted until a 1-bit design
/// graph exists.
pub const ROUTE_WIDTH: u8 = 16;

/// Progress of a place-and-route job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing computed yet.
    Unplaced,
    /// Placement done (strictly or relaxed); registers not yet split.
    Placed(PlaceOutcome),
    /// Placement and routing both done.
    Routed,
}

/// A complete place-and-route job: owns the fabric, design, configuration,
/// and both state stores, and sequences the stage transitions.
pub struct PnrFlow {
    fabric: Fabric,
    design: Design,
    config: PnrConfig,
    placement: PlacementState,
    routing: RoutingState,
    stage: Stage,
}

impl PnrFlow {
    /// Creates a job over a fabric, design, and configuration.
    pub fn new(fabric: Fabric, design: Design, config: PnrConfig) -> Self {
        Self {
            fabric,
            design,
            config,
            placement: PlacementState::new(),
            routing: RoutingState::new(),
            stage: Stage::Unplaced,
        }
    }

    /// The fabric (with split register ports once routing has started).
    pub fn fabric(&self) -> &Fabric {
        &self.fabric
    }

    /// The design graph.
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// The placement state.
    pub fn placement(&self) -> &PlacementState {
        &self.placement
    }

    /// The routing state.
    pub fn routing(&self) -> &RoutingState {
        &self.routing
    }

    /// The current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Pre-pins modules from a placement snapshot. Only valid before
    /// [`place`](Self::place).
    pub fn seed_placement(&mut self, records: &[PlacementRecord]) -> Result<(), PnrError> {
        if self.stage != Stage::Unplaced {
            return Err(PnrError::InvalidStage("placement already computed"));
        }
        for record in records {
            let module = self
                .design
                .module_by_name(&record.module)
                .ok_or_else(|| PnrError::UnknownSnapshotModule(record.module.clone()))?;
            self.placement.insert(module.id, record.placement);
        }
        Ok(())
    }

    /// Runs placement (strict, then relaxed on UNSAT).
    pub fn place(&mut self) -> Result<PlaceOutcome, PnrError> {
        if self.stage != Stage::Unplaced {
            return Err(PnrError::InvalidStage("place on an already-placed job"));
        }
        let outcome =
            Placer::new(&self.fabric, &self.design, &self.config).place(&mut self.placement)?;
        self.stage = Stage::Placed(outcome);
        Ok(outcome)
    }

    /// Splits placed registers, then routes every 16-bit net.
    pub fn route(&mut self) -> Result<(), PnrError> {
        let Stage::Placed(_) = self.stage else {
            return Err(PnrError::InvalidStage("route requires a placed design"));
        };
        split_registers(
            &mut self.fabric,
            &self.design,
            &mut self.placement,
            ROUTE_WIDTH,
        )?;
        if self.design.physical_nets(1).next().is_some() {
            log::warn!("design has 1-bit nets; the 1-bit routing layer is not driven yet");
        }
        Router::new(&self.fabric, &self.design, &self.config, ROUTE_WIDTH)
            .route(&self.placement, &mut self.routing)?;
        self.stage = Stage::Routed;
        Ok(())
    }
}
