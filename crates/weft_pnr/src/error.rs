//! Error surface of the place-and-route engine.

use weft_design::DesignError;
use weft_fabric::FabricError;
use weft_solver::SolverError;

/// Errors raised by the place-and-route engine.
#[derive(Debug, thiserror::Error)]
pub enum PnrError {
    /// Fabric parsing or mutation failed.
    #[error("fabric error: {0}")]
    Fabric(#[from] FabricError),

    /// Design loading failed (propagated unchanged from the loader).
    #[error("design error: {0}")]
    Design(#[from] DesignError),

    /// Both the strict and the relaxed placement constraint sets are
    /// unsatisfiable.
    #[error("design is unplaceable (strict and relaxed constraint sets both unsatisfiable)")]
    Unplaceable,

    /// Routing is unsatisfiable under the configured distance bound.
    #[error("design is unroutable under the configured distance bound")]
    Unroutable,

    /// The routing model assigned two drivers to one sink. This indicates
    /// an encoding or solver bug and is fatal.
    #[error("illegal routing: {track} driven by both '{driver_a}' and '{driver_b}'")]
    IllegalRouting {
        /// Display name of the doubly-driven sink port.
        track: String,
        /// First recorded driver module.
        driver_a: String,
        /// Conflicting driver module.
        driver_b: String,
    },

    /// The theory backend failed or timed out.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// A module the engine needs a placement for has none.
    #[error("no placement recorded for module '{0}'")]
    MissingPlacement(String),

    /// A placed endpoint does not correspond to a fabric port.
    #[error("no fabric port for {0}")]
    MissingPort(String),

    /// An operation was attempted in the wrong pipeline stage.
    #[error("invalid stage: {0}")]
    InvalidStage(&'static str),

    /// A placement snapshot names a module absent from the design.
    #[error("placement snapshot references unknown module '{0}'")]
    UnknownSnapshotModule(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_illegal_routing() {
        let err = PnrError::IllegalRouting {
            track: "(1, 0)W_i[0]".into(),
            driver_a: "add_0".into(),
            driver_b: "add_1".into(),
        };
        assert_eq!(
            format!("{err}"),
            "illegal routing: (1, 0)W_i[0] driven by both 'add_0' and 'add_1'"
        );
    }

    #[test]
    fn solver_error_is_transparent() {
        let err: PnrError = SolverError::Timeout.into();
        assert_eq!(format!("{err}"), "solver wall-clock budget exhausted");
    }
}
