//! Error types surfaced by the solver façade.

/// Errors raised by the solver façade or its backend.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The SAT backend reported a failure.
    #[error("solver backend failure: {0}")]
    Backend(#[from] anyhow::Error),

    /// The wall-clock budget attached to the session was exhausted.
    #[error("solver wall-clock budget exhausted")]
    Timeout,

    /// The backend was interrupted mid-solve.
    #[error("solver interrupted")]
    Interrupted,

    /// A model value was requested without a satisfiable solve.
    #[error("model value requested before a satisfiable solve")]
    NoModel,

    /// The configured backend name is not built in.
    #[error("unknown solver backend '{0}'")]
    UnknownBackend(String),
}
