//! Place-and-route configuration, loaded from `weft.toml`.

use serde::Deserialize;
use std::path::Path;

/// Errors raised when loading or validating a `weft.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    Validation(String),
}

/// The adjacency constraint applied during strict placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjacency {
    /// Every connected pair must sit on orthogonally adjacent tiles.
    NearestNeighbor,
    /// Every connected pair must sit within Manhattan radius `r`.
    Radius(u32),
}

/// Raw adjacency value as written in TOML: either the string
/// `"nearest-neighbor"` or a `{ radius = r }` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AdjacencySpec {
    /// A `{ radius = r }` table.
    Radius {
        /// Manhattan radius.
        radius: u32,
    },
    /// A named strategy.
    Name(String),
}

impl Default for AdjacencySpec {
    fn default() -> Self {
        AdjacencySpec::Name("nearest-neighbor".to_string())
    }
}

impl AdjacencySpec {
    /// Resolves the raw spec to a strategy, rejecting unknown names and a
    /// zero radius.
    pub fn resolve(&self) -> Result<Adjacency, ConfigError> {
        match self {
            AdjacencySpec::Radius { radius: 0 } => Err(ConfigError::Validation(
                "adjacency radius must be at least 1".to_string(),
            )),
            AdjacencySpec::Radius { radius } => Ok(Adjacency::Radius(*radius)),
            AdjacencySpec::Name(name) if name == "nearest-neighbor" => {
                Ok(Adjacency::NearestNeighbor)
            }
            AdjacencySpec::Name(name) => Err(ConfigError::Validation(format!(
                "unknown adjacency strategy '{name}'"
            ))),
        }
    }
}

fn default_dist_factor() -> u32 {
    1
}

fn default_solver() -> String {
    "glucose".to_string()
}

fn default_register_width() -> usize {
    2
}

/// Place-and-route configuration.
///
/// Only the knobs the engine reads are recognized; unknown keys are
/// rejected at parse time.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PnrConfig {
    /// Routing slack multiplier for the per-net distance bound (`>= 1`).
    #[serde(default = "default_dist_factor")]
    pub dist_factor: u32,

    /// Adjacency strategy for strict placement.
    #[serde(default)]
    pub adjacency: AdjacencySpec,

    /// Theory backend name.
    #[serde(default = "default_solver")]
    pub solver: String,

    /// Width in bits of the pipeline-color field on register positions.
    #[serde(default = "default_register_width")]
    pub register_width: usize,

    /// Optional wall-clock budget per solver session, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for PnrConfig {
    fn default() -> Self {
        Self {
            dist_factor: default_dist_factor(),
            adjacency: AdjacencySpec::default(),
            solver: default_solver(),
            register_width: default_register_width(),
            timeout_ms: None,
        }
    }
}

impl PnrConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses and validates configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: PnrConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and the backend name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dist_factor < 1 {
            return Err(ConfigError::Validation(
                "dist_factor must be at least 1".to_string(),
            ));
        }
        if self.register_width < 1 || self.register_width > 8 {
            return Err(ConfigError::Validation(format!(
                "register_width {} out of range 1..=8",
                self.register_width
            )));
        }
        if self.solver != "glucose" {
            return Err(ConfigError::Validation(format!(
                "unknown solver backend '{}'",
                self.solver
            )));
        }
        self.adjacency.resolve()?;
        Ok(())
    }

    /// The resolved adjacency strategy. Valid after [`validate`](Self::validate).
    pub fn adjacency(&self) -> Adjacency {
        self.adjacency
            .resolve()
            .unwrap_or(Adjacency::NearestNeighbor)
    }

    /// The solver budget as a duration, if configured.
    pub fn budget(&self) -> Option<std::time::Duration> {
        self.timeout_ms.map(std::time::Duration::from_millis)
    }
}
