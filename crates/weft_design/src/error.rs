//! Error types for design loading and validation.

/// Errors raised while loading or validating a mapped design.
#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    /// An I/O error occurred while reading the design file.
    #[error("failed to read design: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON content could not be parsed.
    #[error("failed to parse design: {0}")]
    Parse(#[from] serde_json::Error),

    /// A net references a module name that does not exist.
    #[error("net {net_index} references unknown module '{name}'")]
    UnknownModule {
        /// Index of the offending net in the design file.
        net_index: usize,
        /// The unresolved module name.
        name: String,
    },

    /// Two modules share a name.
    #[error("duplicate module name '{0}'")]
    DuplicateModule(String),

    /// A fused module has more than one input net.
    #[error("fused module '{module}' has {inputs} input nets (at most 1 allowed)")]
    FusedFanin {
        /// The offending module.
        module: String,
        /// Its input net count.
        inputs: usize,
    },

    /// A net uses a bus width with no routing layer.
    #[error("net {net_index} has unsupported bus width {width} (expected 1 or 16)")]
    UnsupportedWidth {
        /// Index of the offending net in the design file.
        net_index: usize,
        /// The unsupported width.
        width: u8,
    },
}
