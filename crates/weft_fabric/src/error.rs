//! Error types for fabric parsing and mutation.

use weft_common::WireNameError;

/// Errors raised while parsing the fabric XML or mutating the fabric.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// An I/O error occurred while reading the fabric file.
    #[error("failed to read fabric: {0}")]
    Io(#[from] std::io::Error),

    /// The XML document could not be parsed.
    #[error("failed to parse fabric XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The document parsed but describes an inconsistent fabric.
    #[error("malformed fabric: {0}")]
    Malformed(String),

    /// A wire name did not follow the expected grammar.
    #[error(transparent)]
    Wire(#[from] WireNameError),

    /// A wire name resolved to a port that does not exist.
    #[error("no port at {0}")]
    UnknownPort(String),

    /// A bus width has no routing layer.
    #[error("no routing layer for bus width {0}")]
    UnknownLayer(u8),
}

impl FabricError {
    /// Shorthand for a [`FabricError::Malformed`] with formatted detail.
    pub fn malformed(detail: impl Into<String>) -> Self {
        FabricError::Malformed(detail.into())
    }
}
