//! Error taxonomy for graph, path, and conversion operations.
//!
//! Document loading keeps `anyhow` (I/O plus schema context); everything the
//! core algorithms can reject is typed here so callers can distinguish a
//! broken chain from an unsupported release delta.

use crate::catalog::identity::{ModelVersion, NodeCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Broken parent/child chain or otherwise malformed node sequence.
    #[error("invalid chain: {0}")]
    Structural(String),

    /// Disagreeing locations inside one individualizable set, or a
    /// composition marker standing alone.
    #[error("individualization conflict: {0}")]
    IndividualizationConflict(String),

    /// A multi-parent node blocked the deterministic ascent to the root
    /// while assembling a parsed path.
    #[error("ambiguous ascent to root at '{0}': node has multiple parents")]
    AmbiguousRootPath(NodeCode),

    /// Code absent from the named release's model.
    #[error("unknown code '{code}' in release {version}")]
    UnknownCode { code: NodeCode, version: ModelVersion },

    /// Invalid or unordered release arguments, or a missing step table.
    #[error("version range error: {0}")]
    VersionRange(String),

    /// A structural release delta the conversion algorithm cannot resolve.
    /// Never approximated; the caller must handle or surface it.
    #[error("unsupported conversion: {0}")]
    UnsupportedConversion(String),
}
