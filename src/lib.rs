//! Shared library for the keelgraph vessel taxonomy engine.
//!
//! The crate loads versioned taxonomy releases (directed acyclic-ish graphs of
//! equipment and function nodes), traverses them, parses short and full path
//! strings into validated root-to-terminal chains with location
//! individualization, and converts nodes and paths between releases through
//! per-step conversion tables. Release and conversion documents are JSON,
//! validated against the schemas under `schema/` before use.

pub mod catalog;
pub mod convert;
pub mod error;
pub mod model;
pub mod parse;
pub mod path;
pub mod registry;
mod schema_loader;

pub use catalog::{
    ConversionDocument, ConversionEntryDef, ConversionOp, Location, ModelVersion, NodeCatalog,
    NodeCategory, NodeCode, NodeDef, NodeIndex, NodeRecord, NodeType, ROOT_CODE, ReleaseDocument,
    load_conversion_from_path, load_release_from_path,
};
pub use convert::{ConversionTable, VersionConverter};
pub use error::ModelError;
pub use model::{Model, TraversalOptions, TraverseControl};
pub use parse::{parse_full, parse_full_diagnostic, parse_short, parse_short_diagnostic};
pub use path::{IndividualizableSet, Path, PathSegment};
pub use registry::ModelRegistry;
