//! Release documents and the frozen node arena built from them.

pub mod arena;
pub mod identity;
pub mod model;

pub use arena::{NodeCatalog, NodeIndex, NodeRecord, ROOT_CODE};
pub use identity::{Location, ModelVersion, NodeCategory, NodeCode, NodeType};
pub use model::{
    ConversionDocument, ConversionEntryDef, ConversionOp, NodeDef, ReleaseDocument,
    load_conversion_from_path, load_release_from_path,
};
