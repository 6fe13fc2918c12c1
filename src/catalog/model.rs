//! Deserializable representation of taxonomy release and conversion documents.
//!
//! The types mirror the document schemas so loaders and tests can reason about
//! release data without ad-hoc JSON handling. Use `NodeCatalog` for the frozen
//! arena and lookup; use these structs when the raw document surface is
//! required (descriptive fields, relation lists, conversion operations).

use crate::catalog::identity::{ModelVersion, NodeCategory, NodeCode, NodeType};
use crate::schema_loader::validate_document;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
/// Full taxonomy release document as stored on disk.
pub struct ReleaseDocument {
    pub version: ModelVersion,
    pub items: Vec<NodeDef>,
    /// Parent/child code pairs; order follows the document.
    pub relations: Vec<[NodeCode; 2]>,
}

#[derive(Clone, Debug, Deserialize)]
/// One node definition inside a release document.
pub struct NodeDef {
    pub code: NodeCode,
    pub category: NodeCategory,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "commonName")]
    pub common_name: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default, rename = "commonDefinition")]
    pub common_definition: Option<String>,
    #[serde(default, rename = "installSubstructure")]
    pub install_substructure: Option<bool>,
    #[serde(default, rename = "normalAssignmentNames")]
    pub normal_assignment_names: BTreeMap<NodeCode, String>,
}

#[derive(Clone, Debug, Deserialize)]
/// Conversion table for one release step, keyed by source code.
///
/// `version` names the step's *target* release; the table applies when
/// stepping from the previous release in registry order into `version`.
pub struct ConversionDocument {
    pub version: ModelVersion,
    pub items: BTreeMap<NodeCode, ConversionEntryDef>,
}

#[derive(Clone, Debug, Deserialize)]
/// One conversion entry: operation set plus rename/assignment payload.
pub struct ConversionEntryDef {
    #[serde(rename = "operations")]
    pub operations: BTreeSet<ConversionOp>,
    pub source: NodeCode,
    #[serde(default)]
    pub target: Option<NodeCode>,
    #[serde(default, rename = "oldAssignment")]
    pub old_assignment: Option<NodeCode>,
    #[serde(default, rename = "newAssignment")]
    pub new_assignment: Option<NodeCode>,
    #[serde(default, rename = "deleteAssignment")]
    pub delete_assignment: bool,
}

/// Conversion operations a release step may declare for a source code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Deserialize)]
pub enum ConversionOp {
    #[serde(rename = "changeCode")]
    ChangeCode,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "move")]
    Move,
    #[serde(rename = "assignmentChange")]
    AssignmentChange,
    #[serde(rename = "assignmentDelete")]
    AssignmentDelete,
}

impl ConversionEntryDef {
    /// Code the source resolves to in the next release (unchanged if `None`).
    pub fn rename_target(&self) -> Option<&NodeCode> {
        self.target.as_ref()
    }
}

/// Read, schema-validate, and parse a release document from disk.
pub fn load_release_from_path(path: &Path) -> Result<ReleaseDocument> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading release document {}", path.display()))?;
    validate_document(&data, "taxonomy_release.schema.json")
        .with_context(|| format!("validating release document {}", path.display()))?;
    let document: ReleaseDocument = serde_json::from_str(&data)
        .with_context(|| format!("parsing release document {}", path.display()))?;
    Ok(document)
}

/// Read, schema-validate, and parse a conversion table document from disk.
pub fn load_conversion_from_path(path: &Path) -> Result<ConversionDocument> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading conversion document {}", path.display()))?;
    validate_document(&data, "conversion_table.schema.json")
        .with_context(|| format!("validating conversion document {}", path.display()))?;
    let document: ConversionDocument = serde_json::from_str(&data)
        .with_context(|| format!("parsing conversion document {}", path.display()))?;
    Ok(document)
}
