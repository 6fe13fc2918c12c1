use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Versioned label for a taxonomy release (e.g., `3-4a`).
///
/// Stored alongside paths so consumers can resolve node codes against the
/// correct release snapshot. Labels are opaque; their linear order comes from
/// registration order in the `ModelRegistry`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(pub String);

/// Stable short identifier for an individual taxonomy node.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeCode(pub String);

/// Opaque physical-placement qualifier attached to a node within a path.
///
/// The core only compares locations for equality. `parse` enforces the
/// path-safe token syntax; what a location means is up to the caller.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(pub String);

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for NodeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ModelVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl NodeCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Location {
    /// Accepts a path-safe location token: non-empty ASCII alphanumerics.
    /// Separator characters would be ambiguous inside rendered paths.
    pub fn parse(value: &str) -> Option<Location> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Location(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// High-level node grouping mirrored from the release schema.
///
/// Known variants keep serialization consistent; `Other` preserves forward
/// compatibility with releases that introduce new categories.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NodeCategory {
    Asset,
    AssetFunction,
    Product,
    ProductFunction,
    Other(String),
}

/// Structural role of a node within its category.
///
/// The values align with the release schema; `Other` allows new types to be
/// represented without breaking older consumers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NodeType {
    Group,
    Selection,
    Leaf,
    Type,
    Composition,
    Other(String),
}

impl Serialize for NodeCategory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_str(&value))
    }
}

impl NodeCategory {
    pub fn as_str(&self) -> &str {
        match self {
            NodeCategory::Asset => "ASSET",
            NodeCategory::AssetFunction => "ASSET FUNCTION",
            NodeCategory::Product => "PRODUCT",
            NodeCategory::ProductFunction => "PRODUCT FUNCTION",
            NodeCategory::Other(value) => value.as_str(),
        }
    }

    fn from_str(value: &str) -> Self {
        match value {
            "ASSET" => NodeCategory::Asset,
            "ASSET FUNCTION" => NodeCategory::AssetFunction,
            "PRODUCT" => NodeCategory::Product,
            "PRODUCT FUNCTION" => NodeCategory::ProductFunction,
            other => NodeCategory::Other(other.to_string()),
        }
    }

    /// Function categories are everything outside plain products and assets.
    pub fn is_function(&self) -> bool {
        !matches!(self, NodeCategory::Product | NodeCategory::Asset)
    }
}

impl Serialize for NodeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_str(&value))
    }
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Group => "GROUP",
            NodeType::Selection => "SELECTION",
            NodeType::Leaf => "LEAF",
            NodeType::Type => "TYPE",
            NodeType::Composition => "COMPOSITION",
            NodeType::Other(value) => value.as_str(),
        }
    }

    fn from_str(value: &str) -> Self {
        match value {
            "GROUP" => NodeType::Group,
            "SELECTION" => NodeType::Selection,
            "LEAF" => NodeType::Leaf,
            "TYPE" => NodeType::Type,
            "COMPOSITION" => NodeType::Composition,
            other => NodeType::Other(other.to_string()),
        }
    }

    /// Potential-parent boundary types delimit individualizable runs.
    pub fn is_potential_parent(&self) -> bool {
        matches!(self, NodeType::Selection | NodeType::Group | NodeType::Leaf)
    }
}
