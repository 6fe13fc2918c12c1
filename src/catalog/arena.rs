//! Frozen per-release node arena.
//!
//! The catalog is built in two passes from a release document: allocate every
//! node in an index-stable vector and resolve codes through a hash map, then
//! populate child/parent index lists from the relation pairs. Once built the
//! graph is immutable and freely shareable; nodes never carry locations,
//! those live on path segments.

use crate::catalog::identity::{NodeCategory, NodeCode, NodeType};
use crate::catalog::model::{NodeDef, ReleaseDocument};
use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Sentinel code of the single root node every release must define.
pub const ROOT_CODE: &str = "VE";

/// Stable index of a node inside one release's arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Immutable node payload held by the arena.
#[derive(Clone, Debug)]
pub struct NodeRecord {
    pub code: NodeCode,
    pub category: NodeCategory,
    pub node_type: NodeType,
    pub name: String,
    pub common_name: Option<String>,
    pub definition: Option<String>,
    pub common_definition: Option<String>,
    pub install_substructure: Option<bool>,
    pub normal_assignment_names: BTreeMap<NodeCode, String>,
}

impl NodeRecord {
    fn from_def(def: &NodeDef) -> Self {
        NodeRecord {
            code: def.code.clone(),
            category: def.category.clone(),
            node_type: def.node_type.clone(),
            name: def.name.clone(),
            common_name: def.common_name.clone(),
            definition: def.definition.clone(),
            common_definition: def.common_definition.clone(),
            install_substructure: def.install_substructure,
            normal_assignment_names: def.normal_assignment_names.clone(),
        }
    }

    /// Leaf nodes are the only ancestors rendered in short path form.
    pub fn is_leaf(&self) -> bool {
        matches!(
            (&self.category, &self.node_type),
            (NodeCategory::AssetFunction, NodeType::Leaf)
                | (NodeCategory::ProductFunction, NodeType::Leaf)
        )
    }

    pub fn is_function_composition(&self) -> bool {
        matches!(
            &self.category,
            NodeCategory::AssetFunction | NodeCategory::ProductFunction
        ) && self.node_type == NodeType::Composition
    }

    pub fn is_product_type(&self) -> bool {
        self.category == NodeCategory::Product && self.node_type == NodeType::Type
    }

    pub fn is_product_selection(&self) -> bool {
        self.category == NodeCategory::Product && self.node_type == NodeType::Selection
    }

    pub fn is_asset(&self) -> bool {
        self.category == NodeCategory::Asset
            && matches!(self.node_type, NodeType::Type | NodeType::Selection)
    }

    pub fn is_asset_function(&self) -> bool {
        self.category == NodeCategory::AssetFunction
    }

    /// Run-boundary classification; boundaries delimit individualizable sets.
    pub fn is_potential_parent(&self) -> bool {
        self.node_type.is_potential_parent()
    }

    /// Whether this node may carry a location at a given path position.
    ///
    /// Composition markers only qualify when their code ends in `i`, when the
    /// position is the path terminal, or when they sit inside a wider set.
    pub fn is_individualizable(&self, is_target: bool, in_set: bool) -> bool {
        if matches!(self.node_type, NodeType::Group | NodeType::Selection) {
            return false;
        }
        if self.is_product_type() {
            return false;
        }
        if self.category == NodeCategory::Asset && self.node_type == NodeType::Type {
            return false;
        }
        if self.is_function_composition() {
            return self.code.as_str().ends_with('i') || in_set || is_target;
        }
        true
    }
}

/// Frozen node arena for one release: records plus adjacency index lists.
#[derive(Debug)]
pub struct NodeCatalog {
    nodes: Vec<NodeRecord>,
    index: HashMap<NodeCode, NodeIndex>,
    children: Vec<Vec<NodeIndex>>,
    parents: Vec<Vec<NodeIndex>>,
    root: NodeIndex,
}

impl NodeCatalog {
    /// Two-pass build from a release document, frozen on return.
    ///
    /// Strict about duplicates, dangling relation codes, and the root
    /// contract (present, zero parents) so models cannot be built from
    /// inconsistent documents.
    pub fn from_document(document: &ReleaseDocument) -> Result<Self> {
        if document.items.is_empty() {
            bail!("release document contains no nodes");
        }

        let mut nodes = Vec::with_capacity(document.items.len());
        let mut index = HashMap::with_capacity(document.items.len());
        for def in &document.items {
            if def.code.as_str().trim().is_empty() {
                bail!("encountered node with empty code");
            }
            let idx = NodeIndex(nodes.len() as u32);
            if index.insert(def.code.clone(), idx).is_some() {
                bail!("duplicate node code {}", def.code);
            }
            nodes.push(NodeRecord::from_def(def));
        }

        let mut children: Vec<Vec<NodeIndex>> = vec![Vec::new(); nodes.len()];
        let mut parents: Vec<Vec<NodeIndex>> = vec![Vec::new(); nodes.len()];
        for [parent_code, child_code] in &document.relations {
            let Some(&parent) = index.get(parent_code) else {
                bail!("relation references unknown parent {parent_code}");
            };
            let Some(&child) = index.get(child_code) else {
                bail!("relation references unknown child {child_code}");
            };
            if !children[parent.as_usize()].contains(&child) {
                children[parent.as_usize()].push(child);
            }
            if !parents[child.as_usize()].contains(&parent) {
                parents[child.as_usize()].push(parent);
            }
        }

        let Some(&root) = index.get(&NodeCode(ROOT_CODE.to_string())) else {
            bail!("release document has no root node '{ROOT_CODE}'");
        };
        if !parents[root.as_usize()].is_empty() {
            bail!("root node '{ROOT_CODE}' must not have parents");
        }

        Ok(NodeCatalog {
            nodes,
            index,
            children,
            parents,
            root,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn index_of(&self, code: &NodeCode) -> Option<NodeIndex> {
        self.index.get(code).copied()
    }

    pub fn record(&self, idx: NodeIndex) -> &NodeRecord {
        &self.nodes[idx.as_usize()]
    }

    pub fn code(&self, idx: NodeIndex) -> &NodeCode {
        &self.nodes[idx.as_usize()].code
    }

    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.children[idx.as_usize()]
    }

    pub fn parents(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.parents[idx.as_usize()]
    }

    pub fn is_root(&self, idx: NodeIndex) -> bool {
        idx == self.root
    }

    pub fn is_child(&self, parent: NodeIndex, child: NodeIndex) -> bool {
        self.children[parent.as_usize()].contains(&child)
    }

    /// Iterates (code, index) pairs in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeCode, NodeIndex)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, record)| (&record.code, NodeIndex(i as u32)))
    }

    /// The node's structural normal assignment: its single child, when that
    /// child is a product type under a function-category parent.
    pub fn product_type_child(&self, idx: NodeIndex) -> Option<NodeIndex> {
        let kids = self.children(idx);
        if kids.len() != 1 {
            return None;
        }
        let child = kids[0];
        let parent_is_function = self.record(idx).category.is_function();
        if parent_is_function && self.record(child).is_product_type() {
            Some(child)
        } else {
            None
        }
    }

    /// Edge classification used to relax the traversal occurrence cap.
    pub fn is_product_selection_assignment(&self, parent: NodeIndex, child: NodeIndex) -> bool {
        self.record(parent).category.is_function()
            && self.record(child).is_product_selection()
    }
}
