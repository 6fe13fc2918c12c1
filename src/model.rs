//! One loaded release version and the traversal engine over its node graph.

use crate::catalog::{ModelVersion, NodeCatalog, NodeCode, NodeIndex, ReleaseDocument};
use crate::error::ModelError;
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::Path as FsPath;

/// Handler verdict for each visited node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraverseControl {
    Continue,
    SkipSubtree,
    Stop,
}

/// Traversal knobs; the occurrence cap bounds how many times one node may
/// appear on the current ancestor stack, which is what keeps walks over the
/// graph's directed cycles finite.
#[derive(Clone, Copy, Debug)]
pub struct TraversalOptions {
    pub max_occurrence: usize,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        TraversalOptions { max_occurrence: 1 }
    }
}

struct ParentsStack {
    chain: Vec<NodeIndex>,
    counts: HashMap<NodeIndex, usize>,
}

impl ParentsStack {
    fn new() -> Self {
        ParentsStack {
            chain: Vec::with_capacity(32),
            counts: HashMap::new(),
        }
    }

    fn push(&mut self, node: NodeIndex) {
        self.chain.push(node);
        *self.counts.entry(node).or_insert(0) += 1;
    }

    fn pop(&mut self) {
        if let Some(node) = self.chain.pop() {
            if let Some(count) = self.counts.get_mut(&node) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&node);
                }
            }
        }
    }

    fn occurrences(&self, node: NodeIndex) -> usize {
        self.counts.get(&node).copied().unwrap_or(0)
    }

    fn last(&self) -> Option<NodeIndex> {
        self.chain.last().copied()
    }
}

/// A single taxonomy release: its version label plus the frozen node arena.
#[derive(Debug)]
pub struct Model {
    version: ModelVersion,
    catalog: NodeCatalog,
}

impl Model {
    pub fn from_document(document: &ReleaseDocument) -> Result<Self> {
        if document.version.as_str().trim().is_empty() {
            bail!("release document has empty version");
        }
        let catalog = NodeCatalog::from_document(document)
            .with_context(|| format!("building catalog for version {}", document.version))?;
        Ok(Model {
            version: document.version.clone(),
            catalog,
        })
    }

    pub fn load_from_path(path: &FsPath) -> Result<Self> {
        let document = crate::catalog::load_release_from_path(path)?;
        Model::from_document(&document)
    }

    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    pub fn catalog(&self) -> &NodeCatalog {
        &self.catalog
    }

    pub fn root(&self) -> NodeIndex {
        self.catalog.root()
    }

    pub fn node(&self, code: &NodeCode) -> Option<NodeIndex> {
        self.catalog.index_of(code)
    }

    /// Code lookup that reports the version it failed in.
    pub fn resolve(&self, code: &NodeCode) -> Result<NodeIndex, ModelError> {
        self.catalog.index_of(code).ok_or_else(|| ModelError::UnknownCode {
            code: code.clone(),
            version: self.version.clone(),
        })
    }

    /// Depth-first walk from the root with default options. Returns true when
    /// the walk ran to completion, false when the handler stopped it.
    pub fn traverse<F>(&self, handler: F) -> bool
    where
        F: FnMut(&[NodeIndex], NodeIndex) -> TraverseControl,
    {
        self.traverse_from(self.root(), TraversalOptions::default(), handler)
    }

    pub fn traverse_from<F>(
        &self,
        start: NodeIndex,
        options: TraversalOptions,
        mut handler: F,
    ) -> bool
    where
        F: FnMut(&[NodeIndex], NodeIndex) -> TraverseControl,
    {
        tracing::trace!(
            version = %self.version,
            start = %self.catalog.code(start),
            "starting traversal"
        );
        let mut stack = ParentsStack::new();
        self.traverse_node(&mut stack, start, options.max_occurrence, &mut handler)
            != TraverseControl::Stop
    }

    fn traverse_node<F>(
        &self,
        stack: &mut ParentsStack,
        node: NodeIndex,
        max_occurrence: usize,
        handler: &mut F,
    ) -> TraverseControl
    where
        F: FnMut(&[NodeIndex], NodeIndex) -> TraverseControl,
    {
        if self.catalog.record(node).install_substructure == Some(false) {
            return TraverseControl::Continue;
        }
        let verdict = handler(&stack.chain, node);
        if verdict != TraverseControl::Continue {
            return verdict;
        }

        // Function-to-selection edges are revisited freely; every other edge
        // is clamped by the occurrence cap.
        let skip_occurrence_check = stack
            .last()
            .is_some_and(|parent| self.catalog.is_product_selection_assignment(parent, node));
        if !skip_occurrence_check {
            let occurrences = stack.occurrences(node);
            debug_assert!(occurrences <= max_occurrence, "occurrence cap already exceeded");
            if occurrences >= max_occurrence {
                return TraverseControl::SkipSubtree;
            }
        }

        stack.push(node);
        for &child in self.catalog.children(node) {
            if self.traverse_node(stack, child, max_occurrence, handler) == TraverseControl::Stop {
                return TraverseControl::Stop;
            }
        }
        stack.pop();
        TraverseControl::Continue
    }

    /// Checks whether a path to `to` exists that passes through every node of
    /// `from_chain`, and returns the ancestors of that path not already in the
    /// chain. The search is rooted at the chain's last asset function node so
    /// it stays local instead of sweeping the whole graph.
    pub fn path_exists_between(
        &self,
        from_chain: &[NodeIndex],
        to: NodeIndex,
    ) -> Result<(bool, Vec<NodeIndex>), ModelError> {
        let start = from_chain
            .iter()
            .rev()
            .copied()
            .find(|&idx| self.catalog.record(idx).is_asset_function())
            .unwrap_or_else(|| self.root());

        let target_code = self.catalog.code(to).clone();
        let mut found = false;
        let mut remaining: Vec<NodeIndex> = Vec::new();
        let mut ascent_error: Option<ModelError> = None;

        self.traverse_from(start, TraversalOptions::default(), |parents, node| {
            if self.catalog.code(node) != &target_code {
                return TraverseControl::Continue;
            }

            // When the walk started below the root, rebuild the full ancestor
            // chain by single-parent ascent from the first stack entry.
            let mut chain: Vec<NodeIndex> = parents.to_vec();
            while let Some(&top) = chain.first() {
                if self.catalog.is_root(top) {
                    break;
                }
                let grandparents = self.catalog.parents(top);
                if grandparents.len() != 1 {
                    ascent_error = Some(ModelError::AmbiguousRootPath(
                        self.catalog.code(top).clone(),
                    ));
                    return TraverseControl::Stop;
                }
                chain.insert(0, grandparents[0]);
            }

            let covered = from_chain.iter().all(|required| {
                chain
                    .iter()
                    .any(|candidate| self.catalog.code(*candidate) == self.catalog.code(*required))
            });
            if !covered {
                return TraverseControl::Continue;
            }
            remaining = chain
                .into_iter()
                .filter(|candidate| {
                    !from_chain
                        .iter()
                        .any(|required| self.catalog.code(*required) == self.catalog.code(*candidate))
                })
                .collect();
            found = true;
            TraverseControl::Stop
        });

        if let Some(err) = ascent_error {
            return Err(err);
        }
        Ok((found, remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NodeCode;

    fn cyclic_model() -> Model {
        let document: ReleaseDocument = serde_json::from_str(
            r#"{
                "version": "t-1",
                "items": [
                    {"code": "VE", "category": "ASSET", "type": "TYPE"},
                    {"code": "100a", "category": "ASSET FUNCTION", "type": "GROUP"},
                    {"code": "101", "category": "ASSET FUNCTION", "type": "LEAF"},
                    {"code": "CS1", "category": "PRODUCT", "type": "SELECTION"},
                    {"code": "C1", "category": "PRODUCT", "type": "TYPE"},
                    {"code": "F1", "category": "PRODUCT FUNCTION", "type": "LEAF"},
                    {"code": "102", "category": "ASSET FUNCTION", "type": "LEAF",
                     "installSubstructure": false},
                    {"code": "103", "category": "ASSET FUNCTION", "type": "LEAF"}
                ],
                "relations": [
                    ["VE", "100a"],
                    ["100a", "101"],
                    ["100a", "102"],
                    ["102", "103"],
                    ["101", "CS1"],
                    ["CS1", "C1"],
                    ["C1", "F1"],
                    ["F1", "CS1"]
                ]
            }"#,
        )
        .unwrap();
        Model::from_document(&document).unwrap()
    }

    fn get(model: &Model, code: &str) -> NodeIndex {
        model.node(&NodeCode(code.into())).unwrap()
    }

    #[test]
    fn traversal_terminates_on_cycles() {
        let model = cyclic_model();
        let mut visits: Vec<String> = Vec::new();
        let completed = model.traverse(|_, node| {
            visits.push(model.catalog().code(node).as_str().to_string());
            TraverseControl::Continue
        });
        assert!(completed);

        let count = |code: &str| visits.iter().filter(|c| c.as_str() == code).count();
        assert_eq!(count("VE"), 1);
        assert_eq!(count("101"), 1);
        // The selection is re-entered once through the F1 -> CS1 back edge,
        // then its product type hits the occurrence cap.
        assert_eq!(count("CS1"), 2);
        assert_eq!(count("C1"), 2);
        assert_eq!(count("F1"), 1);
    }

    #[test]
    fn install_substructure_false_hides_node_and_subtree() {
        let model = cyclic_model();
        let mut visits: Vec<String> = Vec::new();
        model.traverse(|_, node| {
            visits.push(model.catalog().code(node).as_str().to_string());
            TraverseControl::Continue
        });
        assert!(!visits.iter().any(|c| c == "102"));
        assert!(!visits.iter().any(|c| c == "103"));
    }

    #[test]
    fn skip_subtree_and_stop_verdicts() {
        let model = cyclic_model();
        let mut visits: Vec<String> = Vec::new();
        let completed = model.traverse(|_, node| {
            let code = model.catalog().code(node).as_str().to_string();
            visits.push(code.clone());
            if code == "101" {
                TraverseControl::SkipSubtree
            } else {
                TraverseControl::Continue
            }
        });
        assert!(completed);
        assert!(!visits.iter().any(|c| c == "CS1"));

        let completed = model.traverse(|_, node| {
            if model.catalog().code(node).as_str() == "100a" {
                TraverseControl::Stop
            } else {
                TraverseControl::Continue
            }
        });
        assert!(!completed);
    }

    #[test]
    fn handler_sees_ancestor_chain() {
        let model = cyclic_model();
        let mut chain_at_c1: Option<Vec<String>> = None;
        model.traverse(|parents, node| {
            if model.catalog().code(node).as_str() == "C1" && chain_at_c1.is_none() {
                chain_at_c1 = Some(
                    parents
                        .iter()
                        .map(|&p| model.catalog().code(p).as_str().to_string())
                        .collect(),
                );
                return TraverseControl::Stop;
            }
            TraverseControl::Continue
        });
        assert_eq!(
            chain_at_c1.unwrap(),
            vec!["VE", "100a", "101", "CS1"]
        );
    }

    #[test]
    fn path_exists_between_reports_remaining_ancestors() {
        let model = cyclic_model();
        let from = vec![get(&model, "VE"), get(&model, "100a")];
        let (found, remaining) = model
            .path_exists_between(&from, get(&model, "C1"))
            .unwrap();
        assert!(found);
        let codes: Vec<&str> = remaining
            .iter()
            .map(|&idx| model.catalog().code(idx).as_str())
            .collect();
        assert_eq!(codes, vec!["101", "CS1"]);

        let from = vec![get(&model, "102")];
        let (found, _) = model
            .path_exists_between(&from, get(&model, "C1"))
            .unwrap();
        assert!(!found);
    }

    #[test]
    fn resolve_reports_version() {
        let model = cyclic_model();
        let err = model.resolve(&NodeCode("missing".into())).unwrap_err();
        match err {
            ModelError::UnknownCode { code, version } => {
                assert_eq!(code.as_str(), "missing");
                assert_eq!(version.as_str(), "t-1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
