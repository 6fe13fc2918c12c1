//! Conversion of nodes and paths between registered releases.
//!
//! Node conversion walks the registry order one step at a time, applying each
//! step's rename table. Path conversion first tries a node-by-node mapping of
//! the whole chain; when structural edits (merges, renames with relocation,
//! assignment changes) break the chain, it rebuilds a valid one against the
//! target release.

use crate::catalog::{ConversionDocument, ConversionEntryDef, ModelVersion, NodeCode, NodeIndex};
use crate::error::ModelError;
use crate::model::Model;
use crate::path::{LocationSetsVisitor, Path, PathSegment};
use crate::registry::ModelRegistry;
use anyhow::{Result, bail};
use std::collections::BTreeMap;

/// One release step's conversion entries, keyed by source code.
#[derive(Debug)]
pub struct ConversionTable {
    version: ModelVersion,
    entries: BTreeMap<NodeCode, ConversionEntryDef>,
}

impl ConversionTable {
    pub fn from_document(document: &ConversionDocument) -> Self {
        ConversionTable {
            version: document.version.clone(),
            entries: document.items.clone(),
        }
    }

    /// The version this table converts *into*.
    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    pub fn get(&self, code: &NodeCode) -> Option<&ConversionEntryDef> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Converts nodes and paths between the releases of one registry.
pub struct VersionConverter<'a> {
    registry: &'a ModelRegistry,
    tables: BTreeMap<ModelVersion, ConversionTable>,
}

impl<'a> VersionConverter<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        VersionConverter {
            registry,
            tables: BTreeMap::new(),
        }
    }

    /// Registers a conversion table for the step into its named version.
    pub fn add_table(&mut self, document: &ConversionDocument) -> Result<()> {
        let table = ConversionTable::from_document(document);
        if self.tables.contains_key(table.version()) {
            bail!("conversion table for {} is already registered", table.version());
        }
        tracing::debug!(version = %table.version(), entries = table.len(), "added conversion table");
        self.tables.insert(table.version().clone(), table);
        Ok(())
    }

    fn span(
        &self,
        source: &ModelVersion,
        target: &ModelVersion,
    ) -> Result<(usize, usize), ModelError> {
        let si = self.registry.position(source).ok_or_else(|| {
            ModelError::VersionRange(format!("version {source} is not registered"))
        })?;
        let ti = self.registry.position(target).ok_or_else(|| {
            ModelError::VersionRange(format!("version {target} is not registered"))
        })?;
        if si > ti {
            return Err(ModelError::VersionRange(format!(
                "cannot convert backwards from {source} to {target}"
            )));
        }
        Ok((si, ti))
    }

    /// Converts one node occurrence; the location is carried unchanged.
    /// Converting to the node's own version is the identity.
    pub fn convert_node(
        &self,
        source: &ModelVersion,
        segment: &PathSegment,
        target: &ModelVersion,
    ) -> Result<PathSegment, ModelError> {
        let (si, ti) = self.span(source, target)?;
        if si == ti {
            return Ok(segment.clone());
        }

        let source_model = self.registry.resolve(source)?;
        let mut code = source_model.catalog().code(segment.node).clone();
        let mut converted = segment.node;
        for step in si + 1..=ti {
            let version = &self.registry.versions()[step];
            let model = self.registry.resolve(version)?;
            let Some(table) = self.tables.get(version) else {
                return Err(ModelError::VersionRange(format!(
                    "no conversion table registered for the step into {version}"
                )));
            };
            if let Some(entry) = table.get(&code) {
                if let Some(renamed) = entry.rename_target() {
                    code = renamed.clone();
                }
            }
            converted = model.resolve(&code)?;
        }
        Ok(PathSegment::with_location(converted, segment.location.clone()))
    }

    pub fn convert_path(
        &self,
        source: &ModelVersion,
        path: &Path,
        target: &ModelVersion,
    ) -> Result<Path, ModelError> {
        let (si, ti) = self.span(source, target)?;
        if si == ti {
            return Ok(path.clone());
        }
        let source_model = self.registry.resolve(source)?;
        let target_model = self.registry.resolve(target)?;
        tracing::debug!(source = %source, target = %target, "converting path");

        let terminal = self.convert_node(source, path.terminal(), target)?;
        if target_model.catalog().is_root(terminal.node) {
            return Ok(Path::root_only(target_model));
        }

        let mut pairs: Vec<(PathSegment, PathSegment)> = Vec::with_capacity(path.len());
        for segment in path.segments() {
            let converted = self.convert_node(source, segment, target)?;
            pairs.push((segment.clone(), converted));
        }

        // Fast path: the converted chain is often already valid.
        let chain: Vec<NodeIndex> = pairs.iter().map(|(_, t)| t.node).collect();
        if Path::is_valid_chain(target_model, &chain).0 {
            let segments = pairs.into_iter().map(|(_, t)| t).collect();
            return Ok(Path::from_segments_unchecked(target.clone(), segments));
        }

        let built = self.build_chain(source_model, target_model, &pairs)?;
        self.finalize(target_model, built)
    }

    fn build_chain(
        &self,
        source_model: &Model,
        target_model: &Model,
        pairs: &[(PathSegment, PathSegment)],
    ) -> Result<Vec<PathSegment>, ModelError> {
        let end_code = target_model
            .catalog()
            .code(pairs[pairs.len() - 1].1.node)
            .clone();
        let source_assignment = |node: NodeIndex| {
            source_model
                .catalog()
                .product_type_child(node)
                .map(|n| source_model.catalog().code(n).clone())
        };

        let mut path: Vec<PathSegment> = Vec::new();
        let mut i = 0;
        while i < pairs.len() {
            let (src, tgt) = &pairs[i];
            let tgt_code = target_model.catalog().code(tgt.node);
            tracing::trace!(
                source = %source_model.catalog().code(src.node),
                target = %tgt_code,
                "rebuilding chain segment"
            );

            if i > 0 && tgt_code == target_model.catalog().code(pairs[i - 1].1.node) {
                self.merge_into_tail(source_model, target_model, &mut path, src, tgt, &pairs[i - 1].1)?;
                i += 1;
                continue;
            }

            let src_code = source_model.catalog().code(src.node);
            let code_changed = src_code.as_str() != tgt_code.as_str();
            let src_assign = source_assignment(src.node);
            let tgt_assign = target_model.catalog().product_type_child(tgt.node);
            let tgt_assign_code =
                tgt_assign.map(|n| target_model.catalog().code(n).clone());
            let assignment_changed = src_assign != tgt_assign_code;

            if code_changed {
                self.add_to_path(target_model, &mut path, tgt.clone())?;
            } else if assignment_changed {
                let was_deleted = src_assign.is_some() && tgt_assign_code.is_none();
                self.add_to_path(target_model, &mut path, tgt.clone())?;

                if was_deleted {
                    // The removed assignment still occupies the next slot of
                    // the source chain; verify it is the expected node and
                    // drop it from the converted chain.
                    if i + 1 < pairs.len() {
                        let next_src = source_model.catalog().code(pairs[i + 1].0.node);
                        if Some(next_src) != src_assign.as_ref() {
                            return Err(ModelError::UnsupportedConversion(format!(
                                "expected deleted assignment {} after {}",
                                src_assign
                                    .as_ref()
                                    .map(NodeCode::as_str)
                                    .unwrap_or_default(),
                                src_code
                            )));
                        }
                        i += 2;
                    } else {
                        i += 1;
                    }
                    continue;
                }

                if tgt_code != &end_code {
                    if let Some(new_assign) = tgt_assign {
                        self.add_to_path(target_model, &mut path, PathSegment::new(new_assign))?;
                        if src_assign.is_some() && i + 1 < pairs.len() {
                            let next_src = source_model.catalog().code(pairs[i + 1].0.node);
                            if Some(next_src) != src_assign.as_ref() {
                                return Err(ModelError::UnsupportedConversion(format!(
                                    "expected replaced assignment {} after {}",
                                    src_assign
                                        .as_ref()
                                        .map(NodeCode::as_str)
                                        .unwrap_or_default(),
                                    src_code
                                )));
                            }
                            // Skip the old assignment pair.
                            i += 1;
                        }
                    }
                }
            } else {
                self.add_to_path(target_model, &mut path, tgt.clone())?;
            }

            // Done once the tail is the converted terminal, unless the next
            // pair still merges into it.
            if let Some(last) = path.last() {
                if target_model.catalog().code(last.node) == &end_code {
                    let next_merges = i + 1 < pairs.len()
                        && target_model.catalog().code(pairs[i + 1].1.node) == &end_code;
                    if !next_merges {
                        break;
                    }
                }
            }
            i += 1;
        }
        Ok(path)
    }

    /// Handles a pair whose converted code equals the previous pair's: the
    /// two source nodes merged into one. Verifies assignments agree and folds
    /// the merged node's location into the survivor already on the chain.
    fn merge_into_tail(
        &self,
        source_model: &Model,
        target_model: &Model,
        path: &mut [PathSegment],
        src: &PathSegment,
        tgt: &PathSegment,
        prev_tgt: &PathSegment,
    ) -> Result<(), ModelError> {
        if let Some(src_assign) = source_model.catalog().product_type_child(src.node) {
            let src_assign_code = source_model.catalog().code(src_assign);
            let prev_assign_code = target_model
                .catalog()
                .product_type_child(prev_tgt.node)
                .map(|n| target_model.catalog().code(n));
            if Some(src_assign_code) != prev_assign_code {
                return Err(ModelError::UnsupportedConversion(format!(
                    "merged nodes share code {} but have different normal assignments",
                    target_model.catalog().code(tgt.node)
                )));
            }
        }

        let Some(location) = &tgt.location else {
            return Ok(());
        };
        let tgt_code = target_model.catalog().code(tgt.node);
        let Some(index) = path
            .iter()
            .position(|s| target_model.catalog().code(s.node) == tgt_code)
        else {
            return Ok(());
        };
        if let Some(existing) = &path[index].location {
            if existing != location {
                return Err(ModelError::UnsupportedConversion(format!(
                    "colliding locations {existing} and {location} while merging into {tgt_code}"
                )));
            }
        }
        if !target_model
            .catalog()
            .record(path[index].node)
            .is_individualizable(false, false)
        {
            return Err(ModelError::UnsupportedConversion(format!(
                "merged location lands on non-individualizable node {tgt_code}"
            )));
        }
        if path[index].location.is_none() {
            path[index].location = Some(location.clone());
        }
        Ok(())
    }

    /// Appends a node to the chain under construction, trimming the tail and
    /// inserting intermediate nodes until the result is connected.
    fn add_to_path(
        &self,
        target_model: &Model,
        path: &mut Vec<PathSegment>,
        node: PathSegment,
    ) -> Result<(), ModelError> {
        if let Some(prev) = path.last() {
            if !target_model.catalog().is_child(prev.node, node.node) {
                loop {
                    let from_chain: Vec<NodeIndex> = path.iter().map(|s| s.node).collect();
                    let (exists, remaining) =
                        target_model.path_exists_between(&from_chain, node.node)?;
                    if exists {
                        for r in remaining {
                            let record = target_model.catalog().record(r);
                            let location = match &node.location {
                                Some(location) if record.is_individualizable(false, true) => {
                                    Some(location.clone())
                                }
                                _ => None,
                            };
                            path.push(PathSegment::with_location(r, location));
                        }
                        break;
                    }
                    let tail = path[path.len() - 1].node;
                    let tail_code = target_model.catalog().code(tail);
                    let keeps_asset_function = path.iter().any(|s| {
                        target_model.catalog().record(s.node).is_asset_function()
                            && target_model.catalog().code(s.node) != tail_code
                    });
                    if !keeps_asset_function {
                        return Err(ModelError::UnsupportedConversion(format!(
                            "no remaining chain to {} without dropping the last asset function node",
                            target_model.catalog().code(node.node)
                        )));
                    }
                    path.pop();
                }
            }
        }
        path.push(node);
        Ok(())
    }

    /// Spreads set locations over the rebuilt chain and validates it.
    fn finalize(&self, target_model: &Model, mut path: Vec<PathSegment>) -> Result<Path, ModelError> {
        if path.is_empty() {
            return Err(ModelError::UnsupportedConversion(
                "conversion produced an empty chain".to_string(),
            ));
        }

        let mut visitor = LocationSetsVisitor::new();
        for i in 0..path.len() {
            match visitor.visit(target_model, &path, i)? {
                None => {
                    if path[i].location.is_some() {
                        break;
                    }
                }
                Some((start, end, location)) => {
                    if start == end {
                        continue;
                    }
                    let Some(location) = location else { continue };
                    for j in start..=end {
                        path[j].location = Some(location.clone());
                    }
                }
            }
        }

        let chain: Vec<NodeIndex> = path.iter().map(|s| s.node).collect();
        if !Path::is_valid_chain(target_model, &chain).0 {
            return Err(ModelError::UnsupportedConversion(
                "conversion did not produce a valid chain".to_string(),
            ));
        }
        Path::new(target_model, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Location, ReleaseDocument};
    use crate::parse::parse_short;

    fn release(version: &str, leaf: &str, extra: &str) -> Model {
        let raw = format!(
            r#"{{
                "version": "{version}",
                "items": [
                    {{"code": "VE", "category": "ASSET", "type": "TYPE"}},
                    {{"code": "300a", "category": "ASSET FUNCTION", "type": "GROUP"}},
                    {{"code": "{leaf}", "category": "ASSET FUNCTION", "type": "LEAF"}}{extra}
                ],
                "relations": [["VE", "300a"], ["300a", "{leaf}"]]
            }}"#
        );
        let document: ReleaseDocument = serde_json::from_str(&raw).unwrap();
        Model::from_document(&document).unwrap()
    }

    fn rename_table() -> ConversionDocument {
        serde_json::from_str(
            r#"{
                "version": "v2",
                "items": {
                    "323.51": {"operations": ["changeCode"], "source": "323.51", "target": "323.61"},
                    "999": {"operations": ["changeCode"], "source": "999", "target": "998"}
                }
            }"#,
        )
        .unwrap()
    }

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry
            .register(release(
                "v1",
                "323.51",
                r#", {"code": "999", "category": "ASSET FUNCTION", "type": "LEAF"}"#,
            ))
            .unwrap();
        registry.register(release("v2", "323.61", "")).unwrap();
        registry
    }

    #[test]
    fn node_rename_carries_location() {
        let registry = registry();
        let mut converter = VersionConverter::new(&registry);
        converter.add_table(&rename_table()).unwrap();

        let v1 = ModelVersion("v1".into());
        let v2 = ModelVersion("v2".into());
        let source_model = registry.get(&v1).unwrap();
        let node = source_model.node(&NodeCode("323.51".into())).unwrap();
        let converted = converter
            .convert_node(&v1, &PathSegment::with_location(node, Location::parse("1")), &v2)
            .unwrap();

        let target_model = registry.get(&v2).unwrap();
        assert_eq!(target_model.catalog().code(converted.node).as_str(), "323.61");
        assert_eq!(converted.location, Location::parse("1"));
    }

    #[test]
    fn same_version_conversion_is_identity() {
        let registry = registry();
        let converter = VersionConverter::new(&registry);
        let v1 = ModelVersion("v1".into());
        let model = registry.get(&v1).unwrap();
        let path = parse_short(model, "323.51-1").unwrap();
        let converted = converter.convert_path(&v1, &path, &v1).unwrap();
        assert_eq!(converted, path);
    }

    // A step without a registered table must fail, not convert as identity.
    #[test]
    fn missing_step_table_is_version_range_error() {
        let registry = registry();
        let converter = VersionConverter::new(&registry);
        let v1 = ModelVersion("v1".into());
        let v2 = ModelVersion("v2".into());
        let model = registry.get(&v1).unwrap();

        let path = parse_short(model, "323.51").unwrap();
        let err = converter.convert_path(&v1, &path, &v2).unwrap_err();
        match err {
            ModelError::VersionRange(msg) => assert!(msg.contains("v2")),
            other => panic!("unexpected error: {other}"),
        }

        let node = model.node(&NodeCode("323.51".into())).unwrap();
        assert!(matches!(
            converter
                .convert_node(&v1, &PathSegment::new(node), &v2)
                .unwrap_err(),
            ModelError::VersionRange(_)
        ));
    }

    #[test]
    fn backwards_and_unknown_versions_are_range_errors() {
        let registry = registry();
        let converter = VersionConverter::new(&registry);
        let v1 = ModelVersion("v1".into());
        let v2 = ModelVersion("v2".into());
        let model = registry.get(&v1).unwrap();
        let segment = PathSegment::new(model.root());

        assert!(matches!(
            converter.convert_node(&v2, &segment, &v1).unwrap_err(),
            ModelError::VersionRange(_)
        ));
        assert!(matches!(
            converter
                .convert_node(&ModelVersion("v9".into()), &segment, &v2)
                .unwrap_err(),
            ModelError::VersionRange(_)
        ));
    }

    #[test]
    fn rename_to_missing_code_is_unknown_code() {
        let registry = registry();
        let mut converter = VersionConverter::new(&registry);
        converter.add_table(&rename_table()).unwrap();

        let v1 = ModelVersion("v1".into());
        let v2 = ModelVersion("v2".into());
        let model = registry.get(&v1).unwrap();
        let node = model.node(&NodeCode("999".into())).unwrap();
        let err = converter
            .convert_node(&v1, &PathSegment::new(node), &v2)
            .unwrap_err();
        match err {
            ModelError::UnknownCode { code, version } => {
                assert_eq!(code.as_str(), "998");
                assert_eq!(version.as_str(), "v2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fast_path_rename_keeps_chain() {
        let registry = registry();
        let mut converter = VersionConverter::new(&registry);
        converter.add_table(&rename_table()).unwrap();

        let v1 = ModelVersion("v1".into());
        let v2 = ModelVersion("v2".into());
        let source_model = registry.get(&v1).unwrap();
        let target_model = registry.get(&v2).unwrap();
        let path = parse_short(source_model, "323.51-1").unwrap();
        let converted = converter.convert_path(&v1, &path, &v2).unwrap();
        assert_eq!(converted.to_short_string(target_model), "323.61-1");
    }

    #[test]
    fn duplicate_table_is_rejected() {
        let registry = registry();
        let mut converter = VersionConverter::new(&registry);
        converter.add_table(&rename_table()).unwrap();
        let err = converter.add_table(&rename_table()).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }
}
