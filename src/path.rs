//! Paths through the node graph and their location individualization sets.
//!
//! A path is a full root-to-terminal chain of node indices, each optionally
//! qualified by a location. Locations are only legal on certain runs of
//! adjacent nodes (the individualizable sets); the visitor in this module is
//! the single source of truth for where those runs start and end.

use crate::catalog::{Location, ModelVersion, NodeIndex};
use crate::error::ModelError;
use crate::model::Model;

/// One node occurrence within a path, with its optional location.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PathSegment {
    pub node: NodeIndex,
    pub location: Option<Location>,
}

impl PathSegment {
    pub fn new(node: NodeIndex) -> Self {
        PathSegment {
            node,
            location: None,
        }
    }

    pub fn with_location(node: NodeIndex, location: Option<Location>) -> Self {
        PathSegment { node, location }
    }

    fn render(&self, model: &Model) -> String {
        let code = model.catalog().code(self.node);
        match &self.location {
            Some(location) => format!("{code}-{location}"),
            None => code.as_str().to_string(),
        }
    }
}

/// Root-to-terminal chain in one release. Node indices are only meaningful
/// against the model of the stored version.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Path {
    version: ModelVersion,
    segments: Vec<PathSegment>,
}

impl Path {
    /// Validates the chain and the placement of its locations.
    pub fn new(model: &Model, segments: Vec<PathSegment>) -> Result<Path, ModelError> {
        if segments.len() < 2 {
            return Err(ModelError::Structural(
                "path must have at least one parent above its terminal node".to_string(),
            ));
        }
        if !model.catalog().is_root(segments[0].node) {
            return Err(ModelError::Structural(format!(
                "path must start at the root, got {}",
                model.catalog().code(segments[0].node)
            )));
        }
        for window in segments.windows(2) {
            if !model.catalog().is_child(window[0].node, window[1].node) {
                return Err(ModelError::Structural(format!(
                    "{} is not a child of {}",
                    model.catalog().code(window[1].node),
                    model.catalog().code(window[0].node)
                )));
            }
        }

        let mut visitor = LocationSetsVisitor::new();
        for i in 0..segments.len() {
            visitor.visit(model, &segments, i)?;
        }

        Ok(Path {
            version: model.version().clone(),
            segments,
        })
    }

    /// The root by itself; the only chain shorter than two nodes.
    pub fn root_only(model: &Model) -> Path {
        Path {
            version: model.version().clone(),
            segments: vec![PathSegment::new(model.root())],
        }
    }

    pub(crate) fn from_segments_unchecked(version: ModelVersion, segments: Vec<PathSegment>) -> Path {
        Path { version, segments }
    }

    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn node_at(&self, depth: usize) -> NodeIndex {
        self.segments[depth].node
    }

    pub fn location_at(&self, depth: usize) -> Option<&Location> {
        self.segments[depth].location.as_ref()
    }

    pub fn terminal(&self) -> &PathSegment {
        &self.segments[self.segments.len() - 1]
    }

    /// Parent segments, everything above the terminal node.
    pub fn parents(&self) -> &[PathSegment] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Adjacency check over a full root-to-terminal chain. On failure also
    /// reports the depth of the first broken link, when one was reached.
    pub fn is_valid_chain(model: &Model, chain: &[NodeIndex]) -> (bool, Option<usize>) {
        if chain.len() < 2 {
            return (false, None);
        }
        if !model.catalog().is_root(chain[0]) {
            return (false, None);
        }
        for i in 0..chain.len() - 1 {
            if !model.catalog().is_child(chain[i], chain[i + 1]) {
                return (false, Some(i));
            }
        }
        (true, None)
    }

    /// Short rendering: leaf ancestors plus the terminal node, `/`-joined,
    /// each with its `-location` suffix when present.
    pub fn to_short_string(&self, model: &Model) -> String {
        let mut parts: Vec<String> = Vec::new();
        for segment in self.parents() {
            if model.catalog().record(segment.node).is_leaf() {
                parts.push(segment.render(model));
            }
        }
        parts.push(self.terminal().render(model));
        parts.join("/")
    }

    /// Full rendering: every node from the root to the terminal.
    pub fn to_full_string(&self, model: &Model) -> String {
        self.segments
            .iter()
            .map(|segment| segment.render(model))
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn without_locations(&self) -> Path {
        Path {
            version: self.version.clone(),
            segments: self
                .segments
                .iter()
                .map(|segment| PathSegment::new(segment.node))
                .collect(),
        }
    }

    /// Resolves the display name a node at `depth` assigns to the deepest
    /// path member it names, scanning from the terminal upward.
    pub fn normal_assignment_name(&self, model: &Model, depth: usize) -> Option<String> {
        let names = &model.catalog().record(self.segments[depth].node).normal_assignment_names;
        if names.is_empty() {
            return None;
        }
        for segment in self.segments.iter().rev() {
            if let Some(name) = names.get(model.catalog().code(segment.node)) {
                return Some(name.clone());
            }
        }
        None
    }

    /// Splits the path into its runs of location-capable nodes. Each set owns
    /// an independent copy of the path, so locations are assigned through the
    /// set and the result rebuilt with [`IndividualizableSet::build`].
    pub fn individualizable_sets(
        &self,
        model: &Model,
    ) -> Result<Vec<IndividualizableSet>, ModelError> {
        let mut visitor = LocationSetsVisitor::new();
        let mut sets = Vec::new();
        for i in 0..self.segments.len() {
            if let Some((start, end, _)) = visitor.visit(model, &self.segments, i)? {
                sets.push(IndividualizableSet::new(
                    model,
                    (start..=end).collect(),
                    self.clone(),
                )?);
            }
        }
        Ok(sets)
    }

    pub fn is_individualizable(&self, model: &Model) -> Result<bool, ModelError> {
        let mut visitor = LocationSetsVisitor::new();
        for i in 0..self.segments.len() {
            if visitor.visit(model, &self.segments, i)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn set_location_at(&mut self, depth: usize, location: Option<Location>) {
        self.segments[depth].location = location;
    }
}

/// A run of adjacent path nodes that must share one location.
///
/// Owns its own copy of the path; consuming `build` hands the updated path
/// back, so a set cannot be applied twice.
#[derive(Debug)]
pub struct IndividualizableSet {
    indices: Vec<usize>,
    path: Path,
}

impl IndividualizableSet {
    pub fn new(model: &Model, indices: Vec<usize>, path: Path) -> Result<Self, ModelError> {
        if indices.is_empty() {
            return Err(ModelError::Structural(
                "individualizable set cannot be empty".to_string(),
            ));
        }
        let last = path.len() - 1;
        let in_set = indices.len() > 1;
        for &i in &indices {
            let record = model.catalog().record(path.node_at(i));
            if !record.is_individualizable(i == last, in_set) {
                return Err(ModelError::Structural(format!(
                    "node {} cannot carry a location",
                    record.code
                )));
            }
        }
        let first_location = path.location_at(indices[0]);
        if indices
            .iter()
            .any(|&i| path.location_at(i) != first_location)
        {
            return Err(ModelError::IndividualizationConflict(
                "individualizable set members have different locations".to_string(),
            ));
        }
        if !indices.iter().any(|&i| {
            i == last || model.catalog().record(path.node_at(i)).is_leaf()
        }) {
            return Err(ModelError::Structural(
                "individualizable set has no node visible in the short path".to_string(),
            ));
        }
        Ok(IndividualizableSet { indices, path })
    }

    pub fn node_indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn nodes(&self) -> Vec<NodeIndex> {
        self.indices.iter().map(|&i| self.path.node_at(i)).collect()
    }

    pub fn location(&self) -> Option<&Location> {
        self.path.location_at(self.indices[0])
    }

    /// Applies one location to every member of the set.
    pub fn set_location(&mut self, location: Option<Location>) {
        for &i in &self.indices {
            self.path.set_location_at(i, location.clone());
        }
    }

    pub fn build(self) -> Path {
        self.path
    }
}

/// Streaming detector for individualizable sets.
///
/// Feed it every depth of a chain in order; it yields `(start, end, location)`
/// whenever a completed run is recognized. Runs are delimited by potential
/// parents (group, selection, leaf) and by the terminal node.
pub(crate) struct LocationSetsVisitor {
    current_parent_start: Option<usize>,
}

impl LocationSetsVisitor {
    pub(crate) fn new() -> Self {
        LocationSetsVisitor {
            current_parent_start: None,
        }
    }

    pub(crate) fn visit(
        &mut self,
        model: &Model,
        segments: &[PathSegment],
        i: usize,
    ) -> Result<Option<(usize, usize, Option<Location>)>, ModelError> {
        let last = segments.len() - 1;
        let record = model.catalog().record(segments[i].node);
        let is_parent = record.is_potential_parent();
        let is_target = i == last;

        let Some(start) = self.current_parent_start else {
            if is_parent {
                self.current_parent_start = Some(i);
            }
            if record.is_individualizable(is_target, false) {
                return Ok(Some((i, i, segments[i].location.clone())));
            }
            return Ok(None);
        };

        if is_parent || is_target {
            let run = if start + 1 == i {
                if record.is_individualizable(is_target, false) {
                    Some((i, i, segments[i].location.clone()))
                } else {
                    None
                }
            } else {
                self.collect_run(model, segments, start, i)?
            };
            self.current_parent_start = Some(i);
            if let Some(set) = run {
                if self.run_reaches_short_path(model, segments, set.0, set.1) {
                    return Ok(Some(set));
                }
            }
        }

        if is_target && record.is_individualizable(true, false) {
            return Ok(Some((i, i, segments[i].location.clone())));
        }
        Ok(None)
    }

    fn collect_run(
        &self,
        model: &Model,
        segments: &[PathSegment],
        start: usize,
        i: usize,
    ) -> Result<Option<(usize, usize, Option<Location>)>, ModelError> {
        let last = segments.len() - 1;
        let mut run: Option<(usize, usize, Option<Location>)> = None;
        let mut skipped_one: Option<usize> = None;
        let mut has_composition = false;

        for j in start + 1..=i {
            let record = model.catalog().record(segments[j].node);
            if !record.is_individualizable(j == last, true) {
                if run.is_some() {
                    skipped_one = Some(j);
                }
                continue;
            }

            let node_location = segments[j].location.as_ref();
            if let Some((_, _, Some(run_location))) = &run {
                if let Some(node_location) = node_location {
                    if run_location != node_location {
                        return Err(ModelError::IndividualizationConflict(format!(
                            "different locations in the same set: {run_location}, {node_location}"
                        )));
                    }
                }
            }
            if skipped_one.is_some() {
                return Err(ModelError::IndividualizationConflict(
                    "cannot skip a node in the middle of an individualizable set".to_string(),
                ));
            }
            if record.is_function_composition() {
                has_composition = true;
            }

            let location = match &run {
                Some((_, _, Some(existing))) => Some(existing.clone()),
                _ => segments[j].location.clone(),
            };
            let run_start = run.map_or(j, |(s, _, _)| s);
            run = Some((run_start, j, location));
        }

        // A lone composition marker is not a set of its own.
        if let Some((s, e, _)) = &run {
            if s == e && has_composition {
                return Ok(None);
            }
        }
        Ok(run)
    }

    fn run_reaches_short_path(
        &self,
        model: &Model,
        segments: &[PathSegment],
        start: usize,
        end: usize,
    ) -> bool {
        let last = segments.len() - 1;
        (start..=end).any(|j| j == last || model.catalog().record(segments[j].node).is_leaf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NodeCode, ReleaseDocument};

    fn engine_model() -> Model {
        let document: ReleaseDocument = serde_json::from_str(
            r#"{
                "version": "t-1",
                "items": [
                    {"code": "VE", "category": "ASSET", "type": "TYPE"},
                    {"code": "100a", "category": "ASSET FUNCTION", "type": "GROUP"},
                    {"code": "101", "category": "ASSET FUNCTION", "type": "LEAF",
                     "normalAssignmentNames": {"C1": "propulsion engine"}},
                    {"code": "CS1", "category": "PRODUCT", "type": "SELECTION"},
                    {"code": "C1", "category": "PRODUCT", "type": "TYPE"},
                    {"code": "C1.3", "category": "PRODUCT FUNCTION", "type": "TYPE"},
                    {"code": "C1.31", "category": "PRODUCT FUNCTION", "type": "LEAF"}
                ],
                "relations": [
                    ["VE", "100a"],
                    ["100a", "101"],
                    ["101", "CS1"],
                    ["CS1", "C1"],
                    ["C1", "C1.3"],
                    ["C1.3", "C1.31"]
                ]
            }"#,
        )
        .unwrap();
        Model::from_document(&document).unwrap()
    }

    fn chain(model: &Model, codes: &[&str]) -> Vec<PathSegment> {
        codes
            .iter()
            .map(|code| PathSegment::new(model.node(&NodeCode((*code).into())).unwrap()))
            .collect()
    }

    const FULL: &[&str] = &["VE", "100a", "101", "CS1", "C1", "C1.3", "C1.31"];

    #[test]
    fn new_validates_root_and_adjacency() {
        let model = engine_model();
        assert!(Path::new(&model, chain(&model, FULL)).is_ok());

        let err = Path::new(&model, chain(&model, &["100a", "101"])).unwrap_err();
        assert!(matches!(err, ModelError::Structural(_)));

        let err = Path::new(&model, chain(&model, &["VE", "100a", "CS1"])).unwrap_err();
        assert!(err.to_string().contains("not a child of"));
    }

    #[test]
    fn is_valid_chain_reports_broken_link() {
        let model = engine_model();
        let to_nodes = |codes: &[&str]| -> Vec<NodeIndex> {
            codes
                .iter()
                .map(|c| model.node(&NodeCode((*c).into())).unwrap())
                .collect()
        };
        assert_eq!(Path::is_valid_chain(&model, &to_nodes(FULL)), (true, None));
        assert_eq!(
            Path::is_valid_chain(&model, &to_nodes(&["VE", "100a", "C1"])),
            (false, Some(1))
        );
        assert_eq!(
            Path::is_valid_chain(&model, &to_nodes(&["100a", "101"])),
            (false, None)
        );
    }

    #[test]
    fn short_string_keeps_leaves_and_terminal() {
        let model = engine_model();
        let mut segments = chain(&model, FULL);
        segments[2].location = Location::parse("2");
        segments[5].location = Location::parse("1");
        segments[6].location = Location::parse("1");
        let path = Path::new(&model, segments).unwrap();

        assert_eq!(path.to_short_string(&model), "101-2/C1.31-1");
        assert_eq!(
            path.to_full_string(&model),
            "VE/100a/101-2/CS1/C1/C1.3-1/C1.31-1"
        );
        assert_eq!(path.without_locations().to_short_string(&model), "101/C1.31");
    }

    #[test]
    fn individualizable_sets_partition() {
        let model = engine_model();
        let path = Path::new(&model, chain(&model, FULL)).unwrap();
        let sets = path.individualizable_sets(&model).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].node_indices(), &[2]);
        assert_eq!(sets[1].node_indices(), &[5, 6]);
    }

    #[test]
    fn set_location_applies_to_all_members() {
        let model = engine_model();
        let path = Path::new(&model, chain(&model, FULL)).unwrap();
        let mut sets = path.individualizable_sets(&model).unwrap();
        let mut tail = sets.pop().unwrap();
        tail.set_location(Location::parse("3"));
        let rebuilt = tail.build();
        assert_eq!(rebuilt.location_at(5), Location::parse("3").as_ref());
        assert_eq!(rebuilt.location_at(6), Location::parse("3").as_ref());
        assert_eq!(rebuilt.to_short_string(&model), "101/C1.31-3");
    }

    #[test]
    fn conflicting_locations_in_one_set_are_rejected() {
        let model = engine_model();
        let mut segments = chain(&model, FULL);
        segments[5].location = Location::parse("1");
        segments[6].location = Location::parse("2");
        let err = Path::new(&model, segments).unwrap_err();
        assert!(matches!(err, ModelError::IndividualizationConflict(_)));
    }

    #[test]
    fn normal_assignment_name_scans_from_terminal() {
        let model = engine_model();
        let path = Path::new(&model, chain(&model, FULL)).unwrap();
        assert_eq!(
            path.normal_assignment_name(&model, 2).as_deref(),
            Some("propulsion engine")
        );
        assert_eq!(path.normal_assignment_name(&model, 1), None);
    }

    #[test]
    fn root_only_path_renders_root() {
        let model = engine_model();
        let path = Path::root_only(&model);
        assert_eq!(path.len(), 1);
        assert_eq!(path.to_short_string(&model), "VE");
    }
}
