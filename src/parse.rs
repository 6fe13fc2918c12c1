//! Path parsing: short form (leaf codes only) and full form (every node).
//!
//! Short form resolution anchors a traversal at the first token's node and
//! walks descendants to match the remaining tokens, then rebuilds the chain
//! up to the root by single-parent ascent. Full form resolves every code
//! directly and validates adjacency and location placement.

use crate::catalog::{Location, NodeCode, NodeIndex, ROOT_CODE};
use crate::error::ModelError;
use crate::model::{Model, TraverseControl, TraversalOptions};
use crate::path::{LocationSetsVisitor, Path, PathSegment};
use std::collections::{HashMap, VecDeque};

struct PathToken {
    node: NodeIndex,
    code: NodeCode,
    location: Option<Location>,
}

fn parse_token(model: &Model, part: &str) -> Result<PathToken, ModelError> {
    if part.is_empty() {
        return Err(ModelError::Structural("empty path segment".to_string()));
    }
    let (code_str, location_raw) = match part.find('-') {
        Some(dash) => (&part[..dash], Some(&part[dash + 1..])),
        None => (part, None),
    };
    let code = NodeCode(code_str.to_string());
    let node = model.resolve(&code)?;
    let location = match location_raw {
        Some(raw) => Some(Location::parse(raw).ok_or_else(|| {
            ModelError::Structural(format!("invalid location '{raw}' in segment '{part}'"))
        })?),
        None => None,
    };
    Ok(PathToken {
        node,
        code,
        location,
    })
}

fn tokenize(model: &Model, item: &str) -> Result<Vec<PathToken>, ModelError> {
    let item = item.trim().trim_start_matches('/');
    if item.is_empty() {
        return Err(ModelError::Structural("path string is empty".to_string()));
    }
    item.split('/').map(|part| parse_token(model, part)).collect()
}

fn collect_token_issues(model: &Model, item: &str) -> Vec<String> {
    let trimmed = item.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return vec!["path string is empty".to_string()];
    }
    trimmed
        .split('/')
        .filter_map(|part| parse_token(model, part).err().map(|e| e.to_string()))
        .collect()
}

/// Parses a short-form path like `411.1/C101.31-2` against one release.
pub fn parse_short(model: &Model, item: &str) -> Result<Path, ModelError> {
    let mut tokens: VecDeque<PathToken> = tokenize(model, item)?.into();
    let Some(mut to_find) = tokens.pop_front() else {
        return Err(ModelError::Structural("path string is empty".to_string()));
    };
    let base = to_find.node;

    let mut recorded: HashMap<NodeCode, Location> = HashMap::new();
    let mut parsed: Option<Path> = None;
    let mut failure: Option<ModelError> = None;

    model.traverse_from(base, TraversalOptions::default(), |parents, current| {
        let found = model.catalog().code(current) == &to_find.code;
        if !found {
            // Leaves start fresh short path segments, so a mismatched leaf
            // subtree can never contain the token we are looking for.
            if model.catalog().record(current).is_leaf() {
                return TraverseControl::SkipSubtree;
            }
            return TraverseControl::Continue;
        }

        if let Some(location) = &to_find.location {
            recorded.insert(to_find.code.clone(), location.clone());
        }
        if let Some(next) = tokens.pop_front() {
            to_find = next;
            return TraverseControl::Continue;
        }

        let mut segments: Vec<PathSegment> = parents
            .iter()
            .map(|&p| {
                PathSegment::with_location(p, recorded.get(model.catalog().code(p)).cloned())
            })
            .collect();
        let terminal = PathSegment::with_location(current, to_find.location.clone());

        // Ascend from the first matched node to the root; any branch point
        // above makes the short form ambiguous. An anchor that already is the
        // root has nothing above it, so the chain is complete as matched.
        let anchor = segments.first().map_or(current, |s| s.node);
        if !model.catalog().is_root(anchor) {
            let mut cursor = {
                let above = model.catalog().parents(anchor);
                if above.len() != 1 {
                    failure = Some(ModelError::AmbiguousRootPath(
                        model.catalog().code(anchor).clone(),
                    ));
                    return TraverseControl::Stop;
                }
                above[0]
            };
            while !model.catalog().is_root(cursor) {
                let above = model.catalog().parents(cursor);
                if above.len() != 1 {
                    failure = Some(ModelError::AmbiguousRootPath(
                        model.catalog().code(cursor).clone(),
                    ));
                    return TraverseControl::Stop;
                }
                segments.insert(0, PathSegment::new(cursor));
                cursor = above[0];
            }
            segments.insert(0, PathSegment::new(model.root()));
        }
        segments.push(terminal);

        match normalize_locations(model, segments) {
            Ok(path) => {
                parsed = Some(path);
                TraverseControl::Stop
            }
            Err(err) => {
                failure = Some(err);
                TraverseControl::Stop
            }
        }
    });

    if let Some(err) = failure {
        return Err(err);
    }
    parsed.ok_or_else(|| {
        ModelError::Structural(format!(
            "no path found for '{}' in version {}",
            item.trim(),
            model.version()
        ))
    })
}

/// Runs the set visitor over a complete chain, rejecting locations that sit
/// outside any individualizable set and spreading each multi-node set's
/// location across its members.
fn normalize_locations(
    model: &Model,
    mut segments: Vec<PathSegment>,
) -> Result<Path, ModelError> {
    let mut visitor = LocationSetsVisitor::new();
    for i in 0..segments.len() {
        match visitor.visit(model, &segments, i)? {
            None => {
                if segments[i].location.is_some() {
                    return Err(ModelError::IndividualizationConflict(format!(
                        "unexpected location on {}",
                        model.catalog().code(segments[i].node)
                    )));
                }
            }
            Some((start, end, location)) => {
                if start == end {
                    continue;
                }
                for j in start..=end {
                    segments[j].location = location.clone();
                }
            }
        }
    }
    Ok(Path::from_segments_unchecked(model.version().clone(), segments))
}

/// Parses a full-form path like `VE/411/411.1/CS1/C101`, validating that
/// every adjacent pair is an edge and that locations agree within each set.
pub fn parse_full(model: &Model, item: &str) -> Result<Path, ModelError> {
    let trimmed = item.trim();
    if !trimmed.starts_with(ROOT_CODE) {
        return Err(ModelError::Structural(format!(
            "full path must start with the root code {ROOT_CODE}"
        )));
    }
    let tokens = tokenize(model, trimmed)?;
    if let [token] = tokens.as_slice() {
        if model.catalog().is_root(token.node) && token.location.is_none() {
            return Ok(Path::root_only(model));
        }
    }
    let mut segments: Vec<PathSegment> = tokens
        .into_iter()
        .map(|t| PathSegment::with_location(t.node, t.location))
        .collect();

    let chain: Vec<NodeIndex> = segments.iter().map(|s| s.node).collect();
    let (valid, missing_link_at) = Path::is_valid_chain(model, &chain);
    if !valid {
        let detail = match missing_link_at {
            Some(i) => format!(
                "{} is not a child of {}",
                model.catalog().code(chain[i + 1]),
                model.catalog().code(chain[i])
            ),
            None => "chain does not start at the root".to_string(),
        };
        return Err(ModelError::Structural(format!("invalid node sequence: {detail}")));
    }

    let mut visitor = LocationSetsVisitor::new();
    let mut pending_location: Option<usize> = None;
    let mut sets: Vec<(usize, usize)> = Vec::new();
    for i in 0..segments.len() {
        let Some((start, end, location)) = visitor.visit(model, &segments, i)? else {
            if pending_location.is_none() && segments[i].location.is_some() {
                pending_location = Some(i);
            }
            continue;
        };
        if let Some(first) = pending_location {
            for j in first..start {
                if segments[j].location.is_some() {
                    return Err(ModelError::IndividualizationConflict(format!(
                        "unexpected location on {}",
                        model.catalog().code(segments[j].node)
                    )));
                }
            }
        }
        pending_location = None;
        sets.push((start, end));
        if start == end {
            continue;
        }
        if let Some(location) = location {
            for j in start..=end {
                segments[j].location = Some(location.clone());
            }
        }
    }

    let last = segments.len() - 1;
    let mut current_set: Option<(usize, usize)> = None;
    let mut next_set = 0;
    for i in 0..segments.len() {
        while next_set < sets.len() && current_set.is_none_or(|(_, end)| end < i) {
            current_set = Some(sets[next_set]);
            next_set += 1;
        }
        let inside = current_set.is_some_and(|(start, end)| i >= start && i <= end);
        if inside {
            let expected = match current_set {
                Some((_, end)) => segments[end].location.clone(),
                None => segments[last].location.clone(),
            };
            if segments[i].location != expected {
                return Err(ModelError::IndividualizationConflict(format!(
                    "all nodes in a set must share a location, {} differs",
                    model.catalog().code(segments[i].node)
                )));
            }
        } else if segments[i].location.is_some() {
            return Err(ModelError::IndividualizationConflict(format!(
                "unexpected location on {}",
                model.catalog().code(segments[i].node)
            )));
        }
    }

    Ok(Path::from_segments_unchecked(model.version().clone(), segments))
}

/// Lenient short-form parse: reports every token-level problem instead of
/// stopping at the first.
pub fn parse_short_diagnostic(model: &Model, item: &str) -> (Option<Path>, Vec<String>) {
    let issues = collect_token_issues(model, item);
    if !issues.is_empty() {
        return (None, issues);
    }
    match parse_short(model, item) {
        Ok(path) => (Some(path), Vec::new()),
        Err(err) => (None, vec![err.to_string()]),
    }
}

/// Lenient full-form parse, same contract as [`parse_short_diagnostic`].
pub fn parse_full_diagnostic(model: &Model, item: &str) -> (Option<Path>, Vec<String>) {
    let trimmed = item.trim();
    if !trimmed.starts_with(ROOT_CODE) {
        return (
            None,
            vec![format!("full path must start with the root code {ROOT_CODE}")],
        );
    }
    let issues = collect_token_issues(model, trimmed);
    if !issues.is_empty() {
        return (None, issues);
    }
    match parse_full(model, trimmed) {
        Ok(path) => (Some(path), Vec::new()),
        Err(err) => (None, vec![err.to_string()]),
    }
}
