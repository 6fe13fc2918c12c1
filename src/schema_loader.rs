//! Shared JSON Schema validation for taxonomy input documents.
//!
//! Release and conversion documents are checked against the canonical schemas
//! under `schema/` before deserialization, so loaders cannot silently consume
//! malformed or mismatched documents. Compiled schemas are cached per file.

use anyhow::{Context, Result, bail};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

fn canonical_schema_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schema").join(name)
}

fn compile_schema(name: &str) -> Result<&'static JSONSchema> {
    static CACHE: OnceLock<Mutex<BTreeMap<String, &'static JSONSchema>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(BTreeMap::new()));
    let mut guard = cache.lock().unwrap_or_else(|err| err.into_inner());

    if let Some(schema) = guard.get(name) {
        return Ok(schema);
    }

    let path = canonical_schema_path(name);
    let file =
        File::open(&path).with_context(|| format!("opening schema {}", path.display()))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing schema {}", path.display()))?;

    // Schemas are compiled once and retained for the process lifetime; the
    // leak keeps the compiled validator's borrow of the schema value sound.
    let value: &'static Value = Box::leak(Box::new(value));
    let compiled = JSONSchema::compile(value)
        .map_err(|err| anyhow::anyhow!("compiling schema {}: {err}", path.display()))?;
    let compiled: &'static JSONSchema = Box::leak(Box::new(compiled));
    guard.insert(name.to_string(), compiled);
    Ok(compiled)
}

/// Validate a raw JSON document against a canonical schema by file name.
pub(crate) fn validate_document(data: &str, schema_name: &str) -> Result<()> {
    let value: Value = serde_json::from_str(data).context("parsing document as JSON")?;
    let schema = compile_schema(schema_name)?;
    if let Err(errors) = schema.validate(&value) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        bail!("document failed schema validation against {schema_name}:\n{details}");
    }
    Ok(())
}
