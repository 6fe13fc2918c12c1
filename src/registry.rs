//! Registry of loaded releases.
//!
//! Registration order defines the linear version order used by the conversion
//! engine; releases are expected to be registered oldest first.

use crate::catalog::ModelVersion;
use crate::error::ModelError;
use crate::model::Model;
use anyhow::{Result, bail};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct ModelRegistry {
    order: Vec<ModelVersion>,
    models: BTreeMap<ModelVersion, Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        ModelRegistry::default()
    }

    /// Adds a release; the registration sequence is the version order.
    pub fn register(&mut self, model: Model) -> Result<()> {
        let version = model.version().clone();
        if self.models.contains_key(&version) {
            bail!("version {version} is already registered");
        }
        tracing::debug!(version = %version, nodes = model.catalog().len(), "registered release");
        self.order.push(version.clone());
        self.models.insert(version, model);
        Ok(())
    }

    pub fn get(&self, version: &ModelVersion) -> Option<&Model> {
        self.models.get(version)
    }

    pub fn resolve(&self, version: &ModelVersion) -> Result<&Model, ModelError> {
        self.models.get(version).ok_or_else(|| {
            ModelError::VersionRange(format!("version {version} is not registered"))
        })
    }

    /// Position of a version in the registered order.
    pub fn position(&self, version: &ModelVersion) -> Option<usize> {
        self.order.iter().position(|v| v == version)
    }

    pub fn versions(&self) -> &[ModelVersion] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
