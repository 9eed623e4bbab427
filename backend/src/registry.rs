use shared::{AdvisoryRecord, DiseaseClass};
use std::collections::HashMap;
use std::path::Path;

use crate::config::RegistryConfig;
use crate::error::StartupError;

const EMBEDDED_CLASSES: &str = include_str!("../config/classes.yaml");

/// Advisory records keyed by class label. Built once at startup and only
/// read afterwards.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    records: HashMap<String, AdvisoryRecord>,
}

impl ClassRegistry {
    pub fn load(config: &RegistryConfig) -> Result<Self, StartupError> {
        let registry = match &config.path {
            Some(path) => Self::from_file(path)?,
            None => Self::embedded()?,
        };

        for label in registry.missing_labels() {
            log::warn!("No advisory record for class '{}'", label);
        }
        Ok(registry)
    }

    pub fn embedded() -> Result<Self, StartupError> {
        Self::from_yaml_str(EMBEDDED_CLASSES)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StartupError::Registry(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, StartupError> {
        let records: HashMap<String, AdvisoryRecord> =
            serde_yaml::from_str(contents).map_err(|e| StartupError::Registry(e.to_string()))?;
        Ok(Self { records })
    }

    pub fn lookup(&self, label: &str) -> Option<&AdvisoryRecord> {
        self.records.get(label)
    }

    /// Classifier labels with no advisory record.
    pub fn missing_labels(&self) -> Vec<&'static str> {
        DiseaseClass::labels()
            .into_iter()
            .filter(|label| !self.records.contains_key(*label))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
