//! Experiment and sweep files (YAML by default, JSON by extension).

use ab_inference::{BayesianTestConfig, Variant, VariantSpec};
use ab_sim::SweepConfig;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A fixed-data experiment: engine settings plus variants, control first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentFile {
    #[serde(default)]
    pub config: BayesianTestConfig,
    pub variants: Vec<VariantSpec>,
}

impl ExperimentFile {
    pub fn build_variants(&self) -> Result<Vec<Variant>> {
        Ok(self.variants.iter().map(VariantSpec::build).collect::<ab_core::Result<Vec<_>>>()?)
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let doc = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    Ok(doc)
}

pub fn read_experiment(path: &Path) -> Result<ExperimentFile> {
    read_document(path)
}

pub fn read_sweep_config(path: &Path) -> Result<SweepConfig> {
    read_document(path)
}
