use crate::{engine::EngineConfig, findings::FindingCatalog};
use anyhow::{Context, Result};
use std::path::Path;

/// Read engine calibration from TOML. Missing keys keep their defaults.
pub fn read_config(path: &Path) -> Result<EngineConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    EngineConfig::from_toml_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))
}

/// Read a finding catalog (`[metric.severity]` tables) from TOML.
pub fn read_catalog(path: &Path) -> Result<FindingCatalog> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    FindingCatalog::from_toml_str(&contents)
        .with_context(|| format!("parsing catalog {}", path.display()))
}
