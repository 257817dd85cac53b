//! Infrastructure implementation of the `ConfigSource` port.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigSource;
use crate::domain::PipelineConfig;

/// Reads `PipelineConfig` from a YAML file, or uses the defaults when no
/// file is named.
pub struct YamlConfigFile {
    path: Option<PathBuf>,
}

impl YamlConfigFile {
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ConfigSource for YamlConfigFile {
    fn load(&self) -> Result<PipelineConfig> {
        let Some(path) = &self.path else {
            tracing::debug!("no config file given, using defaults");
            return Ok(PipelineConfig::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
