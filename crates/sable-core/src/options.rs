//! Analysis options and the `sable.toml` configuration file

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const CONFIG_FILE_NAME: &str = "sable.toml";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Parse function bodies. When false, bodies are skipped for faster
    /// structural-only passes.
    #[serde(default = "default_true")]
    pub analyze_function_bodies: bool,

    /// Retain comment tokens in the token stream
    #[serde(default)]
    pub preserve_comments: bool,

    /// Generate hints
    #[serde(default = "default_true")]
    pub hint: bool,

    /// Allow the incremental fast path on edits
    #[serde(default = "default_true")]
    pub incremental: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analyze_function_bodies: true,
            preserve_comments: false,
            hint: true,
            incremental: true,
        }
    }
}

/// Contents of `sable.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SableConfig {
    #[serde(default)]
    pub analysis: AnalysisOptions,

    /// Package name to the directory that `package:name/` maps onto
    #[serde(default)]
    pub packages: BTreeMap<String, PathBuf>,
}

impl SableConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load a config file. Relative package roots are taken relative to the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path)
            .map_err(|e| CoreError::io(path.display().to_string(), &e))?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            for root in config.packages.values_mut() {
                if root.is_relative() {
                    *root = base.join(&*root);
                }
            }
        }
        tracing::debug!(
            "Loaded config from {} with {} package roots",
            path.display(),
            config.packages.len()
        );
        Ok(config)
    }

    /// Find `sable.toml` in `start` or any of its ancestors.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }
}
