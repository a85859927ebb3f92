//! Command line arguments shared by every subcommand, and the
//! configuration they resolve to

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use sable_core::SableConfig;

#[derive(Debug, Clone, Default, Args)]
pub struct AnalysisArgs {
    /// Dart files or directories to analyze
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Configuration file (defaults to the nearest sable.toml)
    #[arg(short, long, env = "SABLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not generate hints
    #[arg(long)]
    pub no_hints: bool,

    /// Skip function bodies when parsing
    #[arg(long)]
    pub skip_bodies: bool,

    /// Keep comments in the token stream
    #[arg(long)]
    pub preserve_comments: bool,

    /// Root directory for `package:` URIs, as name=path
    #[arg(long = "package-root", value_name = "NAME=PATH")]
    pub package_roots: Vec<String>,
}

impl AnalysisArgs {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            ..Self::default()
        }
    }

    /// The configuration file, then the command line on top of it
    pub fn load_config(&self) -> Result<SableConfig> {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => self.discover_config(),
        };
        let mut config = match path {
            Some(path) => SableConfig::from_file(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => SableConfig::default(),
        };

        if self.no_hints {
            config.analysis.hint = false;
        }
        if self.skip_bodies {
            config.analysis.analyze_function_bodies = false;
        }
        if self.preserve_comments {
            config.analysis.preserve_comments = true;
        }
        for root in &self.package_roots {
            let (name, path) = parse_package_root(root)?;
            config.packages.insert(name, absolute(&path)?);
        }
        Ok(config)
    }

    fn discover_config(&self) -> Option<PathBuf> {
        let first = self.paths.first()?;
        let start = absolute(first).ok()?;
        let dir = if start.is_dir() {
            start
        } else {
            start.parent()?.to_path_buf()
        };
        SableConfig::discover(&dir)
    }
}

/// Split `name=path`.
pub fn parse_package_root(value: &str) -> Result<(String, PathBuf)> {
    match value.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => bail!("Invalid package root '{}', expected NAME=PATH", value),
    }
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    Ok(cwd.join(path))
}
