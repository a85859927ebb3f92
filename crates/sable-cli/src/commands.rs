//! The work behind each subcommand

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sable_core::factory::PackageUriResolver;
use sable_core::{DartSdk, SableConfig, Source, SourceFactory};
use sable_engine::{AnalysisContext, ChangeSet};
use walkdir::WalkDir;

use crate::config::{absolute, AnalysisArgs};
use crate::provider::AsyncFileProvider;
use crate::report::{
    display_name, AnalysisReport, DependencyReport, Diagnostic, LibraryDependencies,
};

/// Analyze every Dart file under the given paths and collect their
/// diagnostics.
pub async fn analyze(args: &AnalysisArgs) -> Result<AnalysisReport> {
    let (mut context, roots) = open_context(args)?;
    let performed = context.analyze_all().await?;
    tracing::info!("Analyzed {} files in {} tasks", roots.len(), performed);

    let mut diagnostics = Vec::new();
    for source in &roots {
        let errors = context
            .compute_errors(source)
            .with_context(|| format!("Failed to collect errors for {}", source))?;
        let line_info = context.line_info(source);
        diagnostics.extend(
            errors
                .iter()
                .map(|error| Diagnostic::new(error, line_info.as_ref())),
        );
    }
    Ok(AnalysisReport {
        files: roots.len(),
        diagnostics,
    })
}

/// Directive dependencies of every library reached from the given paths
pub async fn dependencies(args: &AnalysisArgs) -> Result<DependencyReport> {
    let (mut context, _roots) = open_context(args)?;
    context.analyze_all().await?;

    let names = |sources: &BTreeSet<Source>| -> Vec<String> {
        sources.iter().map(display_name).collect()
    };
    let mut libraries = Vec::new();
    for source in context.cache().sources() {
        if source.is_in_system_library() {
            continue;
        }
        let is_library = context
            .cache()
            .read(&source, |entry| entry.is_library())
            .unwrap_or(false);
        let Some(dependencies) = context.dependencies(&source).filter(|_| is_library) else {
            continue;
        };
        libraries.push(LibraryDependencies {
            library: display_name(&source),
            imports: names(&dependencies.imported),
            exports: names(&dependencies.exported),
            parts: names(&dependencies.included),
        });
    }

    let cycles = context
        .library_cycles()
        .into_iter()
        .filter(|cycle| cycle.len() > 1)
        .map(|cycle| cycle.iter().map(display_name).collect::<Vec<_>>())
        .collect();
    Ok(DependencyReport { libraries, cycles })
}

/// Context reading files from disk asynchronously, with every collected
/// source added as a root
fn open_context(args: &AnalysisArgs) -> Result<(AnalysisContext, Vec<Source>)> {
    let config = args.load_config()?;
    let roots = collect_sources(&args.paths)?;
    if roots.is_empty() {
        bail!("No Dart files found");
    }

    let provider = Arc::new(AsyncFileProvider::new());
    let mut context =
        AnalysisContext::new(config.analysis, build_factory(&config), provider.clone());
    provider.attach(context.content_sender());

    let changes = roots
        .iter()
        .cloned()
        .fold(ChangeSet::new(), |changes, source| changes.added(source));
    context.apply_changes(changes);
    tracing::debug!("Opened a context over {} sources", roots.len());
    Ok((context, roots))
}

/// SDK and `file:` resolution, plus `package:` when packages are configured
pub fn build_factory(config: &SableConfig) -> SourceFactory {
    let mut factory = SourceFactory::standard(Arc::new(DartSdk::embedded()));
    if !config.packages.is_empty() {
        factory.register(Box::new(PackageUriResolver::new(config.packages.clone())));
    }
    factory
}

/// Dart files named directly or found under the given directories, sorted
/// and without duplicates. Hidden directories are skipped.
pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    for path in paths {
        let path = absolute(path)?;
        if path.is_file() {
            sources.push(source_for(&path)?);
            continue;
        }
        if !path.is_dir() {
            bail!("No such file or directory: {}", path.display());
        }
        let walker = WalkDir::new(&path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()));
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            if entry.file_type().is_file() && is_dart_file(entry.path()) {
                sources.push(source_for(entry.path())?);
            }
        }
    }
    sources.sort();
    sources.dedup();
    Ok(sources)
}

fn source_for(path: &Path) -> Result<Source> {
    Ok(Source::from_path(path)?)
}

fn is_dart_file(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "dart")
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collects_dart_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lib/src")).unwrap();
        std::fs::create_dir_all(dir.path().join(".dart_tool")).unwrap();
        std::fs::write(dir.path().join("lib/main.dart"), "").unwrap();
        std::fs::write(dir.path().join("lib/src/util.dart"), "").unwrap();
        std::fs::write(dir.path().join("lib/notes.txt"), "").unwrap();
        std::fs::write(dir.path().join(".dart_tool/generated.dart"), "").unwrap();

        let sources = collect_sources(&[
            dir.path().to_path_buf(),
            dir.path().join("lib/main.dart"),
        ])
        .unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.short_name()).collect();
        assert_eq!(names, vec!["main.dart", "util.dart"]);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_sources(&[dir.path().join("nope")]).is_err());
    }
}
