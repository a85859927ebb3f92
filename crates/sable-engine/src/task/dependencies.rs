use std::collections::BTreeSet;
use std::sync::Arc;

use sable_core::{AnalysisException, Source, SourceFactory};
use sable_parser::ast::CompilationUnit;
use sable_parser::{extract_dependencies, DirectiveDependencies};

use super::{guarded, Outcome};

/// Resolve the import, export and part URIs of a parsed library
pub struct ResolveDartDependenciesTask {
    source: Source,
    modification_time: i64,
    unit: Arc<CompilationUnit>,
    factory: Arc<SourceFactory>,
    outcome: Outcome<DirectiveDependencies>,
}

impl ResolveDartDependenciesTask {
    pub fn new(
        source: Source,
        modification_time: i64,
        unit: Arc<CompilationUnit>,
        factory: Arc<SourceFactory>,
    ) -> Self {
        Self {
            source,
            modification_time,
            unit,
            factory,
            outcome: Outcome::NotPerformed,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn modification_time(&self) -> i64 {
        self.modification_time
    }

    pub fn dependencies(&self) -> Option<&DirectiveDependencies> {
        self.outcome.output()
    }

    pub fn exported_sources(&self) -> Option<&BTreeSet<Source>> {
        self.dependencies().map(|deps| &deps.exported)
    }

    pub fn imported_sources(&self) -> Option<&BTreeSet<Source>> {
        self.dependencies().map(|deps| &deps.imported)
    }

    pub fn included_sources(&self) -> Option<&BTreeSet<Source>> {
        self.dependencies().map(|deps| &deps.included)
    }

    pub fn exception(&self) -> Option<&AnalysisException> {
        self.outcome.exception()
    }

    pub fn description(&self) -> String {
        format!("resolving dependencies of {}", self.source.full_name())
    }

    pub(crate) fn perform_body(&mut self) {
        self.outcome = guarded(|| self.description(), || self.internal_perform()).into();
    }

    #[tracing::instrument(skip_all, fields(source = %self.source))]
    fn internal_perform(&self) -> anyhow::Result<DirectiveDependencies> {
        let dependencies = extract_dependencies(&self.factory, &self.source, &self.unit);
        tracing::debug!(
            "{} imports {}, exports {} and includes {}",
            self.source,
            dependencies.imported.len(),
            dependencies.exported.len(),
            dependencies.included.len()
        );
        Ok(dependencies)
    }

    pub(crate) fn into_outcome(self) -> Outcome<DirectiveDependencies> {
        self.outcome
    }
}
