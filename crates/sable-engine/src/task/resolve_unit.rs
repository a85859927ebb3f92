use std::sync::Arc;

use sable_core::{AnalysisError, AnalysisException, RecordingErrorListener, Source};
use sable_parser::ast::CompilationUnit;
use sable_resolver::{
    resolve_unit, LibraryElement, LibraryMap, ResolvedUnit, TypeProvider, UnitContext,
};

use super::{guarded, Outcome};

#[derive(Debug, Clone)]
pub struct UnitResolution {
    pub resolved_unit: Arc<ResolvedUnit>,
    /// Resolution, constant and static verification errors
    pub errors: Vec<AnalysisError>,
}

/// Resolve one compilation unit against its library's element model
pub struct ResolveDartUnitTask {
    source: Source,
    modification_time: i64,
    unit: Arc<CompilationUnit>,
    library: Arc<LibraryElement>,
    libraries: Arc<LibraryMap>,
    provider: Arc<TypeProvider>,
    outcome: Outcome<UnitResolution>,
}

impl ResolveDartUnitTask {
    pub fn new(
        source: Source,
        modification_time: i64,
        unit: Arc<CompilationUnit>,
        library: Arc<LibraryElement>,
        libraries: Arc<LibraryMap>,
        provider: Arc<TypeProvider>,
    ) -> Self {
        Self {
            source,
            modification_time,
            unit,
            library,
            libraries,
            provider,
            outcome: Outcome::NotPerformed,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn library_source(&self) -> &Source {
        &self.library.source
    }

    pub fn modification_time(&self) -> i64 {
        self.modification_time
    }

    pub fn resolved_unit(&self) -> Option<&Arc<ResolvedUnit>> {
        self.outcome.output().map(|output| &output.resolved_unit)
    }

    pub fn errors(&self) -> &[AnalysisError] {
        self.outcome.output().map_or(&[], |output| &output.errors)
    }

    pub fn exception(&self) -> Option<&AnalysisException> {
        self.outcome.exception()
    }

    pub fn description(&self) -> String {
        format!(
            "resolving {} in {}",
            self.source.full_name(),
            self.library.source.full_name()
        )
    }

    pub(crate) fn perform_body(&mut self) {
        self.outcome = guarded(|| self.description(), || self.internal_perform()).into();
    }

    #[tracing::instrument(skip_all, fields(source = %self.source))]
    fn internal_perform(&self) -> anyhow::Result<UnitResolution> {
        let context = UnitContext::new(
            &self.source,
            &self.library,
            self.libraries.as_ref(),
            &self.provider,
        )?;
        let mut listener = RecordingErrorListener::new();
        let resolved = resolve_unit(
            &context,
            self.modification_time,
            self.unit.clone(),
            &mut listener,
        );
        Ok(UnitResolution {
            resolved_unit: Arc::new(resolved),
            errors: listener.into_errors(),
        })
    }

    pub(crate) fn into_outcome(self) -> Outcome<UnitResolution> {
        self.outcome
    }
}
