use std::sync::Arc;

use sable_core::{AnalysisException, Source};
use sable_resolver::{HintGenerator, LibraryElement, LibraryHints, ResolvedUnit};

use super::{guarded, Outcome};

/// Generate hints for every unit of a library at once
pub struct GenerateDartHintsTask {
    library: Arc<LibraryElement>,
    units: Vec<Arc<ResolvedUnit>>,
    outcome: Outcome<LibraryHints>,
}

impl GenerateDartHintsTask {
    pub fn new(library: Arc<LibraryElement>, units: Vec<Arc<ResolvedUnit>>) -> Self {
        Self {
            library,
            units,
            outcome: Outcome::NotPerformed,
        }
    }

    pub fn library_source(&self) -> &Source {
        &self.library.source
    }

    /// Hints per unit, each stamped with that unit's own modification time
    pub fn hint_map(&self) -> Option<&LibraryHints> {
        self.outcome.output()
    }

    pub fn exception(&self) -> Option<&AnalysisException> {
        self.outcome.exception()
    }

    pub fn description(&self) -> String {
        format!("generating hints for {}", self.library.source.full_name())
    }

    pub(crate) fn perform_body(&mut self) {
        self.outcome = guarded(|| self.description(), || self.internal_perform()).into();
    }

    #[tracing::instrument(skip_all, fields(library = %self.library.source))]
    fn internal_perform(&self) -> anyhow::Result<LibraryHints> {
        Ok(HintGenerator::new(&self.library, &self.units).generate())
    }

    pub(crate) fn into_outcome(self) -> Outcome<LibraryHints> {
        self.outcome
    }
}
