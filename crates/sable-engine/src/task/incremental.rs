use std::sync::Arc;

use sable_core::AnalysisException;
use sable_resolver::ResolvedUnit;

use super::{guarded, Outcome};
use crate::incremental::IncrementalAnalysisCache;

/// Try to reuse the resolved unit of an edited source. Missing or unusable
/// cache data means "no updated unit", never a failure.
pub struct IncrementalAnalysisTask {
    cache: Option<IncrementalAnalysisCache>,
    outcome: Outcome<Option<Arc<ResolvedUnit>>>,
}

impl IncrementalAnalysisTask {
    pub fn new(cache: Option<IncrementalAnalysisCache>) -> Self {
        Self {
            cache,
            outcome: Outcome::NotPerformed,
        }
    }

    pub fn cache(&self) -> Option<&IncrementalAnalysisCache> {
        self.cache.as_ref()
    }

    pub fn updated_unit(&self) -> Option<&Arc<ResolvedUnit>> {
        self.outcome.output().and_then(Option::as_ref)
    }

    pub fn is_performed(&self) -> bool {
        self.outcome.is_performed()
    }

    pub fn exception(&self) -> Option<&AnalysisException> {
        self.outcome.exception()
    }

    pub fn description(&self) -> String {
        match &self.cache {
            Some(cache) => format!("incremental analysis of {}", cache.source.full_name()),
            None => "incremental analysis without a cache".to_string(),
        }
    }

    pub(crate) fn perform_body(&mut self) {
        self.outcome = guarded(|| self.description(), || self.internal_perform()).into();
    }

    #[tracing::instrument(skip_all)]
    fn internal_perform(&self) -> anyhow::Result<Option<Arc<ResolvedUnit>>> {
        Ok(self.cache.as_ref().and_then(IncrementalAnalysisCache::updated_unit))
    }

    pub(crate) fn into_parts(
        self,
    ) -> (Option<IncrementalAnalysisCache>, Outcome<Option<Arc<ResolvedUnit>>>) {
        (self.cache, self.outcome)
    }
}
