use std::sync::Arc;

use sable_core::{
    AnalysisException, ContentDelivery, ContentFetch, ContentProvider, Source, SourceContent,
};

use super::{guarded, Outcome};

/// Fetch the contents of a source. The provider may answer later, in which
/// case the task stays pending until [`GetContentTask::complete`] is called
/// with the delivered content.
pub struct GetContentTask {
    source: Source,
    provider: Arc<dyn ContentProvider>,
    outcome: Outcome<ContentFetch>,
}

impl GetContentTask {
    pub fn new(source: Source, provider: Arc<dyn ContentProvider>) -> Self {
        Self {
            source,
            provider,
            outcome: Outcome::NotPerformed,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The content, once it has been fetched
    pub fn content(&self) -> Option<&SourceContent> {
        match self.outcome.output() {
            Some(ContentFetch::Ready(content)) => Some(content),
            _ => None,
        }
    }

    /// True while the provider has yet to deliver the content
    pub fn is_pending(&self) -> bool {
        matches!(self.outcome.output(), Some(ContentFetch::Pending))
    }

    pub fn exception(&self) -> Option<&AnalysisException> {
        self.outcome.exception()
    }

    pub fn description(&self) -> String {
        format!("getting contents of {}", self.source.full_name())
    }

    pub(crate) fn perform_body(&mut self) {
        self.outcome = guarded(|| self.description(), || self.internal_perform()).into();
    }

    #[tracing::instrument(skip_all, fields(source = %self.source))]
    pub(crate) fn internal_perform(&self) -> anyhow::Result<ContentFetch> {
        let fetch = self
            .provider
            .fetch(&self.source)
            .map_err(AnalysisException::from)?;
        if matches!(fetch, ContentFetch::Pending) {
            tracing::debug!("Contents of {} will be delivered later", self.source);
        }
        Ok(fetch)
    }

    /// Fill in content that arrived after a pending answer. Returns false,
    /// leaving the task untouched, if the delivery is for another source.
    pub fn complete(&mut self, delivery: ContentDelivery) -> bool {
        if delivery.source != self.source {
            tracing::warn!(
                "Content for {} delivered to the request for {}",
                delivery.source,
                self.source
            );
            return false;
        }
        self.outcome = match delivery.result {
            Ok(content) => Outcome::Completed(ContentFetch::Ready(content)),
            Err(error) => {
                let exception = AnalysisException::from(error);
                tracing::info!("Task failed: {}: {}", self.description(), exception);
                Outcome::Failed(exception)
            }
        };
        true
    }

    pub(crate) fn into_outcome(self) -> Outcome<ContentFetch> {
        self.outcome
    }
}
