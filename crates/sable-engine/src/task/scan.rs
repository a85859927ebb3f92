use std::sync::Arc;

use sable_core::{
    AnalysisError, AnalysisException, ContentFetch, ContentProvider, LineInfo, Source,
    SourceContent,
};
use sable_parser::{scan, TokenStream};

use super::get_content::GetContentTask;
use super::{guarded, Outcome};
use crate::error::EngineError;

/// Where a scan gets its text from
pub enum ScanInput {
    /// Content that was already fetched
    Content(SourceContent),
    /// Fetch synchronously from a provider; a pending answer is a failure
    Provider(Arc<dyn ContentProvider>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutput {
    pub modification_time: i64,
    pub tokens: Arc<TokenStream>,
    pub line_info: LineInfo,
    pub errors: Vec<AnalysisError>,
}

pub struct ScanDartTask {
    source: Source,
    input: ScanInput,
    preserve_comments: bool,
    outcome: Outcome<ScanOutput>,
}

impl ScanDartTask {
    pub fn new(source: Source, input: ScanInput, preserve_comments: bool) -> Self {
        Self {
            source,
            input,
            preserve_comments,
            outcome: Outcome::NotPerformed,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn output(&self) -> Option<&ScanOutput> {
        self.outcome.output()
    }

    pub fn tokens(&self) -> Option<&Arc<TokenStream>> {
        self.output().map(|output| &output.tokens)
    }

    pub fn line_info(&self) -> Option<&LineInfo> {
        self.output().map(|output| &output.line_info)
    }

    pub fn errors(&self) -> &[AnalysisError] {
        self.output().map_or(&[], |output| &output.errors)
    }

    pub fn modification_time(&self) -> Option<i64> {
        self.output().map(|output| output.modification_time)
    }

    pub fn exception(&self) -> Option<&AnalysisException> {
        self.outcome.exception()
    }

    pub fn description(&self) -> String {
        format!("scanning {}", self.source.full_name())
    }

    pub(crate) fn perform_body(&mut self) {
        self.outcome = guarded(|| self.description(), || self.internal_perform()).into();
    }

    #[tracing::instrument(skip_all, fields(source = %self.source))]
    fn internal_perform(&self) -> anyhow::Result<ScanOutput> {
        let content = match &self.input {
            ScanInput::Content(content) => content.clone(),
            ScanInput::Provider(provider) => {
                match GetContentTask::new(self.source.clone(), provider.clone())
                    .internal_perform()?
                {
                    ContentFetch::Ready(content) => content,
                    ContentFetch::Pending => {
                        return Err(EngineError::ContentPending(self.source.to_string()).into())
                    }
                }
            }
        };
        let scanned = scan(&self.source, &content.data, self.preserve_comments);
        tracing::debug!(
            "Scanned {} into {} tokens",
            self.source,
            scanned.tokens.len()
        );
        Ok(ScanOutput {
            modification_time: content.modification_time,
            tokens: Arc::new(scanned.tokens),
            line_info: scanned.line_info,
            errors: scanned.errors,
        })
    }

    pub(crate) fn into_outcome(self) -> Outcome<ScanOutput> {
        self.outcome
    }
}
