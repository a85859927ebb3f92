use sable_core::AnalysisException;
use sable_resolver::ResolverError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Analysis of {source_name} failed: {exception}")]
    Analysis {
        source_name: String,
        exception: AnalysisException,
    },

    #[error("{0} is not a library")]
    NotALibrary(String),

    #[error("Content of {0} has not been delivered yet")]
    ContentPending(String),

    #[error("Analysis finished without computing the requested result for {0}")]
    NotComputed(String),

    #[error("Task '{0}' was dispatched before it was performed")]
    TaskNotPerformed(String),

    #[error("No token stream for {0}")]
    MissingTokens(String),

    #[error("Task panicked: {0}")]
    Panic(String),

    #[error("The content delivery channel is closed")]
    ContentChannelClosed,

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl EngineError {
    pub fn analysis(source_name: impl Into<String>, exception: AnalysisException) -> Self {
        EngineError::Analysis {
            source_name: source_name.into(),
            exception,
        }
    }
}
