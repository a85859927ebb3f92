use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("IO error reading {source_name}: {message}")]
    Io { source_name: String, message: String },

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Content not available for {0}")]
    ContentUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn io(source_name: impl Into<String>, error: &std::io::Error) -> Self {
        CoreError::Io {
            source_name: source_name.into(),
            message: error.to_string(),
        }
    }
}

/// The single failure type captured by an analysis task.
///
/// Anything a task body raises ends up here: domain failures are created
/// directly, everything else is wrapped with the original error kept as the
/// cause so callers can still inspect it.
#[derive(Clone)]
pub struct AnalysisException {
    message: String,
    cause: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl AnalysisException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Wrap an error that has already been type-erased (`anyhow`, boxed errors).
    pub fn with_boxed_cause(
        message: impl Into<String>,
        cause: Box<dyn std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Arc::from(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Debug for AnalysisException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("AnalysisException");
        debug.field("message", &self.message);
        if let Some(cause) = &self.cause {
            debug.field("cause", &cause.to_string());
        }
        debug.finish()
    }
}

impl fmt::Display for AnalysisException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.message, cause),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for AnalysisException {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<CoreError> for AnalysisException {
    fn from(error: CoreError) -> Self {
        AnalysisException::with_cause(error.to_string(), error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_exception_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let exception = AnalysisException::with_cause("could not read", io);

        assert_eq!(exception.message(), "could not read");
        assert!(exception.source().is_some());
        assert_eq!(exception.to_string(), "could not read: missing");
    }

    #[test]
    fn test_core_error_conversion() {
        let exception: AnalysisException = CoreError::InvalidUri("::".to_string()).into();
        assert!(exception.message().contains("Invalid URI"));
        assert!(exception.cause().is_some());
    }
}
