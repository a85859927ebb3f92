use thiserror::Error;

/// Why a directive's URI could not be turned into a source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error("URI uses string interpolation: {0}")]
    UriWithInterpolation(String),

    #[error("Invalid URI syntax: {0}")]
    InvalidUri(String),

    #[error("Target of URI does not exist: {0}")]
    UriDoesNotExist(String),
}
