use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Could not resolve dart:core")]
    CoreNotResolved,

    #[error("dart:core does not declare the class '{0}'")]
    MissingCoreType(String),

    #[error("No library element for {0}")]
    MissingLibrary(String),

    #[error("{0} is not a compilation unit of {1}")]
    UnitNotInLibrary(String, String),
}
