//! Shared vocabulary for the sable Dart analysis engine: sources and their
//! contents, URI resolution, diagnostics, options and fingerprints

pub mod diagnostics;
pub mod error;
pub mod factory;
pub mod fingerprint;
pub mod line_info;
pub mod options;
pub mod sdk;
pub mod source;

pub use diagnostics::{
    AnalysisError, CompileTimeErrorCode, ErrorCode, ErrorReporter, ErrorSeverity, ErrorType,
    HintCode, ParserErrorCode, RecordingErrorListener, ScannerErrorCode, StaticTypeWarningCode,
    StaticWarningCode,
};
pub use error::{AnalysisException, CoreError};
pub use factory::{SourceFactory, UriResolver};
pub use fingerprint::ContentFingerprint;
pub use line_info::{LineInfo, Location};
pub use options::{AnalysisOptions, SableConfig};
pub use sdk::DartSdk;
pub use source::{
    ContentDelivery, ContentFetch, ContentProvider, Source, SourceContent, SourceKind,
    TimestampedData,
};
