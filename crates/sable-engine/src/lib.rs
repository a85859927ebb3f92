//! Incremental, task-based analysis of Dart sources
//!
//! An [`AnalysisContext`] keeps one [`DartEntry`] per known source and
//! hands out [`AnalysisTask`]s in pipeline order. Each task computes its
//! outputs from inputs captured when it was created, so a result may be
//! stale by the time it comes back; stale results are dropped when they are
//! recorded.

pub mod cache;
pub mod content;
pub mod context;
pub mod cycles;
pub mod error;
pub mod incremental;
mod recorder;
pub mod task;

pub use cache::{AnalysisCache, CachedValue, DartEntry};
pub use content::OverlayContentProvider;
pub use context::{AnalysisContext, AnalysisResult, ChangeSet, Progress};
pub use cycles::{DependencyKind, LibraryGraph};
pub use error::EngineError;
pub use incremental::{content_fingerprint, IncrementalAnalysisCache, TextEdit};
pub use task::{AnalysisTask, TaskVisitor};
