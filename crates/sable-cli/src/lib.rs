//! Command line front end for the sable Dart analysis engine
//!
//! Files are read on the tokio runtime and fed to an
//! [`AnalysisContext`](sable_engine::AnalysisContext) through its content
//! channel, so a slow disk never blocks the task loop.

pub mod commands;
pub mod config;
pub mod provider;
pub mod report;

pub use commands::{analyze, build_factory, collect_sources, dependencies};
pub use config::AnalysisArgs;
pub use report::{AnalysisReport, DependencyReport, Diagnostic};
