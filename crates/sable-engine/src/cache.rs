//! Per-source analysis results
//!
//! Every value a task produces for a source is kept in that source's
//! [`DartEntry`] together with the modification time of the content it was
//! derived from. A result computed from content that has since changed is
//! rejected when it is recorded instead of cancelling the task that
//! produced it.

use std::sync::Arc;

use dashmap::DashMap;
use sable_core::{
    AnalysisError, AnalysisException, ContentFingerprint, LineInfo, Source, SourceKind,
};
use sable_parser::ast::CompilationUnit;
use sable_parser::DirectiveDependencies;
use sable_resolver::{LibraryElement, ResolvedUnit};

use crate::task::ScanOutput;

/// Modification time of an entry whose content has not been read yet
pub const UNKNOWN_MODIFICATION_TIME: i64 = -1;

/// State of one cached datum
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CachedValue<T> {
    /// Not computed, or computed from content that has since changed
    #[default]
    Invalid,
    /// A task producing the value is outstanding
    InProcess,
    Valid(T),
    /// The task producing the value failed
    Error,
    /// Computed once and then dropped to save memory; recomputed on demand
    Flushed,
}

impl<T> CachedValue<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            CachedValue::Valid(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CachedValue::Valid(_))
    }

    pub fn needs_computation(&self) -> bool {
        matches!(self, CachedValue::Invalid | CachedValue::Flushed)
    }

    /// Valid or failed; either way no task will be scheduled for it
    pub fn is_settled(&self) -> bool {
        matches!(self, CachedValue::Valid(_) | CachedValue::Error)
    }

    pub fn flush(&mut self) {
        if self.is_valid() {
            *self = CachedValue::Flushed;
        }
    }
}

/// Everything known about one Dart source
#[derive(Debug, Clone)]
pub struct DartEntry {
    pub modification_time: i64,
    pub content: CachedValue<Arc<str>>,
    pub fingerprint: Option<ContentFingerprint>,
    pub scan: CachedValue<ScanOutput>,
    pub kind: CachedValue<SourceKind>,
    pub line_info: CachedValue<LineInfo>,
    pub parsed_unit: CachedValue<Arc<CompilationUnit>>,
    /// Scanner and parser errors
    pub parse_errors: CachedValue<Vec<AnalysisError>>,
    pub dependencies: CachedValue<DirectiveDependencies>,
    pub element: CachedValue<Arc<LibraryElement>>,
    /// Errors reported while building the element model
    pub build_errors: CachedValue<Vec<AnalysisError>>,
    pub resolved_unit: CachedValue<Arc<ResolvedUnit>>,
    pub resolution_errors: CachedValue<Vec<AnalysisError>>,
    pub hints: CachedValue<Vec<AnalysisError>>,
    /// The most recent task failure for this source
    pub exception: Option<AnalysisException>,
}

impl Default for DartEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl DartEntry {
    pub fn new() -> Self {
        Self {
            modification_time: UNKNOWN_MODIFICATION_TIME,
            content: CachedValue::Invalid,
            fingerprint: None,
            scan: CachedValue::Invalid,
            kind: CachedValue::Invalid,
            line_info: CachedValue::Invalid,
            parsed_unit: CachedValue::Invalid,
            parse_errors: CachedValue::Invalid,
            dependencies: CachedValue::Invalid,
            element: CachedValue::Invalid,
            build_errors: CachedValue::Invalid,
            resolved_unit: CachedValue::Invalid,
            resolution_errors: CachedValue::Invalid,
            hints: CachedValue::Invalid,
            exception: None,
        }
    }

    /// Empty entry for `source`. HTML sources are classified up front and
    /// every Dart stage is settled, so no task is ever scheduled for them.
    pub fn for_source(source: &Source) -> Self {
        let mut entry = Self::new();
        if source.is_html() {
            entry.kind = CachedValue::Valid(SourceKind::Html);
            entry.scan = CachedValue::Error;
            entry.line_info = CachedValue::Error;
            entry.parsed_unit = CachedValue::Error;
            entry.parse_errors = CachedValue::Valid(Vec::new());
            entry.dependencies = CachedValue::Error;
            entry.settle_html_resolution();
        }
        entry
    }

    pub fn is_html(&self) -> bool {
        self.kind() == SourceKind::Html
    }

    fn settle_html_resolution(&mut self) {
        self.element = CachedValue::Error;
        self.build_errors = CachedValue::Valid(Vec::new());
        self.resolved_unit = CachedValue::Error;
        self.resolution_errors = CachedValue::Valid(Vec::new());
        self.hints = CachedValue::Error;
    }

    pub fn kind(&self) -> SourceKind {
        self.kind.value().copied().unwrap_or(SourceKind::Unknown)
    }

    pub fn is_library(&self) -> bool {
        self.kind() == SourceKind::Library
    }

    /// Drop everything derived from other sources: the element model, unit
    /// resolution and hints.
    pub fn invalidate_resolution(&mut self) {
        if self.is_html() {
            self.settle_html_resolution();
            return;
        }
        self.element = CachedValue::Invalid;
        self.build_errors = CachedValue::Invalid;
        self.resolved_unit = CachedValue::Invalid;
        self.resolution_errors = CachedValue::Invalid;
        self.hints = CachedValue::Invalid;
    }

    /// Record a failure of the content, scan or parse stage. Nothing
    /// downstream can be computed for this source.
    pub fn record_parse_failure(&mut self, exception: AnalysisException) {
        if self.content.needs_computation() || self.content == CachedValue::InProcess {
            self.content = CachedValue::Error;
        }
        self.scan = CachedValue::Error;
        self.kind = CachedValue::Valid(SourceKind::Unknown);
        self.line_info = CachedValue::Error;
        self.parsed_unit = CachedValue::Error;
        self.parse_errors = CachedValue::Valid(Vec::new());
        self.dependencies = CachedValue::Error;
        self.resolved_unit = CachedValue::Error;
        self.resolution_errors = CachedValue::Valid(Vec::new());
        self.hints = CachedValue::Error;
        self.exception = Some(exception);
    }

    /// Errors of every stage computed so far, in pipeline order
    pub fn errors(&self, include_hints: bool) -> Vec<AnalysisError> {
        let mut errors = Vec::new();
        let stages = [
            &self.parse_errors,
            &self.build_errors,
            &self.resolution_errors,
        ];
        for stage in stages {
            if let Some(stage_errors) = stage.value() {
                errors.extend(stage_errors.iter().cloned());
            }
        }
        if include_hints {
            if let Some(hints) = self.hints.value() {
                errors.extend(hints.iter().cloned());
            }
        }
        errors
    }
}

/// Concurrent map from source to its entry
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: DashMap<Source, DartEntry>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, source: &Source) -> bool {
        self.entries.contains_key(source)
    }

    /// Add an empty entry for `source`. Returns true if it was not cached yet.
    pub fn ensure(&self, source: &Source) -> bool {
        if self.entries.contains_key(source) {
            return false;
        }
        self.entries
            .insert(source.clone(), DartEntry::for_source(source));
        true
    }

    pub fn get(&self, source: &Source) -> Option<DartEntry> {
        self.entries.get(source).map(|entry| entry.clone())
    }

    pub fn read<R>(&self, source: &Source, f: impl FnOnce(&DartEntry) -> R) -> Option<R> {
        self.entries.get(source).map(|entry| f(&entry))
    }

    pub fn update<R>(&self, source: &Source, f: impl FnOnce(&mut DartEntry) -> R) -> Option<R> {
        self.entries.get_mut(source).map(|mut entry| f(&mut entry))
    }

    /// Apply `f` only if the entry still describes the content at
    /// `modification_time`. Stale results are dropped and false is returned.
    pub fn record(
        &self,
        source: &Source,
        modification_time: i64,
        f: impl FnOnce(&mut DartEntry),
    ) -> bool {
        match self.entries.get_mut(source) {
            Some(mut entry) if entry.modification_time == modification_time => {
                f(&mut entry);
                true
            }
            Some(entry) => {
                tracing::warn!(
                    "Discarding result for {} computed at {}, content is now at {}",
                    source,
                    modification_time,
                    entry.modification_time
                );
                false
            }
            None => {
                tracing::warn!("Discarding result for {}, it is no longer cached", source);
                false
            }
        }
    }

    pub fn remove(&self, source: &Source) -> Option<DartEntry> {
        self.entries.remove(source).map(|(_, entry)| entry)
    }

    /// Every cached source, sorted
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.entries.iter().map(|e| e.key().clone()).collect();
        sources.sort();
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_rejects_stale_modification_time() {
        let cache = AnalysisCache::new();
        let source = Source::new("file:///a.dart");
        cache.ensure(&source);
        cache.update(&source, |entry| entry.modification_time = 7);

        assert!(!cache.record(&source, 6, |entry| {
            entry.kind = CachedValue::Valid(SourceKind::Library)
        }));
        assert_eq!(cache.read(&source, |e| e.kind.clone()), Some(CachedValue::Invalid));

        assert!(cache.record(&source, 7, |entry| {
            entry.kind = CachedValue::Valid(SourceKind::Part)
        }));
        assert_eq!(cache.read(&source, DartEntry::kind), Some(SourceKind::Part));
    }

    #[test]
    fn test_record_for_removed_source_is_dropped() {
        let cache = AnalysisCache::new();
        let source = Source::new("file:///gone.dart");
        assert!(!cache.record(&source, UNKNOWN_MODIFICATION_TIME, |_| {}));
        assert!(!cache.contains(&source));
    }

    #[test]
    fn test_flush_only_affects_valid_values() {
        let mut value = CachedValue::Valid(3);
        value.flush();
        assert_eq!(value, CachedValue::Flushed);
        assert!(value.needs_computation());

        let mut failed: CachedValue<i32> = CachedValue::Error;
        failed.flush();
        assert_eq!(failed, CachedValue::Error);
        assert!(failed.is_settled());
    }

    #[test]
    fn test_invalidate_resolution_keeps_parse_results() {
        let mut entry = DartEntry::new();
        entry.kind = CachedValue::Valid(SourceKind::Library);
        entry.parse_errors = CachedValue::Valid(Vec::new());
        entry.hints = CachedValue::Valid(Vec::new());
        entry.invalidate_resolution();
        assert!(entry.is_library());
        assert!(entry.parse_errors.is_valid());
        assert_eq!(entry.hints, CachedValue::Invalid);
    }

    #[test]
    fn test_html_entry_is_settled_without_tasks() {
        let cache = AnalysisCache::new();
        let page = Source::new("file:///web/index.html");
        cache.ensure(&page);
        let mut entry = cache.get(&page).unwrap();
        assert!(entry.is_html());
        assert!(entry.parsed_unit.is_settled());
        assert!(!entry.content.is_settled());

        entry.invalidate_resolution();
        assert!(entry.resolved_unit.is_settled());
        assert!(entry.hints.is_settled());
        assert!(entry.errors(true).is_empty());
    }

    #[test]
    fn test_sources_are_sorted() {
        let cache = AnalysisCache::new();
        for uri in ["file:///b.dart", "dart:core", "file:///a.dart"] {
            cache.ensure(&Source::new(uri));
        }
        let uris: Vec<String> = cache.sources().iter().map(|s| s.to_string()).collect();
        assert_eq!(uris, vec!["dart:core", "file:///a.dart", "file:///b.dart"]);
    }
}
