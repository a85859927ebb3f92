//! The incremental fast path
//!
//! When a source is edited, the resolved unit cached for its previous
//! contents is kept aside. If the new contents turn out to be identical to
//! the ones that unit was built from, it is reused under the new
//! modification time instead of scanning, parsing and resolving again. Any
//! other edit falls back to full analysis.

use std::sync::Arc;

use sable_core::fingerprint::FingerprintBuilder;
use sable_core::{AnalysisOptions, ContentFingerprint, Source};
use sable_resolver::ResolvedUnit;

use crate::cache::DartEntry;

/// Where an edit happened, as reported by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEdit {
    pub offset: usize,
    pub old_length: usize,
    pub new_length: usize,
}

/// Fingerprint of source text together with the options that shape its tree
pub fn content_fingerprint(contents: &str, options: &AnalysisOptions) -> ContentFingerprint {
    FingerprintBuilder::new()
        .add_content_str(contents)
        .add_metadata("analyze_function_bodies", options.analyze_function_bodies)
        .add_metadata("preserve_comments", options.preserve_comments)
        .build()
}

/// The last resolved state of an edited source plus its new contents
#[derive(Debug, Clone)]
pub struct IncrementalAnalysisCache {
    pub source: Source,
    pub edit: TextEdit,
    pub new_contents: Arc<str>,
    pub new_fingerprint: ContentFingerprint,
    pub modification_time: i64,
    /// The entry as it was before the edit
    pub previous: DartEntry,
}

impl IncrementalAnalysisCache {
    /// `None` when the previous entry has no resolved unit to reuse.
    pub fn new(
        source: Source,
        previous: DartEntry,
        new_contents: &str,
        modification_time: i64,
        edit: TextEdit,
        options: &AnalysisOptions,
    ) -> Option<Self> {
        if !previous.resolved_unit.is_valid() || previous.fingerprint.is_none() {
            tracing::trace!("No resolved unit of {} to reuse", source);
            return None;
        }
        Some(Self {
            source,
            edit,
            new_contents: Arc::from(new_contents),
            new_fingerprint: content_fingerprint(new_contents, options),
            modification_time,
            previous,
        })
    }

    /// The previous resolved unit restamped with the new modification time,
    /// if the new contents match the ones it was resolved from
    pub fn updated_unit(&self) -> Option<Arc<ResolvedUnit>> {
        let previous_fingerprint = self.previous.fingerprint.as_ref()?;
        if !previous_fingerprint.content_matches(&self.new_fingerprint) {
            tracing::debug!(
                "Edit at {} in {} changed the contents, {} -> {}",
                self.edit.offset,
                self.source,
                previous_fingerprint.short_hash(),
                self.new_fingerprint.short_hash()
            );
            return None;
        }
        let resolved = self.previous.resolved_unit.value()?;
        Some(Arc::new(ResolvedUnit {
            modification_time: self.modification_time,
            ..ResolvedUnit::clone(resolved)
        }))
    }
}
