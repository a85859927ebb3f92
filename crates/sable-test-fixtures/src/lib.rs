//! Test fixtures for the sable engine
//!
//! Small in-memory workspaces, content providers that defer or fail on
//! purpose, and throwaway projects on disk.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sable_core::source::MemoryContentProvider;
use sable_core::{
    AnalysisError, AnalysisOptions, ContentDelivery, ContentFetch, ContentProvider, CoreError,
    DartSdk, ErrorCode, Source, SourceFactory, TimestampedData,
};
use sable_engine::AnalysisContext;

/// URI of a file under the fake `/app` root
pub fn app_uri(name: &str) -> String {
    format!("file:///app/{}", name)
}

pub fn app_source(name: &str) -> Source {
    Source::new(app_uri(name))
}

/// Error codes in reporting order
pub fn codes(errors: &[AnalysisError]) -> Vec<&'static str> {
    errors.iter().map(|e| ErrorCode::name(&e.code)).collect()
}

/// In-memory sources plus the options a context is created with
pub struct Workspace {
    provider: Arc<MemoryContentProvider>,
    options: AnalysisOptions,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            provider: Arc::new(MemoryContentProvider::new()),
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    /// Add `/app/<name>` with `contents`.
    pub fn file(self, name: &str, contents: &str) -> Self {
        self.provider.set_contents(&app_source(name), contents);
        self
    }

    pub fn provider(&self) -> Arc<MemoryContentProvider> {
        self.provider.clone()
    }

    /// Context over this workspace with every file added as a root
    pub fn context(&self) -> AnalysisContext {
        let mut context = self.empty_context();
        let mut changes = sable_engine::ChangeSet::new();
        for source in self.provider.sources() {
            changes = changes.added(source);
        }
        context.apply_changes(changes);
        context
    }

    /// Context over this workspace without any roots
    pub fn empty_context(&self) -> AnalysisContext {
        AnalysisContext::new(
            self.options,
            SourceFactory::standard(Arc::new(DartSdk::embedded())),
            self.provider.clone(),
        )
    }
}

/// Answers `Pending` for deferred sources and remembers which were asked for.
/// Everything else is served from memory.
pub struct DeferredContentProvider {
    inner: MemoryContentProvider,
    deferred: HashSet<Source>,
    requested: Mutex<BTreeSet<Source>>,
}

impl DeferredContentProvider {
    pub fn new(inner: MemoryContentProvider, deferred: impl IntoIterator<Item = Source>) -> Self {
        Self {
            inner,
            deferred: deferred.into_iter().collect(),
            requested: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn requested(&self) -> Vec<Source> {
        self.requested.lock().iter().cloned().collect()
    }
}

impl ContentProvider for DeferredContentProvider {
    fn exists(&self, source: &Source) -> bool {
        self.deferred.contains(source) || self.inner.exists(source)
    }

    fn modification_stamp(&self, source: &Source) -> i64 {
        self.inner.modification_stamp(source)
    }

    fn fetch(&self, source: &Source) -> Result<ContentFetch, CoreError> {
        if self.deferred.contains(source) {
            self.requested.lock().insert(source.clone());
            return Ok(ContentFetch::Pending);
        }
        self.inner.fetch(source)
    }
}

/// Claims every source exists and fails to read any of them
#[derive(Debug, Default)]
pub struct FailingContentProvider;

impl ContentProvider for FailingContentProvider {
    fn exists(&self, _source: &Source) -> bool {
        true
    }

    fn modification_stamp(&self, _source: &Source) -> i64 {
        1
    }

    fn fetch(&self, source: &Source) -> Result<ContentFetch, CoreError> {
        Err(CoreError::Io {
            source_name: source.full_name().to_string(),
            message: "disk on fire".to_string(),
        })
    }
}

/// Content for a deferred source, as a host would send it
pub fn delivery(source: &Source, modification_time: i64, contents: &str) -> ContentDelivery {
    ContentDelivery {
        source: source.clone(),
        result: Ok(TimestampedData::new(modification_time, Arc::from(contents))),
    }
}

/// A throwaway project directory
pub struct TempProject {
    dir: tempfile::TempDir,
}

impl TempProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn source(&self, relative: &str) -> Source {
        Source::from_path(&self.dir.path().join(relative)).unwrap()
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}
