//! The analysis context: owns the cache and decides what to do next
//!
//! Work is driven one task at a time through
//! [`AnalysisContext::perform_analysis_task`]. Tasks are chosen in pipeline
//! order: first every known source is fetched, scanned, parsed and has its
//! dependencies resolved, then library cycles are built with their
//! dependencies first, then units are resolved, and finally hints are
//! generated. When only outstanding content deliveries remain, the
//! wait-for-async task is returned instead.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use sable_core::source::SdkContentProvider;
use sable_core::{
    AnalysisError, AnalysisOptions, ContentDelivery, ContentProvider, DartSdk, LineInfo, Source,
    SourceContent, SourceFactory, SourceKind, TimestampedData,
};
use sable_parser::ast::CompilationUnit;
use sable_parser::DirectiveDependencies;
use sable_resolver::{
    LibraryElement, LibraryMap, ResolvableLibrary, ResolvablePart, ResolvedUnit, TypeProvider,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::cache::{AnalysisCache, CachedValue, DartEntry};
use crate::content::OverlayContentProvider;
use crate::cycles::{DependencyKind, LibraryGraph};
use crate::error::EngineError;
use crate::incremental::{IncrementalAnalysisCache, TextEdit};
use crate::recorder::ResultRecorder;
use crate::task::{
    AnalysisTask, BuildDartElementModelTask, DirectiveSnapshot, GenerateDartHintsTask,
    GetContentTask, IncrementalAnalysisTask, ParseDartTask, ResolveDartDependenciesTask,
    ResolveDartUnitTask, ScanDartTask, ScanInput,
};

/// Sources added to, changed in, or removed from the context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<Source>,
    pub changed: Vec<Source>,
    pub removed: Vec<Source>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn added(mut self, source: Source) -> Self {
        self.added.push(source);
        self
    }

    pub fn changed(mut self, source: Source) -> Self {
        self.changed.push(source);
        self
    }

    pub fn removed(mut self, source: Source) -> Self {
        self.removed.push(source);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// What one call to [`AnalysisContext::perform_analysis_task`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Description of the task performed, `None` when nothing is left to do
    pub task: Option<String>,
    /// Sources whose cached results changed
    pub changed: Vec<Source>,
    /// Nothing could run because content is still being delivered
    pub waiting: bool,
}

impl AnalysisResult {
    pub fn is_complete(&self) -> bool {
        self.task.is_none()
    }
}

/// Where [`AnalysisContext::run_until_idle`] stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Complete,
    WaitingForContent,
}

pub struct AnalysisContext {
    pub(crate) options: AnalysisOptions,
    factory: Arc<SourceFactory>,
    content: Arc<OverlayContentProvider>,
    pub(crate) cache: AnalysisCache,
    roots: BTreeSet<Source>,
    pub(crate) pending: HashMap<Source, GetContentTask>,
    /// Modification time of the last delivery accepted per source since it
    /// last changed
    delivered: HashMap<Source, i64>,
    deliveries: VecDeque<ContentDelivery>,
    content_tx: UnboundedSender<ContentDelivery>,
    content_rx: UnboundedReceiver<ContentDelivery>,
    incremental: Option<IncrementalAnalysisCache>,
    pub(crate) type_provider: Option<Arc<TypeProvider>>,
    tasks_performed: usize,
}

impl AnalysisContext {
    /// `provider` supplies everything except the embedded `dart:` libraries.
    pub fn new(
        options: AnalysisOptions,
        factory: SourceFactory,
        provider: Arc<dyn ContentProvider>,
    ) -> Self {
        let sdk = Arc::new(DartSdk::embedded());
        let content = OverlayContentProvider::new(Arc::new(SdkContentProvider::new(sdk, provider)));
        let (content_tx, content_rx) = mpsc::unbounded_channel();
        let cache = AnalysisCache::new();
        cache.ensure(&DartSdk::core_source());
        Self {
            options,
            factory: Arc::new(factory),
            content: Arc::new(content),
            cache,
            roots: BTreeSet::new(),
            pending: HashMap::new(),
            delivered: HashMap::new(),
            deliveries: VecDeque::new(),
            content_tx,
            content_rx,
            incremental: None,
            type_provider: None,
            tasks_performed: 0,
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn source_factory(&self) -> &SourceFactory {
        &self.factory
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Sources added explicitly, as opposed to discovered through directives
    pub fn roots(&self) -> impl Iterator<Item = &Source> {
        self.roots.iter()
    }

    pub fn tasks_performed(&self) -> usize {
        self.tasks_performed
    }

    pub fn exists(&self, source: &Source) -> bool {
        self.content.exists(source)
    }

    /// Where providers that answered `Pending` send the content later
    pub fn content_sender(&self) -> UnboundedSender<ContentDelivery> {
        self.content_tx.clone()
    }

    pub fn has_pending_content(&self) -> bool {
        !self.pending.is_empty()
    }

    #[tracing::instrument(
        skip_all,
        fields(
            added = changes.added.len(),
            changed = changes.changed.len(),
            removed = changes.removed.len()
        )
    )]
    pub fn apply_changes(&mut self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        let graph = self.library_graph();
        let mut affected = BTreeSet::new();
        for source in changes.added {
            self.roots.insert(source.clone());
            if !self.cache.ensure(&source) {
                self.invalidate_content(&source);
            }
            affected.insert(source);
        }
        for source in changes.changed {
            if !self.cache.ensure(&source) {
                self.invalidate_content(&source);
            }
            affected.insert(source);
        }
        for source in changes.removed {
            self.roots.remove(&source);
            self.pending.remove(&source);
            self.delivered.remove(&source);
            self.cache.remove(&source);
            affected.insert(source);
        }
        self.invalidate_dependents(&graph, &affected);
    }

    /// Replace the contents of `source` with an overlay, or drop the overlay
    /// when `contents` is `None`.
    pub fn set_contents(&mut self, source: &Source, contents: Option<&str>) {
        match contents {
            Some(text) => {
                let stamp = self.content.set(source, text);
                tracing::debug!("Overlay for {} at {}", source, stamp);
            }
            None => {
                self.content.remove(source);
            }
        }
        self.apply_changes(ChangeSet::new().changed(source.clone()));
    }

    /// Like [`set_contents`](Self::set_contents), but for an edit of a known
    /// range. The resolved unit from before the edit is kept so it can be
    /// reused if the new contents are the same.
    pub fn set_changed_contents(
        &mut self,
        source: &Source,
        contents: &str,
        offset: usize,
        old_length: usize,
        new_length: usize,
    ) {
        let previous = self.cache.get(source);
        self.set_contents(source, Some(contents));
        if !self.options.incremental {
            return;
        }
        let edit = TextEdit {
            offset,
            old_length,
            new_length,
        };
        let modification_time = self.content.modification_stamp(source);
        self.incremental = previous.and_then(|previous| {
            IncrementalAnalysisCache::new(
                source.clone(),
                previous,
                contents,
                modification_time,
                edit,
                &self.options,
            )
        });
    }

    /// Perform the next task, if there is one, and record its results.
    #[tracing::instrument(skip(self))]
    pub fn perform_analysis_task(&mut self) -> Result<AnalysisResult, EngineError> {
        while let Ok(delivery) = self.content_rx.try_recv() {
            self.deliveries.push_back(delivery);
        }
        while let Some(delivery) = self.deliveries.pop_front() {
            let source = delivery.source.clone();
            let stamp = delivery
                .result
                .as_ref()
                .ok()
                .map(|content| content.modification_time);
            let mut task = match self.pending.remove(&source) {
                Some(task) => task,
                None if self.supersedes(&source, stamp) => {
                    tracing::debug!("Newer contents of {} delivered, reanalyzing", source);
                    self.apply_changes(ChangeSet::new().changed(source.clone()));
                    self.cache
                        .update(&source, |entry| entry.content = CachedValue::InProcess);
                    let provider: Arc<dyn ContentProvider> = self.content.clone();
                    GetContentTask::new(source.clone(), provider)
                }
                None => {
                    tracing::warn!(
                        "Ignoring content for {}, it was not requested or has changed since",
                        source
                    );
                    continue;
                }
            };
            if !task.complete(delivery) {
                continue;
            }
            if let Some(stamp) = stamp {
                self.delivered.insert(source, stamp);
            }
            return self.dispatch(AnalysisTask::GetContent(task), false);
        }

        match self.next_task() {
            Some(task) => self.dispatch(task, true),
            None => Ok(AnalysisResult::default()),
        }
    }

    /// Perform and record an externally created task.
    pub fn perform_task(&mut self, task: AnalysisTask) -> Result<AnalysisResult, EngineError> {
        self.dispatch(task, true)
    }

    fn dispatch(
        &mut self,
        task: AnalysisTask,
        perform: bool,
    ) -> Result<AnalysisResult, EngineError> {
        let description = task.description();
        let waiting = matches!(task, AnalysisTask::WaitForAsync);
        tracing::debug!("Performing task: {}", description);
        let mut recorder = ResultRecorder { context: self };
        let changed = if perform {
            task.perform(&mut recorder)?
        } else {
            task.accept(&mut recorder)?
        };
        self.tasks_performed += 1;
        Ok(AnalysisResult {
            task: Some(description),
            changed,
            waiting,
        })
    }

    /// Perform tasks until analysis is complete or has to wait for content.
    pub fn run_until_idle(&mut self) -> Result<Progress, EngineError> {
        loop {
            let result = self.perform_analysis_task()?;
            if result.is_complete() {
                return Ok(Progress::Complete);
            }
            if result.waiting {
                return Ok(Progress::WaitingForContent);
            }
        }
    }

    /// Wait for the next content delivery. Returns false if nothing is
    /// outstanding.
    pub async fn wait_for_content(&mut self) -> Result<bool, EngineError> {
        if self.pending.is_empty() {
            return Ok(false);
        }
        match self.content_rx.recv().await {
            Some(delivery) => {
                self.deliveries.push_back(delivery);
                Ok(true)
            }
            None => Err(EngineError::ContentChannelClosed),
        }
    }

    /// Analyze every known source completely, waiting for deferred content
    /// as needed. Returns the number of tasks performed so far.
    #[tracing::instrument(skip(self))]
    pub async fn analyze_all(&mut self) -> Result<usize, EngineError> {
        loop {
            match self.run_until_idle()? {
                Progress::Complete => return Ok(self.tasks_performed),
                Progress::WaitingForContent => {
                    self.wait_for_content().await?;
                }
            }
        }
    }

    pub fn compute_kind_of(&mut self, source: &Source) -> Result<SourceKind, EngineError> {
        self.compute(source, |entry| match &entry.kind {
            CachedValue::Valid(kind) => Some(Ok(*kind)),
            CachedValue::Error => Some(Ok(SourceKind::Unknown)),
            _ => None,
        })
    }

    pub fn compute_line_info(&mut self, source: &Source) -> Result<LineInfo, EngineError> {
        self.compute(source, |entry| match &entry.line_info {
            CachedValue::Valid(line_info) => Some(Ok(line_info.clone())),
            CachedValue::Error => Some(Err(failure(source, entry))),
            _ => None,
        })
    }

    pub fn parse_compilation_unit(
        &mut self,
        source: &Source,
    ) -> Result<Arc<CompilationUnit>, EngineError> {
        self.compute(source, |entry| match &entry.parsed_unit {
            CachedValue::Valid(unit) => Some(Ok(unit.clone())),
            CachedValue::Error => Some(Err(failure(source, entry))),
            _ => None,
        })
    }

    pub fn compute_library_element(
        &mut self,
        source: &Source,
    ) -> Result<Arc<LibraryElement>, EngineError> {
        self.compute(source, |entry| {
            if matches!(entry.kind, CachedValue::Valid(kind) if kind != SourceKind::Library) {
                return Some(Err(EngineError::NotALibrary(source.to_string())));
            }
            match &entry.element {
                CachedValue::Valid(element) => Some(Ok(element.clone())),
                CachedValue::Error => Some(Err(failure(source, entry))),
                _ if matches!(entry.parsed_unit, CachedValue::Error) => {
                    Some(Err(failure(source, entry)))
                }
                _ => None,
            }
        })
    }

    /// Resolve `unit_source` as a unit of `library`.
    pub fn resolve_compilation_unit(
        &mut self,
        unit_source: &Source,
        library: &Source,
    ) -> Result<Arc<ResolvedUnit>, EngineError> {
        self.cache.ensure(library);
        self.compute(unit_source, |entry| match &entry.resolved_unit {
            CachedValue::Valid(resolved) if &resolved.library == library => {
                Some(Ok(resolved.clone()))
            }
            CachedValue::Error => Some(Err(failure(unit_source, entry))),
            _ => None,
        })
    }

    /// Every error and warning for `source`, plus hints when enabled
    pub fn compute_errors(&mut self, source: &Source) -> Result<Vec<AnalysisError>, EngineError> {
        let hint = self.options.hint;
        let errors = self.compute(source, |entry| {
            if !entry.parsed_unit.is_settled() {
                return None;
            }
            let resolved = entry.resolved_unit.is_settled();
            let hinted = !hint || entry.hints.is_settled();
            (resolved && hinted).then(|| Ok(entry.errors(hint)))
        });
        match errors {
            Err(EngineError::NotComputed(_)) => Ok(self.errors(source)),
            other => other,
        }
    }

    pub fn compute_hints(&mut self, source: &Source) -> Result<Vec<AnalysisError>, EngineError> {
        if !self.options.hint {
            return Ok(Vec::new());
        }
        let hints = self.compute(source, |entry| match &entry.hints {
            CachedValue::Valid(hints) => Some(Ok(hints.clone())),
            CachedValue::Error => Some(Ok(Vec::new())),
            _ if matches!(entry.parsed_unit, CachedValue::Error) => Some(Ok(Vec::new())),
            _ => None,
        });
        match hints {
            Err(EngineError::NotComputed(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    /// Hints of every unit of `library`, stamped with each unit's own
    /// modification time
    pub fn library_hints(
        &mut self,
        library: &Source,
    ) -> Result<HashMap<Source, TimestampedData<Vec<AnalysisError>>>, EngineError> {
        let element = self.compute_library_element(library)?;
        let mut hints = HashMap::new();
        for unit in element.units() {
            let data = self.compute_hints(&unit.source)?;
            let modification_time = self
                .cache
                .read(&unit.source, |entry| entry.modification_time)
                .unwrap_or(crate::cache::UNKNOWN_MODIFICATION_TIME);
            hints.insert(unit.source.clone(), TimestampedData::new(modification_time, data));
        }
        Ok(hints)
    }

    /// Cached errors without computing anything
    pub fn errors(&self, source: &Source) -> Vec<AnalysisError> {
        self.cache
            .read(source, |entry| entry.errors(self.options.hint))
            .unwrap_or_default()
    }

    pub fn library_element(&self, source: &Source) -> Option<Arc<LibraryElement>> {
        self.cache.read(source, |entry| entry.element.value().cloned())?
    }

    pub fn resolved_unit(&self, source: &Source) -> Option<Arc<ResolvedUnit>> {
        self.cache
            .read(source, |entry| entry.resolved_unit.value().cloned())?
    }

    pub fn line_info(&self, source: &Source) -> Option<LineInfo> {
        self.cache.read(source, |entry| entry.line_info.value().cloned())?
    }

    pub fn dependencies(&self, source: &Source) -> Option<DirectiveDependencies> {
        self.cache
            .read(source, |entry| entry.dependencies.value().cloned())?
    }

    /// Library cycles among the libraries parsed so far, dependencies first
    pub fn library_cycles(&self) -> Vec<Vec<Source>> {
        self.library_graph().cycles()
    }

    /// Loop until `read` settles for `source`. Fails if analysis completes
    /// or has to wait for content first.
    fn compute<T>(
        &mut self,
        source: &Source,
        read: impl Fn(&DartEntry) -> Option<Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        self.cache.ensure(source);
        loop {
            if let Some(result) = self.cache.read(source, &read).flatten() {
                return result;
            }
            let result = self.perform_analysis_task()?;
            if result.is_complete() {
                return Err(EngineError::NotComputed(source.to_string()));
            }
            if result.waiting {
                return Err(EngineError::ContentPending(source.to_string()));
            }
        }
    }

    /// A delivery nobody is waiting for still wins over an earlier delivery
    /// for the same source when it is newer. A change can re-request content
    /// while the first request is in flight, and the answer to the first
    /// request then fills the second.
    fn supersedes(&self, source: &Source, stamp: Option<i64>) -> bool {
        match (self.delivered.get(source), stamp) {
            (Some(accepted), Some(stamp)) => stamp > *accepted,
            _ => false,
        }
    }

    fn invalidate_content(&mut self, source: &Source) {
        if self.pending.remove(source).is_some() {
            tracing::debug!("Dropping outstanding content request for {}", source);
        }
        self.delivered.remove(source);
        self.cache
            .update(source, |entry| *entry = DartEntry::for_source(source));
        if source.uri() == sable_core::sdk::DART_CORE {
            self.type_provider = None;
        }
    }

    /// Invalidate element models, resolution and hints of every library
    /// whose dependency closure contains one of `sources`.
    fn invalidate_dependents(&mut self, graph: &LibraryGraph, sources: &BTreeSet<Source>) {
        let mut seeds: BTreeSet<Source> = sources.clone();
        for library in self.cache.sources() {
            let depends = self
                .cache
                .read(&library, |entry| {
                    entry.dependencies.value().is_some_and(|deps| {
                        sources.iter().any(|source| {
                            deps.imported.contains(source)
                                || deps.exported.contains(source)
                                || deps.included.contains(source)
                        })
                    })
                })
                .unwrap_or(false);
            if depends {
                seeds.insert(library);
            }
        }

        let closure = graph.dependents_closure(&seeds);
        for library in &closure {
            let parts = self
                .cache
                .update(library, |entry| {
                    entry.invalidate_resolution();
                    entry
                        .dependencies
                        .value()
                        .map(|deps| deps.included.clone())
                        .unwrap_or_default()
                })
                .unwrap_or_default();
            for part in &parts {
                self.cache.update(part, DartEntry::invalidate_resolution);
            }
            if library.uri() == sable_core::sdk::DART_CORE {
                self.type_provider = None;
            }
        }
        tracing::debug!(
            "Invalidated {} libraries after {} changes",
            closure.len(),
            sources.len()
        );
    }

    /// Import/export graph of every parsed library. Every library also
    /// depends on `dart:core`.
    pub(crate) fn library_graph(&self) -> LibraryGraph {
        let core = DartSdk::core_source();
        let mut graph = LibraryGraph::new();
        let mut edges = Vec::new();
        for source in self.cache.sources() {
            let dependencies = self.cache.read(&source, |entry| {
                if !entry.is_library() {
                    return None;
                }
                entry.dependencies.value().cloned()
            });
            let Some(Some(dependencies)) = dependencies else {
                continue;
            };
            graph.add_library(&source);
            for imported in &dependencies.imported {
                edges.push((source.clone(), imported.clone(), DependencyKind::Import));
            }
            for exported in &dependencies.exported {
                edges.push((source.clone(), exported.clone(), DependencyKind::Export));
            }
            if source != core {
                edges.push((source.clone(), core.clone(), DependencyKind::ImplicitCore));
            }
        }
        for (from, to, kind) in edges {
            graph.add_dependency(&from, &to, kind);
        }
        graph
    }

    fn next_task(&mut self) -> Option<AnalysisTask> {
        if let Some(cache) = self.incremental.take() {
            return Some(AnalysisTask::IncrementalAnalysis(IncrementalAnalysisTask::new(
                Some(cache),
            )));
        }
        let sources = self.cache.sources();
        for source in &sources {
            if let Some(task) = self.next_parse_task(source) {
                return Some(task);
            }
        }
        // Element models need every reachable source parsed first
        if !self.pending.is_empty() {
            return Some(AnalysisTask::WaitForAsync);
        }
        if let Some(task) = self.next_element_task() {
            return Some(task);
        }
        if let Some(task) = self.next_resolution_task(&sources) {
            return Some(task);
        }
        if self.options.hint {
            if let Some(task) = self.next_hints_task(&sources) {
                return Some(task);
            }
        }
        None
    }

    fn next_parse_task(&mut self, source: &Source) -> Option<AnalysisTask> {
        enum Step {
            Content,
            Scan(SourceContent),
            Parse(crate::task::ScanOutput),
            Dependencies(i64, Arc<CompilationUnit>),
        }
        let step = self.cache.read(source, |entry| {
            if entry.parsed_unit.needs_computation() {
                if let CachedValue::Valid(scan) = &entry.scan {
                    return Some(Step::Parse(scan.clone()));
                }
                return match &entry.content {
                    CachedValue::Invalid => Some(Step::Content),
                    CachedValue::Valid(text) => Some(Step::Scan(TimestampedData::new(
                        entry.modification_time,
                        text.clone(),
                    ))),
                    _ => None,
                };
            }
            match (&entry.parsed_unit, &entry.kind) {
                (CachedValue::Valid(unit), CachedValue::Valid(SourceKind::Library))
                    if entry.dependencies.needs_computation() =>
                {
                    Some(Step::Dependencies(entry.modification_time, unit.clone()))
                }
                _ => None,
            }
        })??;

        Some(match step {
            Step::Content => {
                self.cache
                    .update(source, |entry| entry.content = CachedValue::InProcess);
                let provider: Arc<dyn ContentProvider> = self.content.clone();
                AnalysisTask::GetContent(GetContentTask::new(source.clone(), provider))
            }
            Step::Scan(content) => AnalysisTask::ScanDart(ScanDartTask::new(
                source.clone(),
                ScanInput::Content(content),
                self.options.preserve_comments,
            )),
            Step::Parse(scanned) => AnalysisTask::ParseDart(ParseDartTask::new(
                source.clone(),
                Some(scanned),
                self.options,
            )),
            Step::Dependencies(modification_time, unit) => {
                AnalysisTask::ResolveDartDependencies(ResolveDartDependenciesTask::new(
                    source.clone(),
                    modification_time,
                    unit,
                    self.factory.clone(),
                ))
            }
        })
    }

    fn next_element_task(&self) -> Option<AnalysisTask> {
        let graph = self.library_graph();
        for cycle in graph.cycles() {
            let needs_build = cycle.iter().any(|source| {
                self.cache
                    .read(source, |entry| entry.element.needs_computation())
                    .unwrap_or(false)
            });
            if !needs_build {
                continue;
            }
            let libraries: Vec<ResolvableLibrary> = cycle
                .iter()
                .filter_map(|source| self.resolvable_library(source))
                .collect();
            let dependencies: LibraryMap = self
                .built_libraries()
                .into_iter()
                .filter(|(source, _)| !cycle.contains(source))
                .collect();
            let directives = self.directive_snapshot(&libraries);
            return Some(AnalysisTask::BuildDartElementModel(
                BuildDartElementModelTask::new(
                    cycle[0].clone(),
                    libraries,
                    Arc::new(dependencies),
                    directives,
                ),
            ));
        }
        None
    }

    fn resolvable_library(&self, source: &Source) -> Option<ResolvableLibrary> {
        let (modification_time, unit, dependencies) = self.cache.read(source, |entry| {
            Some((
                entry.modification_time,
                entry.parsed_unit.value()?.clone(),
                entry.dependencies.value()?.clone(),
            ))
        })??;
        let parts = dependencies
            .included
            .iter()
            .map(|part| {
                let (modification_time, unit) = self
                    .cache
                    .read(part, |entry| {
                        (entry.modification_time, entry.parsed_unit.value().cloned())
                    })
                    .unwrap_or((crate::cache::UNKNOWN_MODIFICATION_TIME, None));
                ResolvablePart {
                    source: part.clone(),
                    modification_time,
                    unit,
                }
            })
            .collect();
        Some(ResolvableLibrary {
            source: source.clone(),
            modification_time,
            defining_unit: unit,
            parts,
            dependencies: dependencies.libraries().into_iter().collect(),
        })
    }

    fn directive_snapshot(&self, libraries: &[ResolvableLibrary]) -> DirectiveSnapshot {
        let mut snapshot = DirectiveSnapshot::new(self.factory.clone());
        let referenced = libraries.iter().flat_map(|library| {
            library
                .dependencies
                .iter()
                .chain(library.parts.iter().map(|part| &part.source))
        });
        for source in referenced {
            let (readable, kind) = self
                .cache
                .read(source, |entry| {
                    (!matches!(entry.content, CachedValue::Error), entry.kind())
                })
                .unwrap_or((false, SourceKind::Unknown));
            snapshot.record(source.clone(), readable && self.exists(source), kind);
        }
        snapshot
    }

    fn built_libraries(&self) -> LibraryMap {
        self.cache
            .sources()
            .into_iter()
            .filter_map(|source| {
                let element = self
                    .cache
                    .read(&source, |entry| entry.element.value().cloned())??;
                Some((source, element))
            })
            .collect()
    }

    fn provider(&mut self) -> Option<Arc<TypeProvider>> {
        if let Some(provider) = &self.type_provider {
            return Some(provider.clone());
        }
        let core = self.library_element(&DartSdk::core_source())?;
        match TypeProvider::new(&core) {
            Ok(provider) => {
                let provider = Arc::new(provider);
                self.type_provider = Some(provider.clone());
                Some(provider)
            }
            Err(error) => {
                tracing::warn!("No type provider: {}", error);
                None
            }
        }
    }

    fn next_resolution_task(&mut self, sources: &[Source]) -> Option<AnalysisTask> {
        let mut libraries: Option<Arc<LibraryMap>> = None;
        for source in sources {
            let Some(library) = self.library_element(source) else {
                continue;
            };
            for unit in library.units() {
                let ready = self.cache.read(&unit.source, |entry| {
                    if !entry.resolved_unit.needs_computation() {
                        return None;
                    }
                    Some((entry.modification_time, entry.parsed_unit.value()?.clone()))
                });
                let Some(Some((modification_time, parsed))) = ready else {
                    continue;
                };
                let provider = self.provider()?;
                let libraries = libraries
                    .get_or_insert_with(|| Arc::new(self.built_libraries()))
                    .clone();
                return Some(AnalysisTask::ResolveDartUnit(ResolveDartUnitTask::new(
                    unit.source.clone(),
                    modification_time,
                    parsed,
                    library.clone(),
                    libraries,
                    provider,
                )));
            }
        }
        None
    }

    fn next_hints_task(&self, sources: &[Source]) -> Option<AnalysisTask> {
        for source in sources {
            let Some(library) = self.library_element(source) else {
                continue;
            };
            let needs_hints = self
                .cache
                .read(source, |entry| entry.hints.needs_computation())
                .unwrap_or(false);
            if !needs_hints {
                continue;
            }
            let mut units = Vec::new();
            let mut settled = true;
            for unit in library.units() {
                match self.cache.read(&unit.source, |e| e.resolved_unit.clone()) {
                    Some(CachedValue::Valid(resolved)) => units.push(resolved),
                    Some(CachedValue::Error) | None => {}
                    Some(_) => settled = false,
                }
            }
            if settled {
                return Some(AnalysisTask::GenerateDartHints(GenerateDartHintsTask::new(
                    library, units,
                )));
            }
        }
        None
    }
}

fn failure(source: &Source, entry: &DartEntry) -> EngineError {
    match &entry.exception {
        Some(exception) => EngineError::analysis(source.full_name(), exception.clone()),
        None => EngineError::NotComputed(source.to_string()),
    }
}
