use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sable_core::{
    AnalysisError, AnalysisException, DartSdk, RecordingErrorListener, Source, SourceFactory,
    SourceKind,
};
use sable_resolver::{
    compute_entry_points, DirectiveBuilder, DirectiveContext, HierarchyResolver, LibraryElement,
    LibraryElementBuilder, LibraryMap, ResolvableLibrary, ResolverError, TypeProvider,
};

use super::{guarded, Outcome};

/// What the element builders may ask about sources outside the cycle,
/// captured when the task is created
#[derive(Clone)]
pub struct DirectiveSnapshot {
    factory: Arc<SourceFactory>,
    existing: HashSet<Source>,
    kinds: HashMap<Source, SourceKind>,
}

impl DirectiveSnapshot {
    pub fn new(factory: Arc<SourceFactory>) -> Self {
        Self {
            factory,
            existing: HashSet::new(),
            kinds: HashMap::new(),
        }
    }

    pub fn record(&mut self, source: Source, exists: bool, kind: SourceKind) {
        if exists {
            self.existing.insert(source.clone());
        }
        self.kinds.insert(source, kind);
    }
}

impl DirectiveContext for DirectiveSnapshot {
    fn source_factory(&self) -> &SourceFactory {
        &self.factory
    }

    fn exists(&self, source: &Source) -> bool {
        self.existing.contains(source)
    }

    fn kind_of(&self, source: &Source) -> SourceKind {
        self.kinds.get(source).copied().unwrap_or(SourceKind::Unknown)
    }
}

/// Element models of every library of a cycle
#[derive(Debug, Clone)]
pub struct ElementModel {
    pub libraries: HashMap<Source, Arc<LibraryElement>>,
    /// Errors reported while building, by the source they were reported against
    pub errors: HashMap<Source, Vec<AnalysisError>>,
    /// Modification time of every library and part the models were built from
    pub modification_times: HashMap<Source, i64>,
}

/// Build the element models of one library cycle.
///
/// The passes run in a fixed order, each over the whole cycle: collect the
/// known libraries, build bare elements, wire up directives and entry
/// points, then resolve type hierarchies. Without a `dart:core` element the
/// whole cycle fails.
pub struct BuildDartElementModelTask {
    target: Source,
    libraries: Vec<ResolvableLibrary>,
    dependencies: Arc<LibraryMap>,
    directives: DirectiveSnapshot,
    outcome: Outcome<ElementModel>,
}

impl BuildDartElementModelTask {
    /// `libraries` is the cycle containing `target`; `dependencies` holds the
    /// already built libraries outside it.
    pub fn new(
        target: Source,
        libraries: Vec<ResolvableLibrary>,
        dependencies: Arc<LibraryMap>,
        directives: DirectiveSnapshot,
    ) -> Self {
        Self {
            target,
            libraries,
            dependencies,
            directives,
            outcome: Outcome::NotPerformed,
        }
    }

    pub fn target(&self) -> &Source {
        &self.target
    }

    pub fn libraries(&self) -> &[ResolvableLibrary] {
        &self.libraries
    }

    pub fn element_model(&self) -> Option<&ElementModel> {
        self.outcome.output()
    }

    pub fn library_element(&self, source: &Source) -> Option<&Arc<LibraryElement>> {
        self.element_model()?.libraries.get(source)
    }

    pub fn exception(&self) -> Option<&AnalysisException> {
        self.outcome.exception()
    }

    pub fn description(&self) -> String {
        format!(
            "building the element model for {} ({} libraries)",
            self.target.full_name(),
            self.libraries.len()
        )
    }

    pub(crate) fn perform_body(&mut self) {
        self.outcome = guarded(|| self.description(), || self.internal_perform()).into();
    }

    #[tracing::instrument(skip_all, fields(target = %self.target))]
    fn internal_perform(&self) -> anyhow::Result<ElementModel> {
        let core = DartSdk::core_source();
        let core_in_cycle = self.libraries.iter().any(|library| library.source == core);
        if !core_in_cycle && !self.dependencies.contains_key(&core) {
            return Err(AnalysisException::with_cause(
                format!("Cannot build the element model for {}", self.target),
                ResolverError::CoreNotResolved,
            )
            .into());
        }

        let known = self.library_map();
        let mut listener = RecordingErrorListener::new();

        let mut elements = HashMap::new();
        for library in &self.libraries {
            let element =
                LibraryElementBuilder::new(&self.directives, &mut listener).build_library(library);
            elements.insert(library.source.clone(), element);
        }

        let directives = DirectiveBuilder::new(&self.directives, &known, &core);
        for library in &self.libraries {
            if let Some(element) = elements.get_mut(&library.source) {
                directives.build_directives(element, &library.defining_unit, &mut listener);
            }
        }
        compute_entry_points(&mut elements, &self.dependencies);

        let core_element = elements
            .get(&core)
            .or_else(|| self.dependencies.get(&core).map(|core| core.as_ref()))
            .ok_or(ResolverError::CoreNotResolved)?;
        let provider = TypeProvider::new(core_element)?;
        HierarchyResolver::new(&provider).resolve_cycle(
            &mut elements,
            &self.libraries,
            &self.dependencies,
        );

        let mut modification_times = HashMap::new();
        for library in &self.libraries {
            modification_times.insert(library.source.clone(), library.modification_time);
            for part in &library.parts {
                modification_times.insert(part.source.clone(), part.modification_time);
            }
        }
        tracing::debug!(
            "Built {} library elements with {} errors",
            elements.len(),
            listener.errors().len()
        );
        Ok(ElementModel {
            libraries: elements
                .into_iter()
                .map(|(source, element)| (source, Arc::new(element)))
                .collect(),
            errors: listener.errors_by_source(),
            modification_times,
        })
    }

    /// Every library a directive in the cycle may refer to: the cycle
    /// itself, the libraries already built, and each direct dependency that
    /// exists.
    fn library_map(&self) -> HashSet<Source> {
        let mut known: HashSet<Source> = self.dependencies.keys().cloned().collect();
        for library in &self.libraries {
            known.insert(library.source.clone());
            known.extend(
                library
                    .dependencies
                    .iter()
                    .filter(|dependency| self.directives.exists(dependency))
                    .cloned(),
            );
        }
        known
    }

    pub(crate) fn into_outcome(self) -> Outcome<ElementModel> {
        self.outcome
    }
}
