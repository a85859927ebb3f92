//! Builds and resolves small library graphs without the engine

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sable_core::{
    AnalysisError, AnalysisOptions, DartSdk, ErrorCode, RecordingErrorListener, Source,
    SourceFactory, SourceKind,
};
use sable_parser::ast::CompilationUnit;
use sable_parser::{extract_dependencies, parse_source};
use sable_resolver::{
    compute_entry_points, resolve_unit, DirectiveBuilder, DirectiveContext, HierarchyResolver,
    HintGenerator, LibraryElement, LibraryElementBuilder, LibraryMap, ResolvableLibrary,
    ResolvablePart, ResolvedUnit, TypeProvider, UnitContext,
};

pub struct Workspace {
    factory: SourceFactory,
    sdk: Arc<DartSdk>,
    files: HashMap<Source, String>,
}

impl DirectiveContext for Workspace {
    fn source_factory(&self) -> &SourceFactory {
        &self.factory
    }

    fn exists(&self, source: &Source) -> bool {
        self.contents(source).is_some()
    }

    fn kind_of(&self, source: &Source) -> SourceKind {
        match self.parse(source) {
            Some(unit) if unit.has_part_of_directive() => SourceKind::Part,
            Some(_) => SourceKind::Library,
            None => SourceKind::Unknown,
        }
    }
}

/// Everything produced for a library graph
pub struct Analysis {
    pub libraries: LibraryMap,
    pub units: HashMap<Source, Arc<ResolvedUnit>>,
    pub errors: Vec<AnalysisError>,
    pub hints: Vec<AnalysisError>,
}

impl Analysis {
    pub fn library(&self, uri: &str) -> &LibraryElement {
        &self.libraries[&Source::new(uri)]
    }

    pub fn unit(&self, uri: &str) -> &ResolvedUnit {
        &self.units[&Source::new(uri)]
    }

    /// Error codes reported against `uri`, in reporting order
    pub fn codes(&self, uri: &str) -> Vec<&'static str> {
        codes_for(&self.errors, uri)
    }

    pub fn hint_codes(&self, uri: &str) -> Vec<&'static str> {
        codes_for(&self.hints, uri)
    }

    pub fn errors_for(&self, uri: &str) -> Vec<&AnalysisError> {
        let source = Source::new(uri);
        self.errors.iter().filter(|e| e.source == source).collect()
    }
}

fn codes_for(errors: &[AnalysisError], uri: &str) -> Vec<&'static str> {
    let source = Source::new(uri);
    errors
        .iter()
        .filter(|e| e.source == source)
        .map(|e| ErrorCode::name(&e.code))
        .collect()
}

impl Workspace {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            factory: SourceFactory::default(),
            sdk: Arc::new(DartSdk::embedded()),
            files: files
                .iter()
                .map(|(uri, text)| (Source::new(uri), text.to_string()))
                .collect(),
        }
    }

    fn contents(&self, source: &Source) -> Option<String> {
        self.files
            .get(source)
            .cloned()
            .or_else(|| self.sdk.contents(source).map(|text| text.to_string()))
    }

    fn parse(&self, source: &Source) -> Option<Arc<CompilationUnit>> {
        let text = self.contents(source)?;
        Some(Arc::new(
            parse_source(source, &text, &AnalysisOptions::default()).unit,
        ))
    }

    fn resolvable(&self, source: &Source) -> Option<ResolvableLibrary> {
        let unit = self.parse(source)?;
        let dependencies = extract_dependencies(&self.factory, source, &unit);
        let parts = dependencies
            .included
            .iter()
            .map(|part| ResolvablePart {
                source: part.clone(),
                modification_time: 1,
                unit: self.parse(part),
            })
            .collect();
        Some(ResolvableLibrary {
            source: source.clone(),
            modification_time: 1,
            defining_unit: unit,
            parts,
            dependencies: dependencies.libraries().into_iter().collect(),
        })
    }

    /// Build and resolve `dart:core` and then every library in `cycles`,
    /// each inner slice being one cycle built after the ones before it.
    pub fn analyze(&self, cycles: &[&[&str]]) -> Analysis {
        let mut listener = RecordingErrorListener::new();
        let mut libraries = LibraryMap::new();
        let mut all_cycles: Vec<Vec<Source>> = vec![vec![DartSdk::core_source()]];
        all_cycles.extend(
            cycles
                .iter()
                .map(|cycle| cycle.iter().map(Source::new).collect()),
        );

        let mut resolvables = Vec::new();
        for cycle in &all_cycles {
            let cycle_libraries: Vec<ResolvableLibrary> =
                cycle.iter().filter_map(|s| self.resolvable(s)).collect();
            self.build_cycle(&cycle_libraries, &mut libraries, &mut listener);
            resolvables.extend(cycle_libraries);
        }

        let core = libraries[&DartSdk::core_source()].clone();
        let provider = TypeProvider::new(&core).expect("core types");
        let mut units = HashMap::new();
        let mut hints = Vec::new();
        for library in &resolvables {
            let element = libraries[&library.source].clone();
            let mut resolved = Vec::new();
            for (source, unit) in library.units() {
                let context = UnitContext::new(source, &element, &libraries, &provider)
                    .expect("unit belongs to its library");
                let unit = Arc::new(resolve_unit(&context, 1, unit.clone(), &mut listener));
                units.insert(source.clone(), unit.clone());
                resolved.push(unit);
            }
            for (_, data) in HintGenerator::new(&element, &resolved).generate() {
                hints.extend(data.data);
            }
        }

        Analysis {
            libraries,
            units,
            errors: listener.into_errors(),
            hints,
        }
    }

    fn build_cycle(
        &self,
        cycle: &[ResolvableLibrary],
        libraries: &mut LibraryMap,
        listener: &mut RecordingErrorListener,
    ) {
        let mut known: HashSet<Source> = libraries.keys().cloned().collect();
        known.extend(cycle.iter().map(|library| library.source.clone()));

        let mut elements = HashMap::new();
        for library in cycle {
            let element = LibraryElementBuilder::new(self, listener).build_library(library);
            elements.insert(library.source.clone(), element);
        }
        let core = DartSdk::core_source();
        let directives = DirectiveBuilder::new(self, &known, &core);
        for library in cycle {
            if let Some(element) = elements.get_mut(&library.source) {
                directives.build_directives(element, &library.defining_unit, listener);
            }
        }
        compute_entry_points(&mut elements, libraries);

        let core_element = elements
            .get(&core)
            .cloned()
            .or_else(|| libraries.get(&core).map(|core| core.as_ref().clone()))
            .expect("dart:core is built first");
        let provider = TypeProvider::new(&core_element).expect("core types");
        HierarchyResolver::new(&provider).resolve_cycle(&mut elements, cycle, libraries);

        for (source, element) in elements {
            libraries.insert(source, Arc::new(element));
        }
    }
}
