//! Import and export models
//!
//! Needs every library of the cycle to exist as an element first, because
//! directives may point at each other in circles.

use std::collections::{HashMap, HashSet};

use sable_core::sdk::is_dart_ext_uri;
use sable_core::{
    CompileTimeErrorCode, ErrorCode, ErrorReporter, RecordingErrorListener, Source, SourceKind,
    StaticWarningCode,
};
use sable_parser::ast::{Combinator, CombinatorKind, CompilationUnit, Directive, StringLiteral};
use sable_parser::resolve_directive_uri;

use crate::element::{
    CycleLookup, Element, ExportElement, ImportElement, LibraryElement, LibraryMap,
    NamespaceCombinator, PrefixElement, TopLevelRef,
};
use crate::element_builder::{report_uri_error, ENTRY_POINT_NAME};
use crate::namespace::NamespaceBuilder;
use crate::resolvable::DirectiveContext;

pub struct DirectiveBuilder<'a> {
    context: &'a dyn DirectiveContext,
    known_libraries: &'a HashSet<Source>,
    core: &'a Source,
}

impl<'a> DirectiveBuilder<'a> {
    /// `known_libraries` is the library map: the cycle plus its direct dependencies.
    pub fn new(
        context: &'a dyn DirectiveContext,
        known_libraries: &'a HashSet<Source>,
        core: &'a Source,
    ) -> Self {
        Self {
            context,
            known_libraries,
            core,
        }
    }

    pub fn build_directives(
        &self,
        library: &mut LibraryElement,
        unit: &CompilationUnit,
        listener: &mut RecordingErrorListener,
    ) {
        let mut reporter = ErrorReporter::new(listener, library.source.clone());
        let mut imports = Vec::new();
        let mut exports = Vec::new();
        let mut prefixes: Vec<PrefixElement> = Vec::new();

        for directive in &unit.directives {
            match directive {
                Directive::Import(import) => {
                    if is_dart_ext_uri(&import.uri.value) {
                        library.has_ext_uri = true;
                        continue;
                    }
                    let Some(imported) = self.target(&library.source, &import.uri, &mut reporter)
                    else {
                        continue;
                    };
                    let prefix = import.prefix.as_ref().map(|prefix| {
                        if !prefixes.iter().any(|p| p.name == prefix.name) {
                            prefixes.push(PrefixElement {
                                name: prefix.name.clone(),
                                name_offset: prefix.span.offset,
                            });
                        }
                        prefix.name.clone()
                    });
                    if self.context.kind_of(&imported) != SourceKind::Library {
                        let code: ErrorCode = if import.deferred {
                            StaticWarningCode::ImportOfNonLibrary.into()
                        } else {
                            CompileTimeErrorCode::ImportOfNonLibrary.into()
                        };
                        reporter.report(
                            import.uri.span.offset,
                            import.uri.span.length,
                            code,
                            &[&import.uri.value],
                        );
                    }
                    imports.push(ImportElement {
                        offset: import.span.offset as i64,
                        uri: Some(import.uri.value.clone()),
                        uri_offset: Some(import.uri.span.offset),
                        imported_library: Some(imported),
                        prefix,
                        combinators: build_combinators(&import.combinators),
                        deferred: import.deferred,
                        synthetic: false,
                    });
                }
                Directive::Export(export) => {
                    let Some(exported) = self.target(&library.source, &export.uri, &mut reporter)
                    else {
                        continue;
                    };
                    if self.context.kind_of(&exported) != SourceKind::Library {
                        reporter.report(
                            export.uri.span.offset,
                            export.uri.span.length,
                            CompileTimeErrorCode::ExportOfNonLibrary,
                            &[&export.uri.value],
                        );
                    }
                    exports.push(ExportElement {
                        offset: export.span.offset,
                        uri: export.uri.value.clone(),
                        uri_offset: export.uri.span.offset,
                        exported_library: Some(exported),
                        combinators: build_combinators(&export.combinators),
                    });
                }
                Directive::Library(_) | Directive::PartOf(_) | Directive::Part(_) => {}
            }
        }

        let explicitly_imports_core = imports
            .iter()
            .any(|import| import.imported_library.as_ref() == Some(self.core));
        if !explicitly_imports_core && &library.source != self.core {
            imports.push(ImportElement::synthetic_core(self.core.clone()));
        }

        library.imports = imports;
        library.exports = exports;
        library.prefixes = prefixes;
    }

    /// Resolved target of a directive that names a known library
    fn target(
        &self,
        library: &Source,
        uri: &StringLiteral,
        reporter: &mut ErrorReporter<'_>,
    ) -> Option<Source> {
        let source = match resolve_directive_uri(self.context.source_factory(), library, uri) {
            Ok(source) => source,
            Err(error) => {
                report_uri_error(reporter, uri.span.offset, uri.span.length, &error);
                return None;
            }
        };
        if !self.context.exists(&source) {
            reporter.report(
                uri.span.offset,
                uri.span.length,
                CompileTimeErrorCode::UriDoesNotExist,
                &[&uri.value],
            );
            return None;
        }
        if !self.known_libraries.contains(&source) {
            tracing::trace!("{} is not in the library map of {}", source, library);
            return None;
        }
        Some(source)
    }
}

fn build_combinators(combinators: &[Combinator]) -> Vec<NamespaceCombinator> {
    combinators
        .iter()
        .map(|combinator| {
            let names = combinator.names.iter().map(|n| n.name.clone()).collect();
            match combinator.kind {
                CombinatorKind::Show => NamespaceCombinator::Show(names),
                CombinatorKind::Hide => NamespaceCombinator::Hide(names),
            }
        })
        .collect()
}

/// Set the entry point of every library in the cycle that has none yet to a
/// `main` function found in its export namespace.
pub fn compute_entry_points(
    cycle: &mut HashMap<Source, LibraryElement>,
    dependencies: &LibraryMap,
) {
    let mut entry_points = Vec::new();
    {
        let lookup = CycleLookup {
            cycle: &*cycle,
            dependencies,
        };
        let builder = NamespaceBuilder::new(&lookup);
        for (source, library) in cycle.iter() {
            if library.entry_point.is_some() {
                continue;
            }
            if let Some(Element::Function(function)) =
                builder.export_namespace(library).get(ENTRY_POINT_NAME)
            {
                entry_points.push((source.clone(), function.clone()));
            }
        }
    }
    for (source, function) in entry_points {
        if let Some(library) = cycle.get_mut(&source) {
            library.entry_point = Some(TopLevelRef {
                library: function.library,
                name: function.name,
            });
        }
    }
}
