//! Dependency extraction from parsed directives
//!
//! Pure functions over a parsed unit. Unresolvable URIs are dropped here;
//! they are reported later, when directive models are built.

use std::collections::BTreeSet;

use sable_core::factory::is_valid_uri;
use sable_core::{Source, SourceFactory};

use crate::ast::{CompilationUnit, Directive, StringLiteral};
use crate::error::ParserError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveDependencies {
    pub exported: BTreeSet<Source>,
    pub imported: BTreeSet<Source>,
    pub included: BTreeSet<Source>,
}

impl DirectiveDependencies {
    /// Imported and exported libraries together
    pub fn libraries(&self) -> BTreeSet<Source> {
        self.imported.union(&self.exported).cloned().collect()
    }
}

/// Resolve a directive URI against the library that contains it.
pub fn resolve_directive_uri(
    factory: &SourceFactory,
    library_source: &Source,
    uri: &StringLiteral,
) -> Result<Source, ParserError> {
    if uri.interpolated {
        return Err(ParserError::UriWithInterpolation(uri.lexeme.clone()));
    }
    let content = uri.value.trim();
    if content.is_empty() || !is_valid_uri(content) {
        return Err(ParserError::InvalidUri(uri.value.clone()));
    }
    factory
        .resolve_uri(library_source, content)
        .ok_or_else(|| ParserError::UriDoesNotExist(uri.value.clone()))
}

pub fn extract_dependencies(
    factory: &SourceFactory,
    library_source: &Source,
    unit: &CompilationUnit,
) -> DirectiveDependencies {
    let mut dependencies = DirectiveDependencies::default();
    for directive in &unit.directives {
        let (uri, target) = match directive {
            Directive::Import(import) => (&import.uri, &mut dependencies.imported),
            Directive::Export(export) => (&export.uri, &mut dependencies.exported),
            Directive::Part(part) => (&part.uri, &mut dependencies.included),
            Directive::Library(_) | Directive::PartOf(_) => continue,
        };
        match resolve_directive_uri(factory, library_source, uri) {
            Ok(source) => {
                target.insert(source);
            }
            Err(error) => {
                tracing::trace!("Dropping dependency of {}: {}", library_source, error);
            }
        }
    }
    dependencies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;
    use sable_core::AnalysisOptions;

    fn dependencies(text: &str) -> DirectiveDependencies {
        let source = Source::new("file:///proj/a.dart");
        let parsed = parse_source(&source, text, &AnalysisOptions::default());
        extract_dependencies(&SourceFactory::default(), &source, &parsed.unit)
    }

    #[test]
    fn test_sets_collapse_duplicates() {
        let deps = dependencies("import 'b.dart'; import 'b.dart' as b; export 'c.dart';");
        assert_eq!(deps.imported.len(), 1);
        assert_eq!(deps.exported.len(), 1);
        assert!(deps.included.is_empty());
        assert_eq!(deps.libraries().len(), 2);
    }

    #[test]
    fn test_interpolated_and_invalid_uris_dropped() {
        let deps = dependencies(
            "import '$x.dart'; import 'http://[::1'; import 'dart:nope'; import 'ok.dart';",
        );
        let imported: Vec<_> = deps.imported.iter().map(|s| s.uri().to_string()).collect();
        assert_eq!(imported, vec!["file:///proj/ok.dart"]);
    }

    #[test]
    fn test_resolve_directive_uri_classifies_failures() {
        let source = Source::new("file:///proj/a.dart");
        let parsed = parse_source(
            &source,
            "import '$x.dart'; import 'http://[::1'; import 'dart:nope';",
            &AnalysisOptions::default(),
        );
        let factory = SourceFactory::default();
        let results: Vec<_> = parsed
            .unit
            .imports()
            .map(|import| resolve_directive_uri(&factory, &source, &import.uri))
            .collect();
        assert!(matches!(results[0], Err(ParserError::UriWithInterpolation(_))));
        assert!(matches!(results[1], Err(ParserError::InvalidUri(_))));
        assert!(matches!(results[2], Err(ParserError::UriDoesNotExist(_))));
    }
}
