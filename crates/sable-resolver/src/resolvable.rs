use std::sync::Arc;

use sable_core::{Source, SourceFactory, SourceKind};
use sable_parser::ast::CompilationUnit;

/// A part unit as seen by the library that includes it
#[derive(Debug, Clone)]
pub struct ResolvablePart {
    pub source: Source,
    pub modification_time: i64,
    /// `None` when the part could not be read or parsed
    pub unit: Option<Arc<CompilationUnit>>,
}

/// Everything needed to build one library of a cycle
#[derive(Debug, Clone)]
pub struct ResolvableLibrary {
    pub source: Source,
    pub modification_time: i64,
    pub defining_unit: Arc<CompilationUnit>,
    pub parts: Vec<ResolvablePart>,
    /// Imported and exported libraries
    pub dependencies: Vec<Source>,
}

impl ResolvableLibrary {
    pub fn part(&self, source: &Source) -> Option<&ResolvablePart> {
        self.parts.iter().find(|part| &part.source == source)
    }

    /// Defining unit first, then each part that has a parsed unit
    pub fn units(&self) -> impl Iterator<Item = (&Source, &Arc<CompilationUnit>)> {
        std::iter::once((&self.source, &self.defining_unit)).chain(
            self.parts
                .iter()
                .filter_map(|part| part.unit.as_ref().map(|unit| (&part.source, unit))),
        )
    }
}

/// What the builders need to know about sources outside the cycle
pub trait DirectiveContext {
    fn source_factory(&self) -> &SourceFactory;

    fn exists(&self, source: &Source) -> bool;

    fn kind_of(&self, source: &Source) -> SourceKind;
}
