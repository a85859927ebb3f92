//! Namespaces: the names a library defines, exports and imports

use std::collections::{BTreeMap, HashSet};

use sable_core::Source;

use crate::element::{
    Element, ImportElement, LibraryElement, LibraryLookup, NamespaceCombinator,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    definitions: BTreeMap<String, Element>,
}

impl Namespace {
    pub fn get(&self, name: &str) -> Option<&Element> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Element)> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Keeps the first definition of a name
    fn define(&mut self, name: &str, element: Element) {
        self.definitions
            .entry(name.to_string())
            .or_insert(element);
    }

    fn filtered(mut self, combinators: &[NamespaceCombinator]) -> Self {
        self.definitions
            .retain(|name, _| combinators.iter().all(|combinator| combinator.allows(name)));
        self
    }
}

pub struct NamespaceBuilder<'a> {
    lookup: &'a dyn LibraryLookup,
}

impl<'a> NamespaceBuilder<'a> {
    pub fn new(lookup: &'a dyn LibraryLookup) -> Self {
        Self { lookup }
    }

    /// Public top-level declarations of every unit of the library
    pub fn public_namespace(&self, library: &LibraryElement) -> Namespace {
        let mut namespace = Namespace::default();
        for unit in library.units() {
            for (name, _, element) in unit.top_level_declarations(&library.source) {
                if !name.is_empty() && !name.starts_with('_') {
                    namespace.define(&name, element);
                }
            }
        }
        namespace
    }

    /// Public namespace plus everything re-exported, transitively
    pub fn export_namespace(&self, library: &LibraryElement) -> Namespace {
        let mut visited = HashSet::new();
        self.export_namespace_visiting(library, &mut visited)
    }

    fn export_namespace_visiting(
        &self,
        library: &LibraryElement,
        visited: &mut HashSet<Source>,
    ) -> Namespace {
        if !visited.insert(library.source.clone()) {
            return Namespace::default();
        }
        let mut namespace = self.public_namespace(library);
        for export in &library.exports {
            let Some(exported) = export
                .exported_library
                .as_ref()
                .and_then(|source| self.lookup.library(source))
            else {
                continue;
            };
            let exported_names = self
                .export_namespace_visiting(exported, visited)
                .filtered(&export.combinators);
            for (name, element) in exported_names.definitions {
                namespace.define(&name, element);
            }
        }
        namespace
    }

    /// Names an import makes visible, before any prefix is applied
    pub fn import_namespace(&self, import: &ImportElement) -> Namespace {
        import
            .imported_library
            .as_ref()
            .and_then(|source| self.lookup.library(source))
            .map(|library| {
                self.export_namespace(library)
                    .filtered(&import.combinators)
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ExportElement, FunctionElement, LibraryMap};
    use crate::types::DartType;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn library(uri: &str, functions: &[&str]) -> LibraryElement {
        let source = Source::new(uri);
        let mut library = LibraryElement::new(source.clone(), "");
        for (offset, name) in functions.iter().enumerate() {
            library.defining_unit.functions.push(FunctionElement {
                name: name.to_string(),
                name_offset: offset,
                source: source.clone(),
                return_type: DartType::Dynamic,
                parameters: Vec::new(),
            });
        }
        library
    }

    fn export(of: &LibraryElement, combinators: Vec<NamespaceCombinator>) -> ExportElement {
        ExportElement {
            offset: 0,
            uri: of.source.uri().to_string(),
            uri_offset: 0,
            exported_library: Some(of.source.clone()),
            combinators,
        }
    }

    #[test]
    fn test_private_names_are_not_public() {
        let lib = library("file:///a.dart", &["f", "_g"]);
        let map = LibraryMap::new();
        let names: Vec<_> = NamespaceBuilder::new(&map)
            .public_namespace(&lib)
            .names()
            .map(str::to_string)
            .collect();
        assert_eq!(names, vec!["f"]);
    }

    #[test]
    fn test_export_cycle_terminates_with_combinators() {
        let mut a = library("file:///a.dart", &["a1", "a2"]);
        let mut b = library("file:///b.dart", &["b1"]);
        a.exports.push(export(&b, vec![]));
        b.exports
            .push(export(&a, vec![NamespaceCombinator::Hide(vec!["a2".into()])]));

        let mut map = LibraryMap::new();
        map.insert(a.source.clone(), Arc::new(a.clone()));
        map.insert(b.source.clone(), Arc::new(b.clone()));

        let builder = NamespaceBuilder::new(&map);
        let from_b: Vec<_> = builder.export_namespace(&b).names().map(str::to_string).collect();
        assert_eq!(from_b, vec!["a1", "b1"]);

        let from_a: Vec<_> = builder.export_namespace(&a).names().map(str::to_string).collect();
        assert_eq!(from_a, vec!["a1", "a2", "b1"]);
    }
}
