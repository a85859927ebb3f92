//! Name lookup at library level

use std::collections::{BTreeSet, HashMap};

use crate::element::{Element, LibraryElement, LibraryLookup};
use crate::namespace::{Namespace, NamespaceBuilder};

/// Outcome of looking a name up in a [`LibraryScope`]
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeLookup {
    /// `imports` holds the indices of the imports that supplied the element
    Found {
        element: Element,
        imports: Vec<usize>,
    },
    /// Several imports define the name and none of them is `dart:core`
    Ambiguous(Vec<Element>),
    NotFound,
}

impl ScopeLookup {
    pub fn element(&self) -> Option<&Element> {
        match self {
            ScopeLookup::Found { element, .. } => Some(element),
            _ => None,
        }
    }
}

struct ImportedNames {
    index: usize,
    prefix: Option<String>,
    from_core: bool,
    namespace: Namespace,
}

/// Top-level names of a library (all units, private names included) layered
/// over the namespaces of its imports.
pub struct LibraryScope {
    locals: HashMap<String, Element>,
    prefixes: BTreeSet<String>,
    imports: Vec<ImportedNames>,
}

impl LibraryScope {
    pub fn new(library: &LibraryElement, lookup: &dyn LibraryLookup) -> Self {
        let mut locals = HashMap::new();
        for unit in library.units() {
            for (name, _, element) in unit.top_level_declarations(&library.source) {
                if !name.is_empty() {
                    locals.entry(name).or_insert(element);
                }
            }
        }

        let builder = NamespaceBuilder::new(lookup);
        let imports = library
            .imports
            .iter()
            .enumerate()
            .map(|(index, import)| ImportedNames {
                index,
                prefix: import.prefix.clone(),
                from_core: import
                    .imported_library
                    .as_ref()
                    .is_some_and(|source| source.uri() == sable_core::sdk::DART_CORE),
                namespace: builder.import_namespace(import),
            })
            .collect();

        Self {
            locals,
            prefixes: library.prefixes.iter().map(|p| p.name.clone()).collect(),
            imports,
        }
    }

    pub fn is_prefix(&self, name: &str) -> bool {
        !self.locals.contains_key(name) && self.prefixes.contains(name)
    }

    pub fn lookup(&self, name: &str) -> ScopeLookup {
        if let Some(element) = self.locals.get(name) {
            return ScopeLookup::Found {
                element: element.clone(),
                imports: Vec::new(),
            };
        }
        if self.prefixes.contains(name) {
            return ScopeLookup::Found {
                element: Element::Prefix(name.to_string()),
                imports: Vec::new(),
            };
        }
        self.lookup_imported(None, name)
    }

    /// `prefix.name`
    pub fn lookup_prefixed(&self, prefix: &str, name: &str) -> ScopeLookup {
        self.lookup_imported(Some(prefix), name)
    }

    fn lookup_imported(&self, prefix: Option<&str>, name: &str) -> ScopeLookup {
        let mut candidates: Vec<(&ImportedNames, &Element)> = self
            .imports
            .iter()
            .filter(|import| import.prefix.as_deref() == prefix)
            .filter_map(|import| import.namespace.get(name).map(|element| (import, element)))
            .collect();

        if distinct(&candidates).len() > 1 {
            candidates.retain(|(import, _)| !import.from_core);
        }
        let elements = distinct(&candidates);
        match elements.len() {
            0 => ScopeLookup::NotFound,
            1 => ScopeLookup::Found {
                element: elements[0].clone(),
                imports: candidates.iter().map(|(import, _)| import.index).collect(),
            },
            _ => ScopeLookup::Ambiguous(elements),
        }
    }
}

fn distinct(candidates: &[(&ImportedNames, &Element)]) -> Vec<Element> {
    let mut elements: Vec<Element> = Vec::new();
    for (_, element) in candidates {
        if !elements.contains(element) {
            elements.push((*element).clone());
        }
    }
    elements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ClassElement, ClassRef, ImportElement, LibraryMap, PrefixElement};
    use pretty_assertions::assert_eq;
    use sable_core::Source;
    use std::sync::Arc;

    fn library_with_classes(uri: &str, classes: &[&str]) -> LibraryElement {
        let source = Source::new(uri);
        let mut library = LibraryElement::new(source.clone(), "");
        for name in classes {
            library.defining_unit.classes.push(ClassElement {
                name: name.to_string(),
                name_offset: 0,
                library: source.clone(),
                source: source.clone(),
                is_abstract: false,
                doc_comment: None,
                supertype: None,
                mixins: Vec::new(),
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                constructors: Vec::new(),
            });
        }
        library
    }

    fn import(of: &LibraryElement, prefix: Option<&str>) -> ImportElement {
        ImportElement {
            offset: 0,
            uri: Some(of.source.uri().to_string()),
            uri_offset: Some(0),
            imported_library: Some(of.source.clone()),
            prefix: prefix.map(str::to_string),
            combinators: Vec::new(),
            deferred: false,
            synthetic: false,
        }
    }

    fn setup() -> (LibraryMap, LibraryElement) {
        let core = library_with_classes("dart:core", &["Object", "String"]);
        let a = library_with_classes("file:///a.dart", &["A", "String"]);
        let b = library_with_classes("file:///b.dart", &["A", "B"]);

        let mut main = library_with_classes("file:///main.dart", &["Local"]);
        main.imports.push(import(&a, None));
        main.imports.push(import(&b, None));
        main.imports.push(import(&b, Some("p")));
        main.imports.push(ImportElement::synthetic_core(core.source.clone()));
        main.prefixes.push(PrefixElement {
            name: "p".into(),
            name_offset: 0,
        });

        let mut map = LibraryMap::new();
        for library in [core, a, b] {
            map.insert(library.source.clone(), Arc::new(library));
        }
        (map, main)
    }

    #[test]
    fn test_core_loses_conflicts() {
        let (map, main) = setup();
        let scope = LibraryScope::new(&main, &map);
        assert_eq!(
            scope.lookup("String"),
            ScopeLookup::Found {
                element: Element::Class(ClassRef::new(&Source::new("file:///a.dart"), "String")),
                imports: vec![0],
            }
        );
        assert!(matches!(scope.lookup("Object"), ScopeLookup::Found { .. }));
    }

    #[test]
    fn test_conflicting_imports_are_ambiguous() {
        let (map, main) = setup();
        let scope = LibraryScope::new(&main, &map);
        assert!(matches!(scope.lookup("A"), ScopeLookup::Ambiguous(ref e) if e.len() == 2));
    }

    #[test]
    fn test_prefixed_and_local_lookup() {
        let (map, main) = setup();
        let scope = LibraryScope::new(&main, &map);
        assert!(scope.is_prefix("p"));
        assert_eq!(scope.lookup("p").element(), Some(&Element::Prefix("p".into())));
        assert_eq!(
            scope.lookup_prefixed("p", "A").element(),
            Some(&Element::Class(ClassRef::new(&Source::new("file:///b.dart"), "A")))
        );
        assert_eq!(scope.lookup_prefixed("p", "String"), ScopeLookup::NotFound);
        assert!(matches!(
            scope.lookup("Local"),
            ScopeLookup::Found { ref imports, .. } if imports.is_empty()
        ));
        assert_eq!(scope.lookup("Missing"), ScopeLookup::NotFound);
    }
}
