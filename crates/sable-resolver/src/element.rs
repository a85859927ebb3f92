//! The element model
//!
//! Elements describe declarations independently of their syntax. A library
//! never owns the libraries it imports: imports, exports and supertypes refer
//! to other elements by [`Source`] and [`ClassRef`], and are followed through
//! a [`LibraryLookup`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sable_core::Source;
use sable_parser::ast::{NodeId, ParameterKind};

use crate::types::{DartType, InterfaceType};

/// Identity of a class: its library and its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassRef {
    pub library: Source,
    pub name: String,
}

impl ClassRef {
    pub fn new(library: &Source, name: impl Into<String>) -> Self {
        Self {
            library: library.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Identity of a top-level function or variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopLevelRef {
    pub library: Source,
    pub name: String,
}

/// Identity of a class member
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberRef {
    pub class: ClassRef,
    pub name: String,
}

/// What a name or node resolves to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    Library(Source),
    Class(ClassRef),
    Function(TopLevelRef),
    TopLevelVariable(TopLevelRef),
    Method(MemberRef),
    Field(MemberRef),
    Constructor(MemberRef),
    Parameter { name: String, declaration: NodeId },
    LocalVariable { name: String, declaration: NodeId },
    Prefix(String),
}

impl Element {
    /// Library that declares the element, for library-level elements
    pub fn library(&self) -> Option<&Source> {
        match self {
            Element::Library(source) => Some(source),
            Element::Class(class) => Some(&class.library),
            Element::Function(r) | Element::TopLevelVariable(r) => Some(&r.library),
            Element::Method(m) | Element::Field(m) | Element::Constructor(m) => {
                Some(&m.class.library)
            }
            Element::Parameter { .. } | Element::LocalVariable { .. } | Element::Prefix(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Element::Library(source) => source.short_name(),
            Element::Class(class) => &class.name,
            Element::Function(r) | Element::TopLevelVariable(r) => &r.name,
            Element::Method(m) | Element::Field(m) | Element::Constructor(m) => &m.name,
            Element::Parameter { name, .. } | Element::LocalVariable { name, .. } => name,
            Element::Prefix(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryElement {
    pub source: Source,
    /// Name from the `library` directive, empty when there is none
    pub name: String,
    pub defining_unit: CompilationUnitElement,
    pub parts: Vec<CompilationUnitElement>,
    pub imports: Vec<ImportElement>,
    pub exports: Vec<ExportElement>,
    pub prefixes: Vec<PrefixElement>,
    pub entry_point: Option<TopLevelRef>,
    /// The library imports a `dart-ext:` native extension
    pub has_ext_uri: bool,
}

impl LibraryElement {
    pub fn new(source: Source, name: impl Into<String>) -> Self {
        Self {
            defining_unit: CompilationUnitElement::new(source.clone()),
            source,
            name: name.into(),
            parts: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            prefixes: Vec::new(),
            entry_point: None,
            has_ext_uri: false,
        }
    }

    /// Defining unit first, then parts in directive order
    pub fn units(&self) -> impl Iterator<Item = &CompilationUnitElement> {
        std::iter::once(&self.defining_unit).chain(self.parts.iter())
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut CompilationUnitElement> {
        std::iter::once(&mut self.defining_unit).chain(self.parts.iter_mut())
    }

    pub fn unit(&self, source: &Source) -> Option<&CompilationUnitElement> {
        self.units().find(|unit| &unit.source == source)
    }

    pub fn class(&self, name: &str) -> Option<&ClassElement> {
        self.units()
            .flat_map(|unit| unit.classes.iter())
            .find(|class| class.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionElement> {
        self.units()
            .flat_map(|unit| unit.functions.iter())
            .find(|function| function.name == name)
    }

    pub fn top_level_variable(&self, name: &str) -> Option<&TopLevelVariableElement> {
        self.units()
            .flat_map(|unit| unit.variables.iter())
            .find(|variable| variable.name == name)
    }

    /// Libraries this library imports or exports
    pub fn referenced_libraries(&self) -> Vec<Source> {
        let mut libraries: Vec<Source> = self
            .imports
            .iter()
            .filter_map(|import| import.imported_library.clone())
            .chain(
                self.exports
                    .iter()
                    .filter_map(|export| export.exported_library.clone()),
            )
            .collect();
        libraries.sort();
        libraries.dedup();
        libraries
    }

    pub fn is_dart_core(&self) -> bool {
        self.source.uri() == sable_core::sdk::DART_CORE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnitElement {
    pub source: Source,
    pub classes: Vec<ClassElement>,
    pub functions: Vec<FunctionElement>,
    pub variables: Vec<TopLevelVariableElement>,
}

impl CompilationUnitElement {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            classes: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Top-level declarations as (name, offset, element)
    pub fn top_level_declarations(&self, library: &Source) -> Vec<(String, usize, Element)> {
        let mut declarations: Vec<(String, usize, Element)> = Vec::new();
        for class in &self.classes {
            declarations.push((
                class.name.clone(),
                class.name_offset,
                Element::Class(ClassRef::new(library, &class.name)),
            ));
        }
        for function in &self.functions {
            declarations.push((
                function.name.clone(),
                function.name_offset,
                Element::Function(TopLevelRef {
                    library: library.clone(),
                    name: function.name.clone(),
                }),
            ));
        }
        for variable in &self.variables {
            declarations.push((
                variable.name.clone(),
                variable.name_offset,
                Element::TopLevelVariable(TopLevelRef {
                    library: library.clone(),
                    name: variable.name.clone(),
                }),
            ));
        }
        declarations.sort_by_key(|(_, offset, _)| *offset);
        declarations
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassElement {
    pub name: String,
    pub name_offset: usize,
    pub library: Source,
    pub source: Source,
    pub is_abstract: bool,
    pub doc_comment: Option<String>,
    pub supertype: Option<InterfaceType>,
    pub mixins: Vec<InterfaceType>,
    pub interfaces: Vec<InterfaceType>,
    pub fields: Vec<FieldElement>,
    pub methods: Vec<MethodElement>,
    pub constructors: Vec<ConstructorElement>,
}

impl ClassElement {
    pub fn class_ref(&self) -> ClassRef {
        ClassRef::new(&self.library, &self.name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodElement> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldElement> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Unnamed constructor when `name` is empty
    pub fn constructor(&self, name: &str) -> Option<&ConstructorElement> {
        self.constructors
            .iter()
            .find(|constructor| constructor.name == name)
    }

    /// Direct supertypes: superclass, mixins, then interfaces
    pub fn direct_supertypes(&self) -> impl Iterator<Item = &InterfaceType> {
        self.supertype
            .iter()
            .chain(self.mixins.iter())
            .chain(self.interfaces.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldElement {
    pub name: String,
    pub name_offset: usize,
    pub is_static: bool,
    pub is_final: bool,
    pub is_const: bool,
    pub declared_type: DartType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodElement {
    pub name: String,
    pub name_offset: usize,
    pub is_static: bool,
    pub is_abstract: bool,
    pub return_type: DartType,
    pub parameters: Vec<ParameterElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorElement {
    /// Empty for the unnamed constructor
    pub name: String,
    pub name_offset: usize,
    pub is_const: bool,
    pub parameters: Vec<ParameterElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionElement {
    pub name: String,
    pub name_offset: usize,
    pub source: Source,
    pub return_type: DartType,
    pub parameters: Vec<ParameterElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopLevelVariableElement {
    pub name: String,
    pub name_offset: usize,
    pub source: Source,
    pub is_final: bool,
    pub is_const: bool,
    pub declared_type: DartType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterElement {
    pub name: String,
    pub name_offset: usize,
    pub kind: ParameterKind,
    pub declared_type: DartType,
    pub is_field_formal: bool,
}

/// Counts of required and optional positional parameters
pub fn parameter_arity(parameters: &[ParameterElement]) -> (usize, usize) {
    let required = parameters
        .iter()
        .filter(|p| p.kind == ParameterKind::Required)
        .count();
    (required, parameters.len())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceCombinator {
    Show(Vec<String>),
    Hide(Vec<String>),
}

impl NamespaceCombinator {
    pub fn allows(&self, name: &str) -> bool {
        match self {
            NamespaceCombinator::Show(names) => names.iter().any(|n| n == name),
            NamespaceCombinator::Hide(names) => !names.iter().any(|n| n == name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportElement {
    /// Offset of the directive, -1 for the synthetic `dart:core` import
    pub offset: i64,
    pub uri: Option<String>,
    pub uri_offset: Option<usize>,
    pub imported_library: Option<Source>,
    pub prefix: Option<String>,
    pub combinators: Vec<NamespaceCombinator>,
    pub deferred: bool,
    pub synthetic: bool,
}

impl ImportElement {
    pub fn synthetic_core(core: Source) -> Self {
        Self {
            offset: -1,
            uri: None,
            uri_offset: None,
            imported_library: Some(core),
            prefix: None,
            combinators: Vec::new(),
            deferred: false,
            synthetic: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportElement {
    pub offset: usize,
    pub uri: String,
    pub uri_offset: usize,
    pub exported_library: Option<Source>,
    pub combinators: Vec<NamespaceCombinator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixElement {
    pub name: String,
    pub name_offset: usize,
}

/// Access to built library elements by source
pub trait LibraryLookup {
    fn library(&self, source: &Source) -> Option<&LibraryElement>;

    fn class(&self, class: &ClassRef) -> Option<&ClassElement> {
        self.library(&class.library)?.class(&class.name)
    }

    fn function(&self, function: &TopLevelRef) -> Option<&FunctionElement> {
        self.library(&function.library)?.function(&function.name)
    }

    fn top_level_variable(&self, variable: &TopLevelRef) -> Option<&TopLevelVariableElement> {
        self.library(&variable.library)?
            .top_level_variable(&variable.name)
    }
}

pub type LibraryMap = HashMap<Source, Arc<LibraryElement>>;

impl LibraryLookup for LibraryMap {
    fn library(&self, source: &Source) -> Option<&LibraryElement> {
        self.get(source).map(|library| library.as_ref())
    }
}

/// Libraries of a cycle under construction layered over already built ones
pub struct CycleLookup<'a> {
    pub cycle: &'a HashMap<Source, LibraryElement>,
    pub dependencies: &'a LibraryMap,
}

impl LibraryLookup for CycleLookup<'_> {
    fn library(&self, source: &Source) -> Option<&LibraryElement> {
        self.cycle
            .get(source)
            .or_else(|| self.dependencies.library(source))
    }
}
