//! Type hierarchies and member signatures
//!
//! Runs once every library of a cycle has its imports and exports, so type
//! names declared anywhere in the cycle are visible. Unresolvable names
//! quietly become `dynamic`; they are reported during unit resolution.

use std::collections::HashMap;

use sable_core::Source;
use sable_parser::ast::{
    ClassDeclaration, ClassMember, CompilationUnit, Declaration, FormalParameter, TypeName,
};

use crate::element::{
    ClassElement, CompilationUnitElement, CycleLookup, Element, LibraryElement, LibraryMap,
    ParameterElement,
};
use crate::resolvable::ResolvableLibrary;
use crate::scope::{LibraryScope, ScopeLookup};
use crate::type_provider::TypeProvider;
use crate::types::{DartType, InterfaceType};

/// What a type name denotes
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNameLookup {
    Type { ty: DartType, imports: Vec<usize> },
    /// The name is bound, but not to a class
    NotAType(Element),
    Ambiguous(Vec<Element>),
    Undefined,
}

pub fn lookup_type_name(scope: &LibraryScope, type_name: &TypeName) -> TypeNameLookup {
    let name = type_name.name.name.as_str();
    let lookup = match &type_name.prefix {
        Some(prefix) => scope.lookup_prefixed(&prefix.name, name),
        None => match name {
            "void" => {
                return TypeNameLookup::Type {
                    ty: DartType::Void,
                    imports: Vec::new(),
                }
            }
            _ => scope.lookup(name),
        },
    };
    match lookup {
        ScopeLookup::Found {
            element: Element::Class(class),
            imports,
        } => TypeNameLookup::Type {
            ty: DartType::interface(class),
            imports,
        },
        ScopeLookup::Found { element, .. } => TypeNameLookup::NotAType(element),
        ScopeLookup::Ambiguous(elements) => TypeNameLookup::Ambiguous(elements),
        ScopeLookup::NotFound if type_name.prefix.is_none() && name == "dynamic" => {
            TypeNameLookup::Type {
                ty: DartType::Dynamic,
                imports: Vec::new(),
            }
        }
        ScopeLookup::NotFound => TypeNameLookup::Undefined,
    }
}

/// Declared type of an optional annotation, `dynamic` when absent or broken
pub fn declared_type(scope: &LibraryScope, type_name: Option<&TypeName>) -> DartType {
    match type_name.map(|t| lookup_type_name(scope, t)) {
        Some(TypeNameLookup::Type { ty, .. }) => ty,
        _ => DartType::Dynamic,
    }
}

fn class_type(scope: &LibraryScope, type_name: &TypeName) -> Option<InterfaceType> {
    match lookup_type_name(scope, type_name) {
        TypeNameLookup::Type {
            ty: DartType::Interface(interface),
            ..
        } => Some(interface),
        _ => None,
    }
}

pub struct HierarchyResolver<'a> {
    provider: &'a TypeProvider,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(provider: &'a TypeProvider) -> Self {
        Self { provider }
    }

    /// Fill in supertypes and member signatures for every library of the cycle.
    pub fn resolve_cycle(
        &self,
        cycle: &mut HashMap<Source, LibraryElement>,
        libraries: &[ResolvableLibrary],
        dependencies: &LibraryMap,
    ) {
        let mut updates = Vec::new();
        {
            let lookup = CycleLookup {
                cycle: &*cycle,
                dependencies,
            };
            for library in libraries {
                let Some(element) = cycle.get(&library.source) else {
                    continue;
                };
                let scope = LibraryScope::new(element, &lookup);
                let mut typed = element.clone();
                for unit in typed.units_mut() {
                    if let Some(ast) = unit_ast(library, &unit.source) {
                        self.resolve_unit(&scope, unit, ast);
                    }
                }
                updates.push(typed);
            }
        }
        for library in updates {
            tracing::trace!("Resolved type hierarchy of {}", library.source);
            cycle.insert(library.source.clone(), library);
        }
    }

    fn resolve_unit(
        &self,
        scope: &LibraryScope,
        unit: &mut CompilationUnitElement,
        ast: &CompilationUnit,
    ) {
        let mut classes = unit.classes.iter_mut();
        let mut functions = unit.functions.iter_mut();
        let mut variables = unit.variables.iter_mut();
        for declaration in &ast.declarations {
            match declaration {
                Declaration::Class(class) => {
                    if let Some(element) = classes.next() {
                        self.resolve_class(scope, element, class);
                    }
                }
                Declaration::Function(function) => {
                    if let Some(element) = functions.next() {
                        element.return_type =
                            declared_type(scope, function.return_type.as_ref());
                        type_parameters(scope, &mut element.parameters, &function.parameters, &[]);
                    }
                }
                Declaration::Variables(declaration) => {
                    let ty = declared_type(scope, declaration.variables.type_name.as_ref());
                    for _ in &declaration.variables.variables {
                        if let Some(element) = variables.next() {
                            element.declared_type = ty.clone();
                        }
                    }
                }
            }
        }
    }

    fn resolve_class(
        &self,
        scope: &LibraryScope,
        element: &mut ClassElement,
        class: &ClassDeclaration,
    ) {
        let is_object = element.class_ref() == self.provider.object_type.element;
        element.supertype = if is_object {
            None
        } else {
            class
                .superclass
                .as_ref()
                .and_then(|superclass| class_type(scope, superclass))
                .or_else(|| Some(self.provider.object_type.clone()))
        };
        element.mixins = class.mixins.iter().filter_map(|t| class_type(scope, t)).collect();
        element.interfaces = class
            .interfaces
            .iter()
            .filter_map(|t| class_type(scope, t))
            .collect();

        let mut fields = element.fields.iter_mut();
        let mut methods = element.methods.iter_mut();
        let mut constructors = element.constructors.iter_mut();
        let mut field_types: Vec<(String, DartType)> = Vec::new();
        for member in &class.members {
            match member {
                ClassMember::Field(field) => {
                    let ty = declared_type(scope, field.variables.type_name.as_ref());
                    for _ in &field.variables.variables {
                        if let Some(element) = fields.next() {
                            element.declared_type = ty.clone();
                            field_types.push((element.name.clone(), ty.clone()));
                        }
                    }
                }
                ClassMember::Method(method) => {
                    if let Some(element) = methods.next() {
                        element.return_type = declared_type(scope, method.return_type.as_ref());
                        type_parameters(scope, &mut element.parameters, &method.parameters, &[]);
                    }
                }
                ClassMember::Constructor(_) => {}
            }
        }
        // Field formals take the type of their field, so constructors go last.
        for member in &class.members {
            if let ClassMember::Constructor(constructor) = member {
                if let Some(element) = constructors.next() {
                    type_parameters(
                        scope,
                        &mut element.parameters,
                        &constructor.parameters,
                        &field_types,
                    );
                }
            }
        }
    }
}

fn type_parameters(
    scope: &LibraryScope,
    elements: &mut [ParameterElement],
    parameters: &[FormalParameter],
    fields: &[(String, DartType)],
) {
    for (element, parameter) in elements.iter_mut().zip(parameters) {
        element.declared_type = match (&parameter.type_name, parameter.is_field_formal) {
            (None, true) => fields
                .iter()
                .find(|(name, _)| name == &element.name)
                .map(|(_, ty)| ty.clone())
                .unwrap_or(DartType::Dynamic),
            (type_name, _) => declared_type(scope, type_name.as_ref()),
        };
    }
}

pub(crate) fn unit_ast<'r>(
    library: &'r ResolvableLibrary,
    source: &Source,
) -> Option<&'r CompilationUnit> {
    library
        .units()
        .find(|(unit_source, _)| *unit_source == source)
        .map(|(_, unit)| unit.as_ref())
}
