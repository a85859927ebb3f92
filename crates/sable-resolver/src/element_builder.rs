//! Bare element models
//!
//! Builds the library and unit elements of one library from syntax alone.
//! Types are left `dynamic` here and filled in once the hierarchy pass can
//! see every library of the cycle.

use sable_core::{
    CompileTimeErrorCode, ErrorReporter, RecordingErrorListener, Source, StaticWarningCode,
};
use sable_parser::ast::{
    ClassDeclaration, ClassMember, CompilationUnit, Declaration, FormalParameter, PartOfTarget,
};
use sable_parser::{resolve_directive_uri, ParserError};

use crate::element::{
    ClassElement, CompilationUnitElement, ConstructorElement, FieldElement,
    FunctionElement, LibraryElement, MethodElement, ParameterElement, TopLevelRef,
    TopLevelVariableElement,
};
use crate::resolvable::{DirectiveContext, ResolvableLibrary};
use crate::types::DartType;

pub const ENTRY_POINT_NAME: &str = "main";

/// Unit element mirroring the declarations of `unit`, in source order
pub fn build_unit_element(
    unit_source: &Source,
    library_source: &Source,
    unit: &CompilationUnit,
) -> CompilationUnitElement {
    let mut element = CompilationUnitElement::new(unit_source.clone());
    for declaration in &unit.declarations {
        match declaration {
            Declaration::Class(class) => element
                .classes
                .push(build_class(class, unit_source, library_source)),
            Declaration::Function(function) => element.functions.push(FunctionElement {
                name: function.name.name.clone(),
                name_offset: function.name.span.offset,
                source: unit_source.clone(),
                return_type: DartType::Dynamic,
                parameters: build_parameters(&function.parameters),
            }),
            Declaration::Variables(variables) => {
                for variable in &variables.variables.variables {
                    element.variables.push(TopLevelVariableElement {
                        name: variable.name.name.clone(),
                        name_offset: variable.name.span.offset,
                        source: unit_source.clone(),
                        is_final: variables.variables.is_final(),
                        is_const: variables.variables.is_const(),
                        declared_type: DartType::Dynamic,
                    });
                }
            }
        }
    }
    element
}

fn build_class(class: &ClassDeclaration, unit_source: &Source, library: &Source) -> ClassElement {
    let mut element = ClassElement {
        name: class.name.name.clone(),
        name_offset: class.name.span.offset,
        library: library.clone(),
        source: unit_source.clone(),
        is_abstract: class.is_abstract,
        doc_comment: class.doc_comment.clone(),
        supertype: None,
        mixins: Vec::new(),
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        constructors: Vec::new(),
    };
    for member in &class.members {
        match member {
            ClassMember::Field(field) => {
                for variable in &field.variables.variables {
                    element.fields.push(FieldElement {
                        name: variable.name.name.clone(),
                        name_offset: variable.name.span.offset,
                        is_static: field.is_static,
                        is_final: field.variables.is_final(),
                        is_const: field.variables.is_const(),
                        declared_type: DartType::Dynamic,
                    });
                }
            }
            ClassMember::Method(method) => element.methods.push(MethodElement {
                name: method.name.name.clone(),
                name_offset: method.name.span.offset,
                is_static: method.is_static,
                is_abstract: method.is_abstract(),
                return_type: DartType::Dynamic,
                parameters: build_parameters(&method.parameters),
            }),
            ClassMember::Constructor(constructor) => {
                let name = constructor.name.as_ref();
                element.constructors.push(ConstructorElement {
                    name: name.map(|n| n.name.clone()).unwrap_or_default(),
                    name_offset: name
                        .map(|n| n.span.offset)
                        .unwrap_or(constructor.return_type.span.offset),
                    is_const: constructor.is_const,
                    parameters: build_parameters(&constructor.parameters),
                });
            }
        }
    }
    // Every class without a declared constructor gets the implicit one.
    if element.constructors.is_empty() {
        element.constructors.push(ConstructorElement {
            name: String::new(),
            name_offset: element.name_offset,
            is_const: false,
            parameters: Vec::new(),
        });
    }
    element
}

fn build_parameters(parameters: &[FormalParameter]) -> Vec<ParameterElement> {
    parameters
        .iter()
        .map(|parameter| ParameterElement {
            name: parameter.name.name.clone(),
            name_offset: parameter.name.span.offset,
            kind: parameter.kind,
            declared_type: DartType::Dynamic,
            is_field_formal: parameter.is_field_formal,
        })
        .collect()
}

pub struct LibraryElementBuilder<'a> {
    context: &'a dyn DirectiveContext,
    listener: &'a mut RecordingErrorListener,
}

impl<'a> LibraryElementBuilder<'a> {
    pub fn new(
        context: &'a dyn DirectiveContext,
        listener: &'a mut RecordingErrorListener,
    ) -> Self {
        Self { context, listener }
    }

    pub fn build_library(&mut self, library: &ResolvableLibrary) -> LibraryElement {
        let unit = &library.defining_unit;
        let name = unit
            .library_directive()
            .map(|directive| directive.name.to_string())
            .unwrap_or_default();

        let mut element = LibraryElement::new(library.source.clone(), name);
        element.defining_unit = build_unit_element(&library.source, &library.source, unit);

        let mut reporter = ErrorReporter::new(&mut *self.listener, library.source.clone());
        for directive in unit.parts() {
            let uri = &directive.uri;
            let part_source =
                match resolve_directive_uri(self.context.source_factory(), &library.source, uri) {
                    Ok(source) => source,
                    Err(error) => {
                        report_uri_error(&mut reporter, uri.span.offset, uri.span.length, &error);
                        continue;
                    }
                };
            let Some(part_unit) = library.part(&part_source).and_then(|part| part.unit.clone())
            else {
                reporter.report(
                    uri.span.offset,
                    uri.span.length,
                    CompileTimeErrorCode::UriDoesNotExist,
                    &[&uri.value],
                );
                continue;
            };
            let Some(part_of) = part_unit.part_of_directive() else {
                reporter.report(
                    uri.span.offset,
                    uri.span.length,
                    CompileTimeErrorCode::PartOfNonPart,
                    &[&uri.value],
                );
                continue;
            };
            match &part_of.target {
                PartOfTarget::Name(part_name) => {
                    let part_name = part_name.to_string();
                    if part_name != element.name {
                        reporter.report(
                            uri.span.offset,
                            uri.span.length,
                            StaticWarningCode::PartOfDifferentLibrary,
                            &[&element.name, &part_name],
                        );
                    }
                }
                PartOfTarget::Uri(target) => {
                    let owner = resolve_directive_uri(
                        self.context.source_factory(),
                        &part_source,
                        target,
                    );
                    if owner.as_ref() != Ok(&library.source) {
                        reporter.report(
                            uri.span.offset,
                            uri.span.length,
                            StaticWarningCode::PartOfDifferentLibrary,
                            &[library.source.uri(), &target.value],
                        );
                    }
                }
            }
            element
                .parts
                .push(build_unit_element(&part_source, &library.source, &part_unit));
        }

        let entry_point = element
            .units()
            .flat_map(|unit| unit.functions.iter())
            .find(|function| function.name == ENTRY_POINT_NAME)
            .map(|function| TopLevelRef {
                library: library.source.clone(),
                name: function.name.clone(),
            });
        element.entry_point = entry_point;

        tracing::debug!(
            "Built element model for {} ({} parts)",
            library.source,
            element.parts.len()
        );
        element
    }
}

pub(crate) fn report_uri_error(
    reporter: &mut ErrorReporter<'_>,
    offset: usize,
    length: usize,
    error: &ParserError,
) {
    match error {
        ParserError::UriWithInterpolation(_) => {
            reporter.report(offset, length, CompileTimeErrorCode::UriWithInterpolation, &[])
        }
        ParserError::InvalidUri(uri) => {
            reporter.report(offset, length, CompileTimeErrorCode::InvalidUri, &[uri])
        }
        ParserError::UriDoesNotExist(uri) => {
            reporter.report(offset, length, CompileTimeErrorCode::UriDoesNotExist, &[uri])
        }
    }
}
