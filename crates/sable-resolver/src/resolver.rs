//! Resolution of a single compilation unit
//!
//! Runs in a fixed order over an immutable tree: declarations are matched to
//! their elements, type names are resolved, then expressions and identifiers.
//! The constant verifier and the error verifier follow, sharing the unit's
//! inheritance manager. Every result lands in a [`ResolutionTable`].

use std::collections::HashMap;
use std::sync::Arc;

use sable_core::{
    CompileTimeErrorCode, ErrorCode, ErrorReporter, RecordingErrorListener, Source,
    StaticTypeWarningCode, StaticWarningCode,
};
use sable_parser::ast::{
    ArgumentList, BinaryOperator, Block, ClassDeclaration, ClassMember, CompilationUnit,
    Declaration, Expression, FormalParameter, FunctionBody, Identifier, NodeId, Statement,
    TypeName, UnaryOperator, VariableList,
};

use crate::constant::ConstantVerifier;
use crate::element::{
    ClassRef, CompilationUnitElement, Element, LibraryElement, LibraryLookup, MemberRef,
    TopLevelRef,
};
use crate::error::ResolverError;
use crate::error_verifier::ErrorVerifier;
use crate::hierarchy::{lookup_type_name, TypeNameLookup};
use crate::inheritance::{InheritanceManager, MemberKind};
use crate::resolved::{ResolutionTable, ResolvedUnit};
use crate::scope::{LibraryScope, ScopeLookup};
use crate::type_provider::TypeProvider;
use crate::types::{DartType, TypeSystem};
use crate::visitor::{self, AstVisitor};

/// Shared, read-only state for every step of one unit's resolution
pub struct UnitContext<'a> {
    pub source: &'a Source,
    pub library: &'a LibraryElement,
    pub unit_element: &'a CompilationUnitElement,
    pub lookup: &'a dyn LibraryLookup,
    pub provider: &'a TypeProvider,
    pub scope: LibraryScope,
    pub inheritance: InheritanceManager<'a>,
}

impl<'a> UnitContext<'a> {
    pub fn new(
        source: &'a Source,
        library: &'a LibraryElement,
        lookup: &'a dyn LibraryLookup,
        provider: &'a TypeProvider,
    ) -> Result<Self, ResolverError> {
        let unit_element = library.unit(source).ok_or_else(|| {
            ResolverError::UnitNotInLibrary(source.to_string(), library.source.to_string())
        })?;
        Ok(Self {
            source,
            library,
            unit_element,
            lookup,
            provider,
            scope: LibraryScope::new(library, lookup),
            inheritance: InheritanceManager::new(lookup),
        })
    }

    pub fn type_system(&self) -> TypeSystem<'_> {
        TypeSystem::new(self.lookup, self.provider)
    }

    pub fn class_ref(&self, name: &str) -> ClassRef {
        ClassRef::new(&self.library.source, name)
    }
}

/// Resolve `unit` and verify it, reporting into `listener`.
pub fn resolve_unit(
    context: &UnitContext<'_>,
    modification_time: i64,
    unit: Arc<CompilationUnit>,
    listener: &mut RecordingErrorListener,
) -> ResolvedUnit {
    let mut table = ResolutionTable::new();
    let mut reporter = ErrorReporter::new(listener, context.source.clone());

    DeclarationResolver::new(context, &mut table).resolve(&unit);
    let mut types = TypeNameResolver {
        context,
        table: &mut table,
        reporter: &mut reporter,
    };
    visitor::walk_unit(&mut types, &unit);
    ExpressionResolver::new(context, &mut table, &mut reporter).resolve(&unit);

    ConstantVerifier::new(context, &table, &mut reporter).verify(&unit);
    let mut verifier = ErrorVerifier::new(context, &table, &mut reporter);
    verifier.verify(&unit);

    tracing::debug!(
        "Resolved {} ({} resolved nodes)",
        context.source,
        table.element_count()
    );
    ResolvedUnit {
        source: context.source.clone(),
        library: context.library.source.clone(),
        modification_time,
        unit,
        resolution: table,
    }
}

/// Library names a list of ambiguous elements came from, for diagnostics
pub(crate) fn ambiguity_sources(elements: &[Element]) -> String {
    let names: Vec<String> = elements
        .iter()
        .filter_map(|element| element.library())
        .map(|source| format!("'{}'", source.short_name()))
        .collect();
    names.join(" and ")
}

/// The class and constructor an instance creation names. `new a.B()` is a
/// prefixed type when `a` is an import prefix and a named constructor of
/// class `a` otherwise.
pub(crate) fn creation_target<'n>(
    scope: &LibraryScope,
    type_name: &'n TypeName,
    constructor_name: Option<&'n Identifier>,
) -> (TypeName, Option<&'n Identifier>) {
    match (&type_name.prefix, constructor_name) {
        (Some(prefix), None) if !scope.is_prefix(&prefix.name) => (
            TypeName {
                id: type_name.id,
                span: prefix.span,
                prefix: None,
                name: prefix.clone(),
            },
            Some(&type_name.name),
        ),
        _ => (type_name.clone(), constructor_name),
    }
}

/// Step one: bind declarations to the elements built for them
struct DeclarationResolver<'r, 'a> {
    context: &'r UnitContext<'a>,
    table: &'r mut ResolutionTable,
}

impl<'r, 'a> DeclarationResolver<'r, 'a> {
    fn new(context: &'r UnitContext<'a>, table: &'r mut ResolutionTable) -> Self {
        Self { context, table }
    }

    fn resolve(&mut self, unit: &CompilationUnit) {
        let element = self.context.unit_element;
        let library = &self.context.library.source;
        let mut classes = element.classes.iter();
        let mut functions = element.functions.iter();
        let mut variables = element.variables.iter();

        for declaration in &unit.declarations {
            match declaration {
                Declaration::Class(class) => {
                    if let Some(class_element) = classes.next() {
                        self.resolve_class(class, class_element.class_ref());
                    }
                }
                Declaration::Function(function) => {
                    let Some(function_element) = functions.next() else {
                        continue;
                    };
                    let element = Element::Function(TopLevelRef {
                        library: library.clone(),
                        name: function_element.name.clone(),
                    });
                    self.table.record_element(function.id, element.clone());
                    self.table.record_element(function.name.id, element);
                    self.table
                        .record_type(function.id, function_element.return_type.clone());
                    self.resolve_parameters(
                        &function.parameters,
                        function_element
                            .parameters
                            .iter()
                            .map(|p| p.declared_type.clone()),
                    );
                }
                Declaration::Variables(declaration) => {
                    for variable in &declaration.variables.variables {
                        let Some(variable_element) = variables.next() else {
                            continue;
                        };
                        let element = Element::TopLevelVariable(TopLevelRef {
                            library: library.clone(),
                            name: variable_element.name.clone(),
                        });
                        self.table.record_element(variable.id, element.clone());
                        self.table.record_element(variable.name.id, element);
                        self.table
                            .record_type(variable.id, variable_element.declared_type.clone());
                    }
                }
            }
        }
    }

    fn resolve_class(&mut self, class: &ClassDeclaration, class_ref: ClassRef) {
        self.table
            .record_element(class.id, Element::Class(class_ref.clone()));
        self.table
            .record_element(class.name.id, Element::Class(class_ref.clone()));
        let Some(element) = self.context.lookup.class(&class_ref) else {
            return;
        };
        let member = |name: &str| MemberRef {
            class: class_ref.clone(),
            name: name.to_string(),
        };
        let mut fields = element.fields.iter();
        let mut methods = element.methods.iter();
        let mut constructors = element.constructors.iter();
        for declaration in &class.members {
            match declaration {
                ClassMember::Field(field) => {
                    for variable in &field.variables.variables {
                        let Some(field_element) = fields.next() else {
                            continue;
                        };
                        let element = Element::Field(member(&field_element.name));
                        self.table.record_element(variable.id, element.clone());
                        self.table.record_element(variable.name.id, element);
                        self.table
                            .record_type(variable.id, field_element.declared_type.clone());
                    }
                }
                ClassMember::Method(method) => {
                    let Some(method_element) = methods.next() else {
                        continue;
                    };
                    let element = Element::Method(member(&method_element.name));
                    self.table.record_element(method.id, element.clone());
                    self.table.record_element(method.name.id, element);
                    self.table
                        .record_type(method.id, method_element.return_type.clone());
                    self.resolve_parameters(
                        &method.parameters,
                        method_element
                            .parameters
                            .iter()
                            .map(|p| p.declared_type.clone()),
                    );
                }
                ClassMember::Constructor(constructor) => {
                    let Some(constructor_element) = constructors.next() else {
                        continue;
                    };
                    self.table.record_element(
                        constructor.id,
                        Element::Constructor(member(&constructor_element.name)),
                    );
                    self.resolve_parameters(
                        &constructor.parameters,
                        constructor_element
                            .parameters
                            .iter()
                            .map(|p| p.declared_type.clone()),
                    );
                }
            }
        }
    }

    fn resolve_parameters(
        &mut self,
        parameters: &[FormalParameter],
        types: impl Iterator<Item = DartType>,
    ) {
        for (parameter, ty) in parameters.iter().zip(types) {
            let element = Element::Parameter {
                name: parameter.name.name.clone(),
                declaration: parameter.id,
            };
            self.table.record_element(parameter.id, element.clone());
            self.table.record_element(parameter.name.id, element);
            self.table.record_type(parameter.id, ty);
        }
    }
}

/// Step two: every type annotation and instantiated class
struct TypeNameResolver<'r, 'a, 'l> {
    context: &'r UnitContext<'a>,
    table: &'r mut ResolutionTable,
    reporter: &'r mut ErrorReporter<'l>,
}

impl TypeNameResolver<'_, '_, '_> {
    /// Resolve a type name, reporting `undefined` when it names nothing and
    /// `non_class` when it names something other than a class.
    fn resolve(&mut self, type_name: &TypeName, undefined: ErrorCode, non_class: ErrorCode) {
        let name = type_name.to_string();
        let span = type_name.span;
        match lookup_type_name(&self.context.scope, type_name) {
            TypeNameLookup::Type { ty, imports } => {
                self.table.record_used_imports(imports);
                if let DartType::Interface(interface) = &ty {
                    self.table
                        .record_element(type_name.id, Element::Class(interface.element.clone()));
                }
                self.table.record_type(type_name.id, ty);
            }
            TypeNameLookup::NotAType(_) => {
                self.table.record_type(type_name.id, DartType::Dynamic);
                self.reporter
                    .report(span.offset, span.length, non_class, &[&name]);
            }
            TypeNameLookup::Ambiguous(elements) => {
                self.table.record_type(type_name.id, DartType::Dynamic);
                self.reporter.report(
                    span.offset,
                    span.length,
                    StaticWarningCode::AmbiguousImport,
                    &[&name, &ambiguity_sources(&elements)],
                );
            }
            TypeNameLookup::Undefined if !type_name.name.is_synthetic() => {
                self.table.record_type(type_name.id, DartType::Dynamic);
                self.reporter
                    .report(span.offset, span.length, undefined, &[&name]);
            }
            TypeNameLookup::Undefined => {
                self.table.record_type(type_name.id, DartType::Dynamic);
            }
        }
    }
}

impl AstVisitor for TypeNameResolver<'_, '_, '_> {
    fn visit_declaration(&mut self, declaration: &Declaration) {
        let Declaration::Class(class) = declaration else {
            visitor::walk_declaration(self, declaration);
            return;
        };
        if let Some(superclass) = &class.superclass {
            self.resolve(
                superclass,
                StaticWarningCode::UndefinedClass.into(),
                CompileTimeErrorCode::ExtendsNonClass.into(),
            );
        }
        for mixin in &class.mixins {
            self.resolve(
                mixin,
                StaticWarningCode::UndefinedClass.into(),
                CompileTimeErrorCode::MixinOfNonClass.into(),
            );
        }
        for interface in &class.interfaces {
            self.resolve(
                interface,
                StaticWarningCode::UndefinedClass.into(),
                CompileTimeErrorCode::ImplementsNonClass.into(),
            );
        }
        visitor::walk_class_members(self, &class.members);
    }

    fn visit_type_name(&mut self, type_name: &TypeName) {
        let undefined = StaticWarningCode::UndefinedClass;
        self.resolve(type_name, undefined.into(), undefined.into());
    }

    fn visit_expression(&mut self, expression: &Expression) {
        if let Expression::InstanceCreation {
            type_name,
            constructor_name,
            arguments,
            ..
        } = expression
        {
            let (class_name, _) =
                creation_target(&self.context.scope, type_name, constructor_name.as_ref());
            self.visit_type_name(&class_name);
            for argument in &arguments.arguments {
                self.visit_expression(argument);
            }
            return;
        }
        visitor::walk_expression(self, expression);
    }
}

#[derive(Debug, Clone)]
struct Local {
    element: Element,
    ty: DartType,
}

/// Step three: expressions, statements and identifier bindings
struct ExpressionResolver<'r, 'a, 'l> {
    context: &'r UnitContext<'a>,
    table: &'r mut ResolutionTable,
    reporter: &'r mut ErrorReporter<'l>,
    locals: Vec<HashMap<String, Local>>,
    enclosing_class: Option<ClassRef>,
}

impl<'r, 'a, 'l> ExpressionResolver<'r, 'a, 'l> {
    fn new(
        context: &'r UnitContext<'a>,
        table: &'r mut ResolutionTable,
        reporter: &'r mut ErrorReporter<'l>,
    ) -> Self {
        Self {
            context,
            table,
            reporter,
            locals: Vec::new(),
            enclosing_class: None,
        }
    }

    fn resolve(&mut self, unit: &CompilationUnit) {
        for declaration in &unit.declarations {
            match declaration {
                Declaration::Class(class) => {
                    self.enclosing_class = match self.table.element(class.id) {
                        Some(Element::Class(class_ref)) => Some(class_ref.clone()),
                        _ => None,
                    };
                    for member in &class.members {
                        match member {
                            ClassMember::Field(field) => {
                                self.resolve_initializers(&field.variables)
                            }
                            ClassMember::Method(method) => {
                                self.resolve_function(&method.parameters, &method.body)
                            }
                            ClassMember::Constructor(constructor) => {
                                self.resolve_function(&constructor.parameters, &constructor.body)
                            }
                        }
                    }
                    self.enclosing_class = None;
                }
                Declaration::Function(function) => {
                    self.resolve_function(&function.parameters, &function.body)
                }
                Declaration::Variables(variables) => {
                    self.resolve_initializers(&variables.variables)
                }
            }
        }
    }

    fn resolve_initializers(&mut self, variables: &VariableList) {
        for variable in &variables.variables {
            if let Some(initializer) = &variable.initializer {
                self.expression(initializer);
            }
        }
    }

    fn resolve_function(&mut self, parameters: &[FormalParameter], body: &FunctionBody) {
        let mut scope = HashMap::new();
        for parameter in parameters {
            if let Some(default_value) = &parameter.default_value {
                self.expression(default_value);
            }
            if let Some(element) = self.table.element(parameter.id) {
                scope.insert(
                    parameter.name.name.clone(),
                    Local {
                        element: element.clone(),
                        ty: self.table.static_type(parameter.id),
                    },
                );
            }
        }
        self.locals.push(scope);
        match body {
            FunctionBody::Block(block) => self.block(block),
            FunctionBody::Expression { expression, .. } => {
                self.expression(expression);
            }
            FunctionBody::Empty(_) | FunctionBody::Skipped(_) => {}
        }
        self.locals.pop();
    }

    fn block(&mut self, block: &Block) {
        self.locals.push(HashMap::new());
        for statement in &block.statements {
            self.statement(statement);
        }
        self.locals.pop();
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(block) => self.block(block),
            Statement::Variables { variables, .. } => {
                let declared = variables
                    .type_name
                    .as_ref()
                    .map(|type_name| self.table.static_type(type_name.id))
                    .unwrap_or(DartType::Dynamic);
                for variable in &variables.variables {
                    if let Some(initializer) = &variable.initializer {
                        self.expression(initializer);
                    }
                    let element = Element::LocalVariable {
                        name: variable.name.name.clone(),
                        declaration: variable.id,
                    };
                    self.table.record_element(variable.id, element.clone());
                    self.table.record_element(variable.name.id, element.clone());
                    self.table.record_type(variable.id, declared.clone());
                    if let Some(scope) = self.locals.last_mut() {
                        scope.insert(
                            variable.name.name.clone(),
                            Local {
                                element,
                                ty: declared.clone(),
                            },
                        );
                    }
                }
            }
            Statement::Return { expression, .. } => {
                if let Some(expression) = expression {
                    self.expression(expression);
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.expression(condition);
                self.nested_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.nested_statement(else_branch);
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                self.expression(condition);
                self.nested_statement(body);
            }
            Statement::Expression { expression, .. } => {
                self.expression(expression);
            }
            Statement::Empty { .. } => {}
        }
    }

    /// A branch body gets its own scope even without braces
    fn nested_statement(&mut self, statement: &Statement) {
        self.locals.push(HashMap::new());
        self.statement(statement);
        self.locals.pop();
    }

    fn expression(&mut self, expression: &Expression) -> DartType {
        let ty = self.expression_type(expression);
        self.table.record_type(expression.id(), ty.clone());
        ty
    }

    fn expression_type(&mut self, expression: &Expression) -> DartType {
        let provider = self.context.provider;
        match expression {
            Expression::Integer { .. } => provider.int(),
            Expression::Double { .. } => provider.double(),
            Expression::String(_) => provider.string(),
            Expression::Boolean { .. } => provider.bool(),
            Expression::Null { .. } => DartType::Bottom,
            Expression::Identifier(identifier) => self.identifier(identifier),
            Expression::This { .. } => self
                .enclosing_class
                .clone()
                .map(DartType::interface)
                .unwrap_or(DartType::Dynamic),
            Expression::Super { .. } => self.super_type(),
            Expression::Parenthesized { expression, .. } => self.expression(expression),
            Expression::PropertyAccess { target, name, id, .. } => {
                self.property_access(*id, target, name)
            }
            Expression::Invocation {
                id,
                target,
                name,
                arguments,
                ..
            } => self.invocation(*id, target.as_deref(), name, arguments),
            Expression::InstanceCreation {
                id,
                type_name,
                constructor_name,
                arguments,
                ..
            } => {
                self.arguments(arguments);
                let (_, constructor) = creation_target(
                    &self.context.scope,
                    type_name,
                    constructor_name.as_ref(),
                );
                let Some(Element::Class(class)) = self.table.element(type_name.id).cloned() else {
                    return DartType::Dynamic;
                };
                let constructor = constructor.map(|c| c.name.as_str()).unwrap_or("");
                let has_constructor = self
                    .context
                    .lookup
                    .class(&class)
                    .is_some_and(|element| element.constructor(constructor).is_some());
                if has_constructor {
                    self.table.record_element(
                        *id,
                        Element::Constructor(MemberRef {
                            class: class.clone(),
                            name: constructor.to_string(),
                        }),
                    );
                }
                DartType::interface(class)
            }
            Expression::Unary {
                operator, operand, ..
            } => {
                let operand = self.expression(operand);
                match operator {
                    UnaryOperator::Not => provider.bool(),
                    UnaryOperator::Negate if provider.is_numeric(&operand) => operand,
                    UnaryOperator::Negate => DartType::Dynamic,
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
                ..
            } => {
                let left = self.expression(left);
                let right = self.expression(right);
                self.binary_type(*operator, &left, &right)
            }
            Expression::Assignment { target, value, .. } => {
                self.expression(target);
                self.expression(value)
            }
        }
    }

    fn binary_type(&self, operator: BinaryOperator, left: &DartType, right: &DartType) -> DartType {
        let provider = self.context.provider;
        match operator {
            BinaryOperator::Or
            | BinaryOperator::And
            | BinaryOperator::Equal
            | BinaryOperator::NotEqual => provider.bool(),
            _ if operator.is_relational() => provider.bool(),
            BinaryOperator::Add if *left == provider.string() => provider.string(),
            _ if provider.is_numeric(left) && provider.is_numeric(right) => match operator {
                BinaryOperator::Divide => provider.double(),
                BinaryOperator::IntegerDivide => provider.int(),
                _ if *left == provider.int() && *right == provider.int() => provider.int(),
                _ if *left == provider.double() || *right == provider.double() => {
                    provider.double()
                }
                _ => provider.num_type(),
            },
            _ => DartType::Dynamic,
        }
    }

    fn super_type(&self) -> DartType {
        self.enclosing_class
            .as_ref()
            .and_then(|class| self.context.lookup.class(class))
            .and_then(|element| element.supertype.clone())
            .map(DartType::Interface)
            .unwrap_or(DartType::Dynamic)
    }

    fn local(&self, name: &str) -> Option<&Local> {
        self.locals.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Name is an import prefix that nothing closer shadows
    fn is_prefix(&self, expression: &Expression) -> Option<String> {
        let Expression::Identifier(identifier) = expression else {
            return None;
        };
        let shadowed = self.local(&identifier.name).is_some()
            || self.enclosing_class.as_ref().is_some_and(|class| {
                self.context
                    .inheritance
                    .lookup_member(class, &identifier.name)
                    .is_some()
            });
        (!shadowed && self.context.scope.is_prefix(&identifier.name))
            .then(|| identifier.name.clone())
    }

    fn record(&mut self, identifier: &Identifier, element: Element) {
        self.table.record_element(identifier.id, element);
    }

    fn member_type(&self, kind: &MemberKind) -> DartType {
        match kind {
            MemberKind::Field(field) => field.declared_type.clone(),
            MemberKind::Method(_) => {
                DartType::Interface(self.context.provider.function_type.clone())
            }
        }
    }

    fn element_type(&self, element: &Element) -> DartType {
        let lookup = self.context.lookup;
        match element {
            Element::Class(_) => self.context.provider.type_literal(),
            Element::Function(_) | Element::Method(_) => {
                DartType::Interface(self.context.provider.function_type.clone())
            }
            Element::TopLevelVariable(variable) => lookup
                .top_level_variable(variable)
                .map(|v| v.declared_type.clone())
                .unwrap_or(DartType::Dynamic),
            Element::Field(field) => lookup
                .class(&field.class)
                .and_then(|class| class.field(&field.name))
                .map(|f| f.declared_type.clone())
                .unwrap_or(DartType::Dynamic),
            Element::Library(_)
            | Element::Prefix(_)
            | Element::Constructor(_)
            | Element::Parameter { .. }
            | Element::LocalVariable { .. } => DartType::Dynamic,
        }
    }

    fn report_scope_failure(
        &mut self,
        identifier: &Identifier,
        lookup: ScopeLookup,
        code: ErrorCode,
    ) {
        if identifier.is_synthetic() {
            return;
        }
        let span = identifier.span;
        match lookup {
            ScopeLookup::Ambiguous(elements) => self.reporter.report(
                span.offset,
                span.length,
                StaticWarningCode::AmbiguousImport,
                &[&identifier.name, &ambiguity_sources(&elements)],
            ),
            ScopeLookup::NotFound => {
                self.reporter
                    .report(span.offset, span.length, code, &[&identifier.name])
            }
            ScopeLookup::Found { .. } => {}
        }
    }

    fn identifier(&mut self, identifier: &Identifier) -> DartType {
        if let Some(local) = self.local(&identifier.name).cloned() {
            self.record(identifier, local.element);
            return local.ty;
        }
        if let Some(class) = self.enclosing_class.clone() {
            if let Some(member) = self.context.inheritance.lookup_member(&class, &identifier.name) {
                let element = member_element(&member.owner, &member.kind);
                self.record(identifier, element);
                return self.member_type(&member.kind);
            }
        }
        match self.context.scope.lookup(&identifier.name) {
            ScopeLookup::Found { element, imports } => {
                self.table.record_used_imports(imports);
                let ty = self.element_type(&element);
                self.record(identifier, element);
                ty
            }
            failure => {
                self.report_scope_failure(
                    identifier,
                    failure,
                    StaticWarningCode::UndefinedIdentifier.into(),
                );
                DartType::Dynamic
            }
        }
    }

    fn arguments(&mut self, arguments: &ArgumentList) {
        for argument in &arguments.arguments {
            self.expression(argument);
        }
    }

    fn property_access(
        &mut self,
        id: NodeId,
        target: &Expression,
        name: &Identifier,
    ) -> DartType {
        if let Some(prefix) = self.is_prefix(target) {
            self.table
                .record_element(target.id(), Element::Prefix(prefix.clone()));
            return match self.context.scope.lookup_prefixed(&prefix, &name.name) {
                ScopeLookup::Found { element, imports } => {
                    self.table.record_used_imports(imports);
                    let ty = self.element_type(&element);
                    self.table.record_element(id, element.clone());
                    self.record(name, element);
                    ty
                }
                failure => {
                    self.report_scope_failure(
                        name,
                        failure,
                        StaticWarningCode::UndefinedIdentifier.into(),
                    );
                    DartType::Dynamic
                }
            };
        }

        let target_type = self.expression(target);
        if let Some(Element::Class(class)) = self.static_target(target) {
            return match self.context.inheritance.declared_member(&class, &name.name) {
                Some(member) => {
                    let element = member_element(&member.owner, &member.kind);
                    self.table.record_element(id, element.clone());
                    self.record(name, element);
                    self.member_type(&member.kind)
                }
                None => {
                    self.report_undefined_member(
                        name,
                        &class,
                        StaticTypeWarningCode::UndefinedGetter,
                    );
                    DartType::Dynamic
                }
            };
        }
        let DartType::Interface(interface) = target_type else {
            return DartType::Dynamic;
        };
        match self.context.inheritance.lookup_member(&interface.element, &name.name) {
            Some(member) => {
                let element = member_element(&member.owner, &member.kind);
                self.table.record_element(id, element.clone());
                self.record(name, element);
                self.member_type(&member.kind)
            }
            None => {
                self.report_undefined_member(
                    name,
                    &interface.element,
                    StaticTypeWarningCode::UndefinedGetter,
                );
                DartType::Dynamic
            }
        }
    }

    /// Class named directly by a target expression, for static member access
    fn static_target(&self, target: &Expression) -> Option<Element> {
        match target {
            Expression::Identifier(_) | Expression::PropertyAccess { .. } => {
                match self.table.element(target.id()) {
                    Some(element @ Element::Class(_)) => Some(element.clone()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn report_undefined_member(
        &mut self,
        name: &Identifier,
        class: &ClassRef,
        code: StaticTypeWarningCode,
    ) {
        if name.is_synthetic() {
            return;
        }
        self.reporter.report(
            name.span.offset,
            name.span.length,
            code,
            &[&name.name, &class.name],
        );
    }

    fn invocation(
        &mut self,
        id: NodeId,
        target: Option<&Expression>,
        name: &Identifier,
        arguments: &ArgumentList,
    ) -> DartType {
        self.arguments(arguments);
        let Some(target) = target else {
            return self.unqualified_invocation(id, name);
        };

        if let Some(prefix) = self.is_prefix(target) {
            self.table
                .record_element(target.id(), Element::Prefix(prefix.clone()));
            return match self.context.scope.lookup_prefixed(&prefix, &name.name) {
                ScopeLookup::Found { element, imports } => {
                    self.table.record_used_imports(imports);
                    self.table.record_element(id, element.clone());
                    self.record(name, element.clone());
                    self.invoked_return_type(&element)
                }
                failure => {
                    self.report_scope_failure(
                        name,
                        failure,
                        StaticTypeWarningCode::UndefinedFunction.into(),
                    );
                    DartType::Dynamic
                }
            };
        }

        let target_type = self.expression(target);
        let (class, members) = match self.static_target(target) {
            Some(Element::Class(class)) => {
                let member = self.context.inheritance.declared_member(&class, &name.name);
                (class, member)
            }
            _ => match target_type {
                DartType::Interface(interface) => {
                    let member = self
                        .context
                        .inheritance
                        .lookup_member(&interface.element, &name.name);
                    (interface.element, member)
                }
                _ => return DartType::Dynamic,
            },
        };
        match members {
            Some(member) => {
                let element = member_element(&member.owner, &member.kind);
                self.table.record_element(id, element.clone());
                self.record(name, element);
                match &member.kind {
                    MemberKind::Method(method) => method.return_type.clone(),
                    MemberKind::Field(_) => DartType::Dynamic,
                }
            }
            None => {
                self.report_undefined_member(name, &class, StaticTypeWarningCode::UndefinedMethod);
                DartType::Dynamic
            }
        }
    }

    fn unqualified_invocation(&mut self, id: NodeId, name: &Identifier) -> DartType {
        if let Some(local) = self.local(&name.name).cloned() {
            self.record(name, local.element);
            return DartType::Dynamic;
        }
        if let Some(class) = self.enclosing_class.clone() {
            if let Some(member) = self.context.inheritance.lookup_member(&class, &name.name) {
                let element = member_element(&member.owner, &member.kind);
                self.table.record_element(id, element.clone());
                self.record(name, element);
                return match &member.kind {
                    MemberKind::Method(method) => method.return_type.clone(),
                    MemberKind::Field(_) => DartType::Dynamic,
                };
            }
        }
        match self.context.scope.lookup(&name.name) {
            ScopeLookup::Found { element, imports } => {
                self.table.record_used_imports(imports);
                self.table.record_element(id, element.clone());
                self.record(name, element.clone());
                self.invoked_return_type(&element)
            }
            failure => {
                self.report_scope_failure(
                    name,
                    failure,
                    StaticTypeWarningCode::UndefinedFunction.into(),
                );
                DartType::Dynamic
            }
        }
    }

    fn invoked_return_type(&self, element: &Element) -> DartType {
        match element {
            Element::Function(function) => self
                .context
                .lookup
                .function(function)
                .map(|f| f.return_type.clone())
                .unwrap_or(DartType::Dynamic),
            _ => DartType::Dynamic,
        }
    }
}

fn member_element(owner: &ClassRef, kind: &MemberKind) -> Element {
    match kind {
        MemberKind::Method(method) => Element::Method(MemberRef {
            class: owner.clone(),
            name: method.name.clone(),
        }),
        MemberKind::Field(field) => Element::Field(MemberRef {
            class: owner.clone(),
            name: field.name.clone(),
        }),
    }
}
