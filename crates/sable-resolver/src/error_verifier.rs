//! Static checks over a resolved unit
//!
//! Reads the resolution table and never changes it. Runs after the constant
//! verifier and shares the unit's inheritance manager.

use std::collections::{HashMap, HashSet};

use sable_core::{
    CompileTimeErrorCode, ErrorCode, ErrorReporter, StaticTypeWarningCode, StaticWarningCode,
};
use sable_parser::ast::{
    ArgumentList, ClassDeclaration, ClassMember, CompilationUnit, Declaration, Expression,
    FormalParameter, FunctionBody, Identifier, NodeId, Span, Statement, VariableList,
};

use crate::element::{parameter_arity, ClassRef, Element, ParameterElement};
use crate::inheritance::MemberKind;
use crate::resolved::ResolutionTable;
use crate::resolver::UnitContext;
use crate::types::{DartType, TypeSystem};
use crate::visitor::{self, AstVisitor};

/// The function whose body is being checked
struct Enclosing {
    name: String,
    return_type: DartType,
}

pub struct ErrorVerifier<'r, 'a, 'l> {
    context: &'r UnitContext<'a>,
    table: &'r ResolutionTable,
    reporter: &'r mut ErrorReporter<'l>,
    types: TypeSystem<'r>,
    function: Option<Enclosing>,
    scopes: Vec<HashSet<String>>,
    final_locals: HashSet<NodeId>,
}

impl<'r, 'a, 'l> ErrorVerifier<'r, 'a, 'l> {
    pub fn new(
        context: &'r UnitContext<'a>,
        table: &'r ResolutionTable,
        reporter: &'r mut ErrorReporter<'l>,
    ) -> Self {
        Self {
            context,
            table,
            reporter,
            types: context.type_system(),
            function: None,
            scopes: Vec::new(),
            final_locals: HashSet::new(),
        }
    }

    pub fn verify(&mut self, unit: &CompilationUnit) {
        self.check_top_level_duplicates();
        visitor::walk_unit(self, unit);
    }

    fn report(&mut self, span: Span, code: impl Into<ErrorCode>, arguments: &[&str]) {
        self.reporter
            .report(span.offset, span.length, code, arguments);
    }

    /// Names declared twice across the library, reported in the later unit
    fn check_top_level_duplicates(&mut self) {
        let library = self.context.library;
        let mut seen = HashSet::new();
        for unit in library.units() {
            let declarations = unit.top_level_declarations(&library.source);
            let current = unit.source == *self.context.source;
            for (name, offset, _) in declarations {
                if name.is_empty() {
                    continue;
                }
                if !seen.insert(name.clone()) && current {
                    self.report(
                        Span::new(offset, name.len()),
                        CompileTimeErrorCode::DuplicateDefinition,
                        &[&name],
                    );
                }
            }
            if current {
                break;
            }
        }
    }

    fn check_duplicate_names<'n>(&mut self, names: impl IntoIterator<Item = &'n Identifier>) {
        let mut seen = HashSet::new();
        for name in names {
            if !name.is_synthetic() && !seen.insert(name.name.as_str()) {
                self.report(
                    name.span,
                    CompileTimeErrorCode::DuplicateDefinition,
                    &[&name.name],
                );
            }
        }
    }

    fn check_parameters(&mut self, parameters: &[FormalParameter]) {
        self.check_duplicate_names(parameters.iter().map(|p| &p.name));
    }

    fn verify_class(&mut self, class: &ClassDeclaration) {
        let members = class.members.iter().flat_map(|member| match member {
            ClassMember::Field(field) => {
                field.variables.variables.iter().map(|v| &v.name).collect()
            }
            ClassMember::Method(method) => vec![&method.name],
            ClassMember::Constructor(_) => Vec::new(),
        });
        self.check_duplicate_names(members);
        let constructors: Vec<&Identifier> = class
            .members
            .iter()
            .filter_map(|member| match member {
                ClassMember::Constructor(constructor) => {
                    Some(constructor.name.as_ref().unwrap_or(&constructor.return_type))
                }
                _ => None,
            })
            .collect();
        self.check_duplicate_names(constructors);

        let Some(Element::Class(class_ref)) = self.table.element(class.id).cloned() else {
            return;
        };
        if let Some(path) = self.inheritance_cycle(&class_ref) {
            self.report(
                class.name.span,
                CompileTimeErrorCode::RecursiveInterfaceInheritance,
                &[&class_ref.name, &path.join(", ")],
            );
            return;
        }
        if !class.is_abstract {
            self.check_abstract_members(class, &class_ref);
        }
        self.check_overrides(class, &class_ref);
    }

    /// Names along a supertype path leading from `class` back to itself
    fn inheritance_cycle(&self, class: &ClassRef) -> Option<Vec<String>> {
        fn search(
            verifier: &ErrorVerifier<'_, '_, '_>,
            target: &ClassRef,
            current: &ClassRef,
            path: &mut Vec<String>,
            visited: &mut HashSet<ClassRef>,
        ) -> bool {
            let Some(element) = verifier.context.inheritance.class(current) else {
                return false;
            };
            for supertype in element.direct_supertypes() {
                if supertype.element == *target {
                    path.push(target.name.clone());
                    return true;
                }
                if visited.insert(supertype.element.clone()) {
                    path.push(supertype.element.name.clone());
                    if search(verifier, target, &supertype.element, path, visited) {
                        return true;
                    }
                    path.pop();
                }
            }
            false
        }

        let mut path = vec![class.name.clone()];
        search(self, class, class, &mut path, &mut HashSet::new()).then_some(path)
    }

    fn check_abstract_members(&mut self, class: &ClassDeclaration, class_ref: &ClassRef) {
        for member in &class.members {
            if let ClassMember::Method(method) = member {
                if method.is_abstract() && !method.is_static {
                    self.report(
                        method.name.span,
                        StaticWarningCode::ConcreteClassWithAbstractMember,
                        &[&method.name.name, &class_ref.name],
                    );
                }
            }
        }

        let inheritance = &self.context.inheritance;
        let Some(element) = inheritance.class(class_ref) else {
            return;
        };
        let missing: Vec<String> = inheritance
            .inherited_members(class_ref)
            .values()
            .filter(|member| matches!(member.kind, MemberKind::Method(_)) && !member.is_static())
            .filter(|member| element.method(member.name()).is_none())
            .filter(|member| inheritance.concrete_member(class_ref, member.name()).is_none())
            .map(|member| member.name().to_string())
            .collect();
        for name in missing {
            self.report(
                class.name.span,
                StaticWarningCode::NonAbstractClassInheritsAbstractMember,
                &[&name],
            );
        }
    }

    fn check_overrides(&mut self, class: &ClassDeclaration, class_ref: &ClassRef) {
        let Some(element) = self.context.inheritance.class(class_ref) else {
            return;
        };
        for member in &class.members {
            let ClassMember::Method(declaration) = member else {
                continue;
            };
            let Some(method) = element.method(&declaration.name.name) else {
                continue;
            };
            if method.is_static {
                continue;
            }
            let Some(overridden) = self
                .context
                .inheritance
                .overridden_member(class_ref, &method.name)
                .filter(|member| !member.is_static())
            else {
                continue;
            };
            let Some(overridden_method) = overridden.as_method() else {
                continue;
            };
            let owner = overridden.owner.name.as_str();

            let (required, _) = parameter_arity(&method.parameters);
            let (overridden_required, _) = parameter_arity(&overridden_method.parameters);
            if required > overridden_required {
                self.report(
                    declaration.name.span,
                    StaticWarningCode::InvalidMethodOverrideRequired,
                    &[&overridden_required.to_string(), owner],
                );
            }

            let overridden_return = &overridden_method.return_type;
            if !overridden_return.is_void()
                && !self.types.is_assignable(&method.return_type, overridden_return)
            {
                let span = declaration
                    .return_type
                    .as_ref()
                    .map(|t| t.span)
                    .unwrap_or(declaration.name.span);
                self.report(
                    span,
                    StaticWarningCode::InvalidMethodOverrideReturnType,
                    &[
                        &method.return_type.to_string(),
                        &overridden_return.to_string(),
                        owner,
                    ],
                );
            }
        }
    }

    fn check_assignable(&mut self, value: &Expression, declared: &DartType) {
        let actual = self.table.static_type(value.id());
        if !self.types.is_assignable(&actual, declared) {
            self.report(
                value.span(),
                StaticTypeWarningCode::InvalidAssignment,
                &[&actual.to_string(), &declared.to_string()],
            );
        }
    }

    fn check_initializers(&mut self, list: &VariableList) {
        if list.type_name.is_none() {
            return;
        }
        for variable in &list.variables {
            if let Some(initializer) = &variable.initializer {
                let declared = self.table.static_type(variable.id);
                self.check_assignable(initializer, &declared);
            }
        }
    }

    fn check_return(&mut self, expression: Option<&Expression>) {
        let (Some(function), Some(expression)) = (&self.function, expression) else {
            return;
        };
        let actual = self.table.static_type(expression.id());
        let invalid = if function.return_type.is_void() {
            !matches!(actual, DartType::Void | DartType::Dynamic | DartType::Bottom)
        } else {
            !self.types.is_assignable(&actual, &function.return_type)
        };
        if invalid {
            let declared = function.return_type.to_string();
            let name = function.name.clone();
            self.report(
                expression.span(),
                StaticTypeWarningCode::ReturnOfInvalidType,
                &[&actual.to_string(), &declared, &name],
            );
        }
    }

    fn check_condition(&mut self, condition: &Expression) {
        let actual = self.table.static_type(condition.id());
        if !self
            .types
            .is_assignable(&actual, &self.context.provider.bool())
        {
            self.report(condition.span(), StaticTypeWarningCode::NonBoolCondition, &[]);
        }
    }

    fn check_assignment(&mut self, target: &Expression, value: &Expression) {
        let lookup = self.context.lookup;
        let is_final = match self.table.element(target.id()) {
            Some(Element::LocalVariable { declaration, .. }) => {
                self.final_locals.contains(declaration)
            }
            Some(Element::Field(field)) => lookup
                .class(&field.class)
                .and_then(|class| class.field(&field.name))
                .is_some_and(|field| field.is_final || field.is_const),
            Some(Element::TopLevelVariable(variable)) => lookup
                .top_level_variable(variable)
                .is_some_and(|variable| variable.is_final || variable.is_const),
            _ => false,
        };
        if is_final {
            let name = match target.unparenthesized() {
                Expression::Identifier(identifier) => identifier.name.clone(),
                Expression::PropertyAccess { name, .. } => name.name.clone(),
                other => other.span().offset.to_string(),
            };
            self.report(target.span(), StaticWarningCode::AssignmentToFinal, &[&name]);
        }
        let declared = self.table.static_type(target.id());
        self.check_assignable(value, &declared);
    }

    fn check_arguments(
        &mut self,
        parameters: Option<&[ParameterElement]>,
        arguments: &ArgumentList,
    ) {
        let Some(parameters) = parameters else {
            return;
        };
        let (required, total) = parameter_arity(parameters);
        let found = arguments.arguments.len();
        if found < required {
            self.report(
                arguments.span,
                StaticWarningCode::NotEnoughRequiredArguments,
                &[&required.to_string(), &found.to_string()],
            );
        } else if found > total {
            self.report(
                arguments.span,
                StaticWarningCode::ExtraPositionalArguments,
                &[&total.to_string(), &found.to_string()],
            );
        }
    }

    /// Parameters of an invoked function, method or constructor
    fn parameters_of(&self, element: &Element) -> Option<&'a [ParameterElement]> {
        let lookup = self.context.lookup;
        match element {
            Element::Function(function) => {
                lookup.function(function).map(|f| f.parameters.as_slice())
            }
            Element::Method(method) => lookup
                .class(&method.class)
                .and_then(|class| class.method(&method.name))
                .map(|m| m.parameters.as_slice()),
            Element::Constructor(constructor) => lookup
                .class(&constructor.class)
                .and_then(|class| class.constructor(&constructor.name))
                .map(|c| c.parameters.as_slice()),
            _ => None,
        }
    }

    fn function_body(
        &mut self,
        enclosing: Option<Enclosing>,
        parameters: &[FormalParameter],
        body: &FunctionBody,
    ) {
        self.check_parameters(parameters);
        visitor::walk_parameters(self, parameters);
        self.function = enclosing;
        self.visit_body(body);
        self.function = None;
    }
}

impl AstVisitor for ErrorVerifier<'_, '_, '_> {
    fn visit_declaration(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::Class(class) => {
                self.verify_class(class);
                for member in &class.members {
                    match member {
                        ClassMember::Field(field) => {
                            self.check_initializers(&field.variables);
                            visitor::walk_variable_list(self, &field.variables);
                        }
                        ClassMember::Method(method) => {
                            let enclosing = Enclosing {
                                name: method.name.name.clone(),
                                return_type: self.table.static_type(method.id),
                            };
                            self.function_body(Some(enclosing), &method.parameters, &method.body);
                        }
                        ClassMember::Constructor(constructor) => {
                            self.function_body(None, &constructor.parameters, &constructor.body)
                        }
                    }
                }
            }
            Declaration::Function(function) => {
                let enclosing = Enclosing {
                    name: function.name.name.clone(),
                    return_type: self.table.static_type(function.id),
                };
                self.function_body(Some(enclosing), &function.parameters, &function.body);
            }
            Declaration::Variables(variables) => {
                self.check_initializers(&variables.variables);
                visitor::walk_variable_list(self, &variables.variables);
            }
        }
    }

    fn visit_body(&mut self, body: &FunctionBody) {
        match body {
            FunctionBody::Expression { expression, .. } => {
                let is_void = self
                    .function
                    .as_ref()
                    .is_some_and(|function| function.return_type.is_void());
                if !is_void {
                    self.check_return(Some(expression));
                }
                self.visit_expression(expression);
            }
            FunctionBody::Block(_) => {
                self.scopes.push(HashSet::new());
                visitor::walk_body(self, body);
                self.scopes.pop();
            }
            FunctionBody::Empty(_) | FunctionBody::Skipped(_) => {}
        }
    }

    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(_) => {
                self.scopes.push(HashSet::new());
                visitor::walk_statement(self, statement);
                self.scopes.pop();
                return;
            }
            Statement::Variables { variables, .. } => {
                for variable in &variables.variables {
                    if variables.is_final() || variables.is_const() {
                        self.final_locals.insert(variable.id);
                    }
                    let duplicate = self
                        .scopes
                        .last_mut()
                        .is_some_and(|scope| !scope.insert(variable.name.name.clone()));
                    if duplicate && !variable.name.is_synthetic() {
                        self.report(
                            variable.name.span,
                            CompileTimeErrorCode::DuplicateDefinition,
                            &[&variable.name.name],
                        );
                    }
                }
                self.check_initializers(variables);
            }
            Statement::Return { expression, .. } => self.check_return(expression.as_ref()),
            Statement::If { condition, .. } | Statement::While { condition, .. } => {
                self.check_condition(condition)
            }
            Statement::Expression { .. } | Statement::Empty { .. } => {}
        }
        visitor::walk_statement(self, statement);
    }

    fn visit_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Assignment { target, value, .. } => self.check_assignment(target, value),
            Expression::Invocation { id, arguments, .. } => {
                let parameters = self.table.element(*id).and_then(|e| self.parameters_of(e));
                self.check_arguments(parameters, arguments);
            }
            Expression::InstanceCreation {
                id,
                type_name,
                arguments,
                ..
            } => {
                let table = self.table;
                if let Some(Element::Class(class)) = table.element(type_name.id) {
                    let is_abstract = self
                        .context
                        .lookup
                        .class(class)
                        .is_some_and(|class| class.is_abstract);
                    if is_abstract {
                        self.report(
                            type_name.span,
                            StaticWarningCode::InstantiateAbstractClass,
                            &[],
                        );
                    }
                }
                let parameters = self.table.element(*id).and_then(|e| self.parameters_of(e));
                self.check_arguments(parameters, arguments);
            }
            _ => {}
        }
        visitor::walk_expression(self, expression);
    }
}

/// Local declarations of a unit, for checks that need them after the fact
pub(crate) fn local_declarations(unit: &CompilationUnit) -> HashMap<NodeId, Identifier> {
    struct Collector(HashMap<NodeId, Identifier>);

    impl AstVisitor for Collector {
        fn visit_statement(&mut self, statement: &Statement) {
            if let Statement::Variables { variables, .. } = statement {
                for variable in &variables.variables {
                    self.0.insert(variable.id, variable.name.clone());
                }
            }
            visitor::walk_statement(self, statement);
        }
    }

    let mut collector = Collector(HashMap::new());
    visitor::walk_unit(&mut collector, unit);
    collector.0
}
