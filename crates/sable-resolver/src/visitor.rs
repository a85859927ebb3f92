//! Read-only traversal of the syntax tree
//!
//! Override a `visit_*` method to intercept a node and call the matching
//! `walk_*` function to continue into its children.

use sable_parser::ast::{
    ClassMember, CompilationUnit, Declaration, Expression, FormalParameter, FunctionBody,
    Statement, TypeName, VariableList,
};

pub trait AstVisitor: Sized {
    fn visit_declaration(&mut self, declaration: &Declaration) {
        walk_declaration(self, declaration);
    }

    fn visit_body(&mut self, body: &FunctionBody) {
        walk_body(self, body);
    }

    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement);
    }

    fn visit_expression(&mut self, expression: &Expression) {
        walk_expression(self, expression);
    }

    fn visit_type_name(&mut self, _type_name: &TypeName) {}
}

pub fn walk_unit<V: AstVisitor>(visitor: &mut V, unit: &CompilationUnit) {
    for declaration in &unit.declarations {
        visitor.visit_declaration(declaration);
    }
}

pub fn walk_declaration<V: AstVisitor>(visitor: &mut V, declaration: &Declaration) {
    match declaration {
        Declaration::Class(class) => {
            for type_name in class
                .superclass
                .iter()
                .chain(&class.mixins)
                .chain(&class.interfaces)
            {
                visitor.visit_type_name(type_name);
            }
            walk_class_members(visitor, &class.members);
        }
        Declaration::Function(function) => {
            if let Some(return_type) = &function.return_type {
                visitor.visit_type_name(return_type);
            }
            walk_parameters(visitor, &function.parameters);
            visitor.visit_body(&function.body);
        }
        Declaration::Variables(variables) => walk_variable_list(visitor, &variables.variables),
    }
}

pub fn walk_class_members<V: AstVisitor>(visitor: &mut V, members: &[ClassMember]) {
    for member in members {
        match member {
            ClassMember::Field(field) => walk_variable_list(visitor, &field.variables),
            ClassMember::Method(method) => {
                if let Some(return_type) = &method.return_type {
                    visitor.visit_type_name(return_type);
                }
                walk_parameters(visitor, &method.parameters);
                visitor.visit_body(&method.body);
            }
            ClassMember::Constructor(constructor) => {
                walk_parameters(visitor, &constructor.parameters);
                visitor.visit_body(&constructor.body);
            }
        }
    }
}

pub fn walk_parameters<V: AstVisitor>(visitor: &mut V, parameters: &[FormalParameter]) {
    for parameter in parameters {
        if let Some(type_name) = &parameter.type_name {
            visitor.visit_type_name(type_name);
        }
        if let Some(default_value) = &parameter.default_value {
            visitor.visit_expression(default_value);
        }
    }
}

pub fn walk_variable_list<V: AstVisitor>(visitor: &mut V, list: &VariableList) {
    if let Some(type_name) = &list.type_name {
        visitor.visit_type_name(type_name);
    }
    for variable in &list.variables {
        if let Some(initializer) = &variable.initializer {
            visitor.visit_expression(initializer);
        }
    }
}

pub fn walk_body<V: AstVisitor>(visitor: &mut V, body: &FunctionBody) {
    match body {
        FunctionBody::Block(block) => {
            for statement in &block.statements {
                visitor.visit_statement(statement);
            }
        }
        FunctionBody::Expression { expression, .. } => visitor.visit_expression(expression),
        FunctionBody::Empty(_) | FunctionBody::Skipped(_) => {}
    }
}

pub fn walk_statement<V: AstVisitor>(visitor: &mut V, statement: &Statement) {
    match statement {
        Statement::Block(block) => {
            for statement in &block.statements {
                visitor.visit_statement(statement);
            }
        }
        Statement::Variables { variables, .. } => walk_variable_list(visitor, variables),
        Statement::Return { expression, .. } => {
            if let Some(expression) = expression {
                visitor.visit_expression(expression);
            }
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            visitor.visit_expression(condition);
            visitor.visit_statement(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_statement(else_branch);
            }
        }
        Statement::While {
            condition, body, ..
        } => {
            visitor.visit_expression(condition);
            visitor.visit_statement(body);
        }
        Statement::Expression { expression, .. } => visitor.visit_expression(expression),
        Statement::Empty { .. } => {}
    }
}

pub fn walk_expression<V: AstVisitor>(visitor: &mut V, expression: &Expression) {
    match expression {
        Expression::PropertyAccess { target, .. } => visitor.visit_expression(target),
        Expression::Invocation {
            target, arguments, ..
        } => {
            if let Some(target) = target {
                visitor.visit_expression(target);
            }
            for argument in &arguments.arguments {
                visitor.visit_expression(argument);
            }
        }
        Expression::InstanceCreation {
            type_name,
            arguments,
            ..
        } => {
            visitor.visit_type_name(type_name);
            for argument in &arguments.arguments {
                visitor.visit_expression(argument);
            }
        }
        Expression::Unary { operand, .. } => visitor.visit_expression(operand),
        Expression::Binary { left, right, .. } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
        Expression::Assignment { target, value, .. } => {
            visitor.visit_expression(target);
            visitor.visit_expression(value);
        }
        Expression::Parenthesized { expression, .. } => visitor.visit_expression(expression),
        Expression::Integer { .. }
        | Expression::Double { .. }
        | Expression::String(_)
        | Expression::Boolean { .. }
        | Expression::Null { .. }
        | Expression::Identifier(_)
        | Expression::This { .. }
        | Expression::Super { .. } => {}
    }
}
