//! Compile-time constant evaluation
//!
//! Every `const` variable of a unit is evaluated once its expressions have
//! been resolved. Constants declared in the same unit are followed through
//! their initializers; anything declared elsewhere evaluates to an unknown
//! value that never produces a diagnostic.

use std::collections::{HashMap, HashSet};

use sable_core::{CompileTimeErrorCode, ErrorReporter};
use sable_parser::ast::{
    BinaryOperator, ClassMember, CompilationUnit, Declaration, Expression, FunctionBody,
    Identifier, Span, Statement, UnaryOperator, VariableList,
};

use crate::element::{ClassRef, Element};
use crate::resolved::ResolutionTable;
use crate::resolver::UnitContext;

/// Value of a constant expression
#[derive(Debug, Clone, PartialEq)]
pub enum DartObject {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    Null,
    /// Result of a `const` instance creation
    Object(ClassRef),
    /// Valid but not computed here
    Unknown,
}

impl DartObject {
    fn is_num(&self) -> bool {
        matches!(self, DartObject::Int(_) | DartObject::Double(_))
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            DartObject::Int(value) => Some(*value as f64),
            DartObject::Double(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ConstantError {
    /// The initializer reached the variable being evaluated again
    Recursive,
    Report {
        span: Span,
        code: CompileTimeErrorCode,
    },
}

impl ConstantError {
    fn at(span: Span, code: CompileTimeErrorCode) -> Self {
        ConstantError::Report { span, code }
    }
}

struct ConstDeclaration<'u> {
    name: &'u Identifier,
    initializer: Option<&'u Expression>,
}

/// Const top-level variables, static const fields and local consts, in
/// source order
fn const_declarations(unit: &CompilationUnit) -> Vec<ConstDeclaration<'_>> {
    let mut declarations = Vec::new();
    for declaration in &unit.declarations {
        match declaration {
            Declaration::Variables(variables) => {
                collect_list(&variables.variables, &mut declarations)
            }
            Declaration::Function(function) => collect_body(&function.body, &mut declarations),
            Declaration::Class(class) => {
                for member in &class.members {
                    match member {
                        ClassMember::Field(field) if field.is_static => {
                            collect_list(&field.variables, &mut declarations)
                        }
                        ClassMember::Field(_) => {}
                        ClassMember::Method(method) => {
                            collect_body(&method.body, &mut declarations)
                        }
                        ClassMember::Constructor(constructor) => {
                            collect_body(&constructor.body, &mut declarations)
                        }
                    }
                }
            }
        }
    }
    declarations
}

fn collect_list<'u>(list: &'u VariableList, declarations: &mut Vec<ConstDeclaration<'u>>) {
    if !list.is_const() {
        return;
    }
    for variable in &list.variables {
        declarations.push(ConstDeclaration {
            name: &variable.name,
            initializer: variable.initializer.as_ref(),
        });
    }
}

fn collect_body<'u>(body: &'u FunctionBody, declarations: &mut Vec<ConstDeclaration<'u>>) {
    if let FunctionBody::Block(block) = body {
        for statement in &block.statements {
            collect_statement(statement, declarations);
        }
    }
}

fn collect_statement<'u>(statement: &'u Statement, declarations: &mut Vec<ConstDeclaration<'u>>) {
    match statement {
        Statement::Variables { variables, .. } => collect_list(variables, declarations),
        Statement::Block(block) => {
            for statement in &block.statements {
                collect_statement(statement, declarations);
            }
        }
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_statement(then_branch, declarations);
            if let Some(else_branch) = else_branch {
                collect_statement(else_branch, declarations);
            }
        }
        Statement::While { body, .. } => collect_statement(body, declarations),
        Statement::Return { .. } | Statement::Expression { .. } | Statement::Empty { .. } => {}
    }
}

pub struct ConstantVerifier<'r, 'a, 'l> {
    context: &'r UnitContext<'a>,
    table: &'r ResolutionTable,
    reporter: &'r mut ErrorReporter<'l>,
}

impl<'r, 'a, 'l> ConstantVerifier<'r, 'a, 'l> {
    pub fn new(
        context: &'r UnitContext<'a>,
        table: &'r ResolutionTable,
        reporter: &'r mut ErrorReporter<'l>,
    ) -> Self {
        Self {
            context,
            table,
            reporter,
        }
    }

    pub fn verify(&mut self, unit: &CompilationUnit) {
        // Declarations are bound to their element under the name's node id.
        let declarations: Vec<(Element, ConstDeclaration<'_>)> = const_declarations(unit)
            .into_iter()
            .filter_map(|d| Some((self.table.element(d.name.id)?.clone(), d)))
            .collect();
        let initializers: HashMap<Element, &Expression> = declarations
            .iter()
            .filter_map(|(element, d)| Some((element.clone(), d.initializer?)))
            .collect();

        for (element, declaration) in &declarations {
            let Some(initializer) = declaration.initializer else {
                continue;
            };
            let mut evaluator = Evaluator {
                context: self.context,
                table: self.table,
                initializers: &initializers,
                in_progress: HashSet::from([element.clone()]),
            };
            match evaluator.evaluate(initializer) {
                Ok(value) => tracing::trace!("const {} = {:?}", declaration.name.name, value),
                Err(ConstantError::Recursive) => {
                    let span = declaration.name.span;
                    self.reporter.report(
                        span.offset,
                        span.length,
                        CompileTimeErrorCode::RecursiveCompileTimeConstant,
                        &[],
                    );
                }
                Err(ConstantError::Report { span, code }) => {
                    self.reporter.report(span.offset, span.length, code, &[])
                }
            }
        }
    }
}

struct Evaluator<'e, 'a, 'u> {
    context: &'e UnitContext<'a>,
    table: &'e ResolutionTable,
    initializers: &'e HashMap<Element, &'u Expression>,
    in_progress: HashSet<Element>,
}

impl Evaluator<'_, '_, '_> {
    fn evaluate(&mut self, expression: &Expression) -> Result<DartObject, ConstantError> {
        let non_constant = || {
            ConstantError::at(
                expression.span(),
                CompileTimeErrorCode::ConstInitializedWithNonConstantValue,
            )
        };
        match expression {
            Expression::Integer { value, .. } => Ok(DartObject::Int(*value)),
            Expression::Double { value, .. } => Ok(DartObject::Double(*value)),
            Expression::Boolean { value, .. } => Ok(DartObject::Bool(*value)),
            Expression::Null { .. } => Ok(DartObject::Null),
            Expression::String(literal) if literal.interpolated => Ok(DartObject::Unknown),
            Expression::String(literal) => Ok(DartObject::String(literal.value.clone())),
            Expression::Parenthesized { expression, .. } => self.evaluate(expression),
            Expression::Identifier(_) | Expression::PropertyAccess { .. } => {
                match self.table.element(expression.id()).cloned() {
                    Some(element) => self.variable(&element, expression),
                    None => Ok(DartObject::Unknown),
                }
            }
            Expression::InstanceCreation {
                is_const: true,
                type_name,
                arguments,
                ..
            } => {
                for argument in &arguments.arguments {
                    self.evaluate(argument)?;
                }
                Ok(match self.table.element(type_name.id) {
                    Some(Element::Class(class)) => DartObject::Object(class.clone()),
                    _ => DartObject::Unknown,
                })
            }
            Expression::InstanceCreation { .. }
            | Expression::Invocation { .. }
            | Expression::Assignment { .. }
            | Expression::This { .. }
            | Expression::Super { .. } => Err(non_constant()),
            Expression::Unary {
                operator, operand, ..
            } => {
                let value = self.evaluate(operand)?;
                match (operator, value) {
                    (UnaryOperator::Not, DartObject::Bool(value)) => Ok(DartObject::Bool(!value)),
                    (UnaryOperator::Negate, DartObject::Int(value)) => {
                        Ok(DartObject::Int(value.wrapping_neg()))
                    }
                    (UnaryOperator::Negate, DartObject::Double(value)) => {
                        Ok(DartObject::Double(-value))
                    }
                    (_, DartObject::Unknown) | (UnaryOperator::Not, _) => Ok(DartObject::Unknown),
                    (UnaryOperator::Negate, _) => Err(ConstantError::at(
                        expression.span(),
                        CompileTimeErrorCode::ConstEvalTypeNum,
                    )),
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
                span,
                ..
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(*operator, left, right, *span)
            }
        }
    }

    /// Value of a referenced variable; only constants are allowed
    fn variable(
        &mut self,
        element: &Element,
        expression: &Expression,
    ) -> Result<DartObject, ConstantError> {
        let non_constant = ConstantError::at(
            expression.span(),
            CompileTimeErrorCode::ConstInitializedWithNonConstantValue,
        );
        if self.in_progress.contains(element) {
            return Err(ConstantError::Recursive);
        }
        if let Some(initializer) = self.initializers.get(element).copied() {
            self.in_progress.insert(element.clone());
            let value = self.evaluate(initializer);
            self.in_progress.remove(element);
            return match value {
                Err(ConstantError::Recursive) => Err(ConstantError::Recursive),
                // The referenced declaration reports its own errors.
                Err(ConstantError::Report { .. }) => Ok(DartObject::Unknown),
                Ok(value) => Ok(value),
            };
        }
        let lookup = self.context.lookup;
        let is_const = match element {
            Element::TopLevelVariable(variable) => lookup
                .top_level_variable(variable)
                .is_some_and(|variable| variable.is_const),
            Element::Field(field) => lookup
                .class(&field.class)
                .and_then(|class| class.field(&field.name))
                .is_some_and(|field| field.is_const && field.is_static),
            Element::Class(_) | Element::Function(_) | Element::Prefix(_) => true,
            Element::Library(_)
            | Element::Method(_)
            | Element::Constructor(_)
            | Element::Parameter { .. }
            | Element::LocalVariable { .. } => false,
        };
        if is_const {
            Ok(DartObject::Unknown)
        } else {
            Err(non_constant)
        }
    }
}

fn binary(
    operator: BinaryOperator,
    left: DartObject,
    right: DartObject,
    span: Span,
) -> Result<DartObject, ConstantError> {
    use DartObject::*;

    let type_num = || ConstantError::at(span, CompileTimeErrorCode::ConstEvalTypeNum);
    let throws = || ConstantError::at(span, CompileTimeErrorCode::ConstEvalThrowsException);
    match operator {
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            let equal = match (&left, &right) {
                (Unknown, _) | (_, Unknown) | (Object(_), _) | (_, Object(_)) => {
                    return Ok(Unknown)
                }
                (Int(_) | Double(_), Int(_) | Double(_)) => left.as_double() == right.as_double(),
                _ => left == right,
            };
            Ok(Bool(equal == (operator == BinaryOperator::Equal)))
        }
        BinaryOperator::And | BinaryOperator::Or => match (left, right) {
            (Bool(l), Bool(r)) if operator == BinaryOperator::And => Ok(Bool(l && r)),
            (Bool(l), Bool(r)) => Ok(Bool(l || r)),
            _ => Ok(Unknown),
        },
        BinaryOperator::Add if matches!((&left, &right), (String(_), String(_))) => {
            match (left, right) {
                (String(l), String(r)) => Ok(String(l + &r)),
                _ => Ok(Unknown),
            }
        }
        _ => {
            let known_non_num = |value: &DartObject| !value.is_num() && *value != Unknown;
            if known_non_num(&left) || known_non_num(&right) {
                return Err(type_num());
            }
            match (left, right) {
                (Int(l), Int(r)) => integer(operator, l, r).ok_or_else(throws),
                (l, r) => match (l.as_double(), r.as_double()) {
                    (Some(l), Some(r)) => double(operator, l, r).ok_or_else(throws),
                    _ => Ok(Unknown),
                },
            }
        }
    }
}

/// `None` when the operation throws at run time
fn integer(operator: BinaryOperator, l: i64, r: i64) -> Option<DartObject> {
    use DartObject::*;

    Some(match operator {
        BinaryOperator::Add => Int(l.wrapping_add(r)),
        BinaryOperator::Subtract => Int(l.wrapping_sub(r)),
        BinaryOperator::Multiply => Int(l.wrapping_mul(r)),
        BinaryOperator::Divide => Double(l as f64 / r as f64),
        BinaryOperator::IntegerDivide => Int(l.checked_div(r)?),
        BinaryOperator::Modulo => Int(l.checked_rem_euclid(r)?),
        BinaryOperator::Less => Bool(l < r),
        BinaryOperator::Greater => Bool(l > r),
        BinaryOperator::LessEqual => Bool(l <= r),
        BinaryOperator::GreaterEqual => Bool(l >= r),
        BinaryOperator::Or
        | BinaryOperator::And
        | BinaryOperator::Equal
        | BinaryOperator::NotEqual => Unknown,
    })
}

fn double(operator: BinaryOperator, l: f64, r: f64) -> Option<DartObject> {
    use DartObject::*;

    Some(match operator {
        BinaryOperator::Add => Double(l + r),
        BinaryOperator::Subtract => Double(l - r),
        BinaryOperator::Multiply => Double(l * r),
        BinaryOperator::Divide => Double(l / r),
        BinaryOperator::IntegerDivide => {
            let quotient = (l / r).trunc();
            if !quotient.is_finite() {
                return None;
            }
            Int(quotient as i64)
        }
        BinaryOperator::Modulo if r == 0.0 => return None,
        BinaryOperator::Modulo => {
            let remainder = l % r;
            Double(if remainder < 0.0 {
                remainder + r.abs()
            } else {
                remainder
            })
        }
        BinaryOperator::Less => Bool(l < r),
        BinaryOperator::Greater => Bool(l > r),
        BinaryOperator::LessEqual => Bool(l <= r),
        BinaryOperator::GreaterEqual => Bool(l >= r),
        BinaryOperator::Or
        | BinaryOperator::And
        | BinaryOperator::Equal
        | BinaryOperator::NotEqual => Unknown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(operator: BinaryOperator, left: DartObject, right: DartObject) -> DartObject {
        binary(operator, left, right, Span::new(0, 1)).unwrap()
    }

    fn error(
        operator: BinaryOperator,
        left: DartObject,
        right: DartObject,
    ) -> CompileTimeErrorCode {
        match binary(operator, left, right, Span::new(0, 1)) {
            Err(ConstantError::Report { code, .. }) => code,
            other => panic!("expected an error, got {other:?}"),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        use DartObject::*;
        assert_eq!(eval(BinaryOperator::Add, Int(1), Int(2)), Int(3));
        assert_eq!(eval(BinaryOperator::Divide, Int(1), Int(2)), Double(0.5));
        assert_eq!(eval(BinaryOperator::IntegerDivide, Int(7), Int(2)), Int(3));
        assert_eq!(eval(BinaryOperator::Modulo, Int(-7), Int(3)), Int(2));
        assert_eq!(eval(BinaryOperator::Less, Int(1), Double(1.5)), Bool(true));
    }

    #[test]
    fn test_division_by_zero() {
        use DartObject::*;
        assert_eq!(
            error(BinaryOperator::IntegerDivide, Int(1), Int(0)),
            CompileTimeErrorCode::ConstEvalThrowsException
        );
        assert_eq!(
            error(BinaryOperator::Modulo, Int(1), Int(0)),
            CompileTimeErrorCode::ConstEvalThrowsException
        );
        assert_eq!(
            eval(BinaryOperator::Divide, Int(1), Int(0)),
            Double(f64::INFINITY)
        );
    }

    #[test]
    fn test_operand_types() {
        use DartObject::*;
        assert_eq!(
            error(BinaryOperator::Subtract, String("a".into()), Int(1)),
            CompileTimeErrorCode::ConstEvalTypeNum
        );
        assert_eq!(
            eval(BinaryOperator::Add, String("a".into()), String("b".into())),
            String("ab".into())
        );
        assert_eq!(eval(BinaryOperator::Multiply, Unknown, Int(2)), Unknown);
        assert_eq!(eval(BinaryOperator::Equal, Int(1), Double(1.0)), Bool(true));
    }
}
