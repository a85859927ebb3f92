//! Library-wide hints
//!
//! Import usage can only be judged once every unit of a library has been
//! resolved, so hints are generated per library from all of its resolved
//! units at once.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use sable_core::{
    AnalysisError, ErrorReporter, HintCode, RecordingErrorListener, Source, TimestampedData,
};
use sable_parser::ast::{BinaryOperator, Block, Expression, FunctionBody, Statement};

use crate::element::{Element, LibraryElement};
use crate::error_verifier::local_declarations;
use crate::resolved::ResolvedUnit;
use crate::visitor::{self, AstVisitor};

/// Hints for every unit of a library, keyed by unit and stamped with the
/// modification time each unit was resolved at
pub type LibraryHints = HashMap<Source, TimestampedData<Vec<AnalysisError>>>;

pub struct HintGenerator<'a> {
    library: &'a LibraryElement,
    units: &'a [Arc<ResolvedUnit>],
}

impl<'a> HintGenerator<'a> {
    pub fn new(library: &'a LibraryElement, units: &'a [Arc<ResolvedUnit>]) -> Self {
        Self { library, units }
    }

    pub fn generate(&self) -> LibraryHints {
        let mut hints = LibraryHints::new();
        for unit in self.units {
            let mut listener = RecordingErrorListener::new();
            {
                let mut reporter = ErrorReporter::new(&mut listener, unit.source.clone());
                if unit.source == self.library.source {
                    self.import_hints(unit, &mut reporter);
                }
                let mut dead_code = DeadCodeVerifier {
                    reporter: &mut reporter,
                };
                visitor::walk_unit(&mut dead_code, &unit.unit);
                unused_locals(unit, &mut reporter);
            }
            tracing::trace!("{} hints in {}", listener.errors().len(), unit.source);
            hints.insert(
                unit.source.clone(),
                TimestampedData::new(unit.modification_time, listener.into_errors()),
            );
        }
        hints
    }

    fn import_hints(&self, defining: &ResolvedUnit, reporter: &mut ErrorReporter<'_>) {
        let used: BTreeSet<usize> = self
            .units
            .iter()
            .flat_map(|unit| unit.resolution.used_imports().iter().copied())
            .collect();
        let uri_span = |offset: i64| {
            defining
                .unit
                .imports()
                .find(|directive| directive.span.offset as i64 == offset)
                .map(|directive| directive.uri.span)
        };

        let mut seen = HashSet::new();
        for (index, import) in self.library.imports.iter().enumerate() {
            if import.synthetic {
                continue;
            }
            let Some(imported) = &import.imported_library else {
                continue;
            };
            let Some(span) = uri_span(import.offset) else {
                continue;
            };
            let key = (imported.clone(), import.prefix.clone(), import.combinators.clone());
            if !seen.insert(key) {
                reporter.report(span.offset, span.length, HintCode::DuplicateImport, &[]);
                continue;
            }
            let is_core = imported.uri() == sable_core::sdk::DART_CORE;
            if !is_core && !used.contains(&index) {
                reporter.report(span.offset, span.length, HintCode::UnusedImport, &[]);
            }
        }
    }
}

fn unused_locals(unit: &ResolvedUnit, reporter: &mut ErrorReporter<'_>) {
    let declarations = local_declarations(&unit.unit);
    let referenced: HashSet<_> = unit
        .resolution
        .elements()
        .filter_map(|(node, element)| match element {
            Element::LocalVariable { declaration, .. }
                if node != declaration
                    && declarations.get(declaration).is_some_and(|name| name.id != *node) =>
            {
                Some(*declaration)
            }
            _ => None,
        })
        .collect();

    let mut unused: Vec<_> = declarations
        .iter()
        .filter(|(id, name)| !referenced.contains(*id) && !name.is_synthetic())
        .map(|(_, name)| name)
        .collect();
    unused.sort_by_key(|name| name.span.offset);
    for name in unused {
        reporter.report(
            name.span.offset,
            name.span.length,
            HintCode::UnusedLocalVariable,
            &[&name.name],
        );
    }
}

/// Literal boolean value of a condition, looking through parentheses
fn literal_bool(expression: &Expression) -> Option<bool> {
    match expression.unparenthesized() {
        Expression::Boolean { value, .. } => Some(*value),
        _ => None,
    }
}

struct DeadCodeVerifier<'r, 'l> {
    reporter: &'r mut ErrorReporter<'l>,
}

impl DeadCodeVerifier<'_, '_> {
    fn report(&mut self, offset: usize, end: usize) {
        self.reporter
            .report(offset, end - offset, HintCode::DeadCode, &[]);
    }

    fn block(&mut self, block: &Block) {
        for (index, statement) in block.statements.iter().enumerate() {
            self.visit_statement(statement);
            if matches!(statement, Statement::Return { .. }) {
                let rest = &block.statements[index + 1..];
                if let (Some(first), Some(last)) = (rest.first(), rest.last()) {
                    self.report(first.span().offset, last.span().end());
                }
                return;
            }
        }
    }
}

impl AstVisitor for DeadCodeVerifier<'_, '_> {
    fn visit_body(&mut self, body: &FunctionBody) {
        match body {
            FunctionBody::Block(block) => self.block(block),
            other => visitor::walk_body(self, other),
        }
    }

    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(block) => self.block(block),
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.visit_expression(condition);
                match literal_bool(condition) {
                    Some(true) => {
                        self.visit_statement(then_branch);
                        if let Some(else_branch) = else_branch {
                            let span = else_branch.span();
                            self.report(span.offset, span.end());
                        }
                    }
                    Some(false) => {
                        let span = then_branch.span();
                        self.report(span.offset, span.end());
                        if let Some(else_branch) = else_branch {
                            self.visit_statement(else_branch);
                        }
                    }
                    None => {
                        self.visit_statement(then_branch);
                        if let Some(else_branch) = else_branch {
                            self.visit_statement(else_branch);
                        }
                    }
                }
            }
            Statement::While {
                condition, body, ..
            } if literal_bool(condition) == Some(false) => {
                self.visit_expression(condition);
                let span = body.span();
                self.report(span.offset, span.end());
            }
            _ => visitor::walk_statement(self, statement),
        }
    }

    fn visit_expression(&mut self, expression: &Expression) {
        if let Expression::Binary {
            operator,
            left,
            right,
            ..
        } = expression
        {
            let short_circuits = match operator {
                BinaryOperator::Or => literal_bool(left) == Some(true),
                BinaryOperator::And => literal_bool(left) == Some(false),
                _ => false,
            };
            if short_circuits {
                self.visit_expression(left);
                let span = right.span();
                self.report(span.offset, span.end());
                return;
            }
        }
        visitor::walk_expression(self, expression);
    }
}
