use std::sync::Arc;

use sable_core::{AnalysisError, AnalysisException, AnalysisOptions, LineInfo, Source, SourceKind};
use sable_parser::ast::CompilationUnit;
use sable_parser::Parser;

use super::scan::ScanOutput;
use super::{guarded, Outcome};
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub modification_time: i64,
    pub unit: Arc<CompilationUnit>,
    pub line_info: LineInfo,
    /// Scanner errors followed by parser errors
    pub errors: Vec<AnalysisError>,
    pub has_library_directive: bool,
    pub has_part_of_directive: bool,
}

impl ParseOutput {
    /// A unit is a part when it says `part of` and does not also claim to
    /// be a library.
    pub fn kind(&self) -> SourceKind {
        if self.has_part_of_directive && !self.has_library_directive {
            SourceKind::Part
        } else {
            SourceKind::Library
        }
    }
}

/// Parse a scanned token stream. Having no token stream at all is a
/// failure, not an empty unit.
pub struct ParseDartTask {
    source: Source,
    scanned: Option<ScanOutput>,
    options: AnalysisOptions,
    outcome: Outcome<ParseOutput>,
}

impl ParseDartTask {
    pub fn new(source: Source, scanned: Option<ScanOutput>, options: AnalysisOptions) -> Self {
        Self {
            source,
            scanned,
            options,
            outcome: Outcome::NotPerformed,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn output(&self) -> Option<&ParseOutput> {
        self.outcome.output()
    }

    pub fn compilation_unit(&self) -> Option<&Arc<CompilationUnit>> {
        self.output().map(|output| &output.unit)
    }

    pub fn errors(&self) -> &[AnalysisError] {
        self.output().map_or(&[], |output| &output.errors)
    }

    pub fn has_library_directive(&self) -> bool {
        self.output().is_some_and(|output| output.has_library_directive)
    }

    pub fn has_part_of_directive(&self) -> bool {
        self.output().is_some_and(|output| output.has_part_of_directive)
    }

    pub fn exception(&self) -> Option<&AnalysisException> {
        self.outcome.exception()
    }

    pub fn description(&self) -> String {
        format!("parsing {}", self.source.full_name())
    }

    pub(crate) fn perform_body(&mut self) {
        self.outcome = guarded(|| self.description(), || self.internal_perform()).into();
    }

    #[tracing::instrument(skip_all, fields(source = %self.source))]
    fn internal_perform(&self) -> anyhow::Result<ParseOutput> {
        let scanned = self
            .scanned
            .as_ref()
            .ok_or_else(|| EngineError::MissingTokens(self.source.to_string()))?;
        let parsed = Parser::new(&self.source, &scanned.tokens, (&self.options).into())
            .parse_compilation_unit();

        let mut errors = scanned.errors.clone();
        errors.extend(parsed.errors);
        tracing::debug!(
            "Parsed {} with {} declarations and {} errors",
            self.source,
            parsed.unit.declarations.len(),
            errors.len()
        );
        Ok(ParseOutput {
            modification_time: scanned.modification_time,
            unit: Arc::new(parsed.unit),
            line_info: scanned.line_info.clone(),
            errors,
            has_library_directive: parsed.has_library_directive,
            has_part_of_directive: parsed.has_part_of_directive,
        })
    }

    pub(crate) fn into_outcome(self) -> Outcome<ParseOutput> {
        self.outcome
    }
}
