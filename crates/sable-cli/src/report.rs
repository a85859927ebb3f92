//! Rendering analysis results for the terminal or as JSON

use std::fmt::Write;

use anyhow::Result;
use sable_core::{AnalysisError, ErrorSeverity, LineInfo, Source};
use serde::Serialize;

/// One diagnostic with its position resolved to a line and column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub severity: ErrorSeverity,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(error: &AnalysisError, line_info: Option<&LineInfo>) -> Self {
        let (line, column) = line_info
            .map(|info| {
                let location = info.location(error.offset);
                (location.line, location.column)
            })
            .unwrap_or((1, 1));
        Self {
            file: display_name(&error.source),
            line,
            column,
            severity: error.severity(),
            code: error.code.name(),
            message: error.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub files: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    pub fn count(&self, severity: ErrorSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(ErrorSeverity::Error) > 0
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.diagnostics.iter().map(|d| d.code).collect()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for d in &self.diagnostics {
            let _ = writeln!(
                out,
                "{}:{}:{}: {}: {} [{}]",
                d.file, d.line, d.column, d.severity, d.message, d.code
            );
        }
        let _ = writeln!(
            out,
            "{} files analyzed: {} errors, {} warnings, {} hints",
            self.files,
            self.count(ErrorSeverity::Error),
            self.count(ErrorSeverity::Warning),
            self.count(ErrorSeverity::Info)
        );
        out
    }

    pub fn render_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Imports, exports and parts of one library
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryDependencies {
    pub library: String,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub parts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyReport {
    pub libraries: Vec<LibraryDependencies>,
    /// Cycles of more than one library, dependencies first
    pub cycles: Vec<Vec<String>>,
}

impl DependencyReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for library in &self.libraries {
            let _ = writeln!(out, "{}", library.library);
            for (label, sources) in [
                ("imports", &library.imports),
                ("exports", &library.exports),
                ("parts", &library.parts),
            ] {
                for source in sources {
                    let _ = writeln!(out, "  {} {}", label, source);
                }
            }
        }
        if !self.cycles.is_empty() {
            let _ = writeln!(out, "cycles:");
            for cycle in &self.cycles {
                let _ = writeln!(out, "  {}", cycle.join(" <-> "));
            }
        }
        out
    }

    pub fn render_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Filesystem path for `file:` sources, the URI otherwise
pub fn display_name(source: &Source) -> String {
    source
        .to_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| source.to_string())
}
