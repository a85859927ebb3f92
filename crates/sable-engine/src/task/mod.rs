//! Units of analysis work
//!
//! A task is built with all of its inputs, performed once through
//! [`AnalysisTask::perform`], and then handed to a [`TaskVisitor`] which
//! applies its results. Performing never fails: whatever the task body
//! raises, including a panic, is captured on the task as an
//! [`AnalysisException`] and the visitor is still called exactly once. Only
//! an error returned by the visitor itself comes back out of `perform`.
//!
//! [`GetContentTask`] is the one exception to "performed once": when its
//! content is delivered later, the completed task is offered to the visitor
//! again.

mod dependencies;
mod element_model;
mod get_content;
mod hints;
mod incremental;
mod parse;
mod resolve_unit;
mod scan;

pub use dependencies::ResolveDartDependenciesTask;
pub use element_model::{BuildDartElementModelTask, DirectiveSnapshot, ElementModel};
pub use get_content::GetContentTask;
pub use hints::GenerateDartHintsTask;
pub use incremental::IncrementalAnalysisTask;
pub use parse::{ParseDartTask, ParseOutput};
pub use resolve_unit::{ResolveDartUnitTask, UnitResolution};
pub use scan::{ScanDartTask, ScanInput, ScanOutput};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use sable_core::AnalysisException;

use crate::error::EngineError;

/// What a task body left behind
#[derive(Debug, Clone, Default)]
pub(crate) enum Outcome<T> {
    #[default]
    NotPerformed,
    Completed(T),
    Failed(AnalysisException),
}

impl<T> Outcome<T> {
    pub(crate) fn output(&self) -> Option<&T> {
        match self {
            Outcome::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub(crate) fn exception(&self) -> Option<&AnalysisException> {
        match self {
            Outcome::Failed(exception) => Some(exception),
            _ => None,
        }
    }

    pub(crate) fn is_performed(&self) -> bool {
        !matches!(self, Outcome::NotPerformed)
    }

    pub(crate) fn into_result(
        self,
        description: impl FnOnce() -> String,
    ) -> Result<Result<T, AnalysisException>, EngineError> {
        match self {
            Outcome::Completed(output) => Ok(Ok(output)),
            Outcome::Failed(exception) => Ok(Err(exception)),
            Outcome::NotPerformed => Err(EngineError::TaskNotPerformed(description())),
        }
    }
}

impl<T> From<Result<T, AnalysisException>> for Outcome<T> {
    fn from(result: Result<T, AnalysisException>) -> Self {
        match result {
            Ok(output) => Outcome::Completed(output),
            Err(exception) => Outcome::Failed(exception),
        }
    }
}

/// Run a task body, turning every failure it raises into an
/// [`AnalysisException`]. An exception raised by the body is kept as is;
/// any other error or panic is wrapped with the original as its cause.
pub(crate) fn guarded<T>(
    description: impl FnOnce() -> String,
    body: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, AnalysisException> {
    let exception = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(output)) => return Ok(output),
        Ok(Err(error)) => match error.downcast::<AnalysisException>() {
            Ok(exception) => exception,
            Err(error) => AnalysisException::with_boxed_cause(
                format!("Exception while {}", description()),
                error.into(),
            ),
        },
        Err(payload) => AnalysisException::with_cause(
            format!("Exception while {}", description()),
            EngineError::Panic(panic_message(payload.as_ref())),
        ),
    };
    tracing::info!("Task failed: {}", exception);
    Err(exception)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Applies the result of each kind of task. Adding a task kind means adding
/// a method here, so every visitor has to handle it.
pub trait TaskVisitor {
    type Output;
    type Error;

    fn visit_get_content(&mut self, task: GetContentTask) -> Result<Self::Output, Self::Error>;

    fn visit_scan_dart(&mut self, task: ScanDartTask) -> Result<Self::Output, Self::Error>;

    fn visit_parse_dart(&mut self, task: ParseDartTask) -> Result<Self::Output, Self::Error>;

    fn visit_resolve_dart_dependencies(
        &mut self,
        task: ResolveDartDependenciesTask,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_build_dart_element_model(
        &mut self,
        task: BuildDartElementModelTask,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_resolve_dart_unit(
        &mut self,
        task: ResolveDartUnitTask,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_generate_dart_hints(
        &mut self,
        task: GenerateDartHintsTask,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_incremental_analysis(
        &mut self,
        task: IncrementalAnalysisTask,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_wait_for_async(&mut self) -> Result<Self::Output, Self::Error>;
}

pub enum AnalysisTask {
    GetContent(GetContentTask),
    ScanDart(ScanDartTask),
    ParseDart(ParseDartTask),
    ResolveDartDependencies(ResolveDartDependenciesTask),
    BuildDartElementModel(BuildDartElementModelTask),
    ResolveDartUnit(ResolveDartUnitTask),
    GenerateDartHints(GenerateDartHintsTask),
    IncrementalAnalysis(IncrementalAnalysisTask),
    /// Nothing can run until outstanding content arrives
    WaitForAsync,
}

impl AnalysisTask {
    pub fn description(&self) -> String {
        match self {
            AnalysisTask::GetContent(task) => task.description(),
            AnalysisTask::ScanDart(task) => task.description(),
            AnalysisTask::ParseDart(task) => task.description(),
            AnalysisTask::ResolveDartDependencies(task) => task.description(),
            AnalysisTask::BuildDartElementModel(task) => task.description(),
            AnalysisTask::ResolveDartUnit(task) => task.description(),
            AnalysisTask::GenerateDartHints(task) => task.description(),
            AnalysisTask::IncrementalAnalysis(task) => task.description(),
            AnalysisTask::WaitForAsync => "waiting for async analysis".to_string(),
        }
    }

    /// The failure captured while performing, if any
    pub fn exception(&self) -> Option<&AnalysisException> {
        match self {
            AnalysisTask::GetContent(task) => task.exception(),
            AnalysisTask::ScanDart(task) => task.exception(),
            AnalysisTask::ParseDart(task) => task.exception(),
            AnalysisTask::ResolveDartDependencies(task) => task.exception(),
            AnalysisTask::BuildDartElementModel(task) => task.exception(),
            AnalysisTask::ResolveDartUnit(task) => task.exception(),
            AnalysisTask::GenerateDartHints(task) => task.exception(),
            AnalysisTask::IncrementalAnalysis(task) => task.exception(),
            AnalysisTask::WaitForAsync => None,
        }
    }

    /// Run the task body and dispatch the task to `visitor`.
    pub fn perform<V: TaskVisitor>(mut self, visitor: &mut V) -> Result<V::Output, V::Error> {
        match &mut self {
            AnalysisTask::GetContent(task) => task.perform_body(),
            AnalysisTask::ScanDart(task) => task.perform_body(),
            AnalysisTask::ParseDart(task) => task.perform_body(),
            AnalysisTask::ResolveDartDependencies(task) => task.perform_body(),
            AnalysisTask::BuildDartElementModel(task) => task.perform_body(),
            AnalysisTask::ResolveDartUnit(task) => task.perform_body(),
            AnalysisTask::GenerateDartHints(task) => task.perform_body(),
            AnalysisTask::IncrementalAnalysis(task) => task.perform_body(),
            AnalysisTask::WaitForAsync => {}
        }
        self.accept(visitor)
    }

    pub fn accept<V: TaskVisitor>(self, visitor: &mut V) -> Result<V::Output, V::Error> {
        match self {
            AnalysisTask::GetContent(task) => visitor.visit_get_content(task),
            AnalysisTask::ScanDart(task) => visitor.visit_scan_dart(task),
            AnalysisTask::ParseDart(task) => visitor.visit_parse_dart(task),
            AnalysisTask::ResolveDartDependencies(task) => {
                visitor.visit_resolve_dart_dependencies(task)
            }
            AnalysisTask::BuildDartElementModel(task) => {
                visitor.visit_build_dart_element_model(task)
            }
            AnalysisTask::ResolveDartUnit(task) => visitor.visit_resolve_dart_unit(task),
            AnalysisTask::GenerateDartHints(task) => visitor.visit_generate_dart_hints(task),
            AnalysisTask::IncrementalAnalysis(task) => visitor.visit_incremental_analysis(task),
            AnalysisTask::WaitForAsync => visitor.visit_wait_for_async(),
        }
    }
}

impl std::fmt::Debug for AnalysisTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnalysisTask({})", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_guarded_passes_analysis_exceptions_through() {
        let result: Result<(), _> = guarded(
            || "testing".to_string(),
            || Err(AnalysisException::new("content missing").into()),
        );
        let exception = result.unwrap_err();
        assert_eq!(exception.message(), "content missing");
        assert!(exception.cause().is_none());
    }

    #[test]
    fn test_guarded_wraps_other_errors_with_cause() {
        let result: Result<(), _> = guarded(
            || "parsing x.dart".to_string(),
            || Err(EngineError::MissingTokens("x.dart".to_string()).into()),
        );
        let exception = result.unwrap_err();
        assert_eq!(exception.message(), "Exception while parsing x.dart");
        assert_eq!(
            exception.source().map(|cause| cause.to_string()),
            Some("No token stream for x.dart".to_string())
        );
    }

    #[test]
    fn test_guarded_captures_panics() {
        let result: Result<(), _> = guarded(
            || "resolving".to_string(),
            || -> anyhow::Result<()> { panic!("index out of range") },
        );
        let exception = result.unwrap_err();
        assert_eq!(
            exception.to_string(),
            "Exception while resolving: Task panicked: index out of range"
        );
    }

    #[test]
    fn test_description_is_not_built_on_success() {
        let result = guarded(|| unreachable!("only needed for failures"), || Ok(5));
        assert_eq!(result.unwrap(), 5);
    }
}
