//! Performs tasks outside of a context and hands them back for inspection

#![allow(dead_code)]

use std::convert::Infallible;

use sable_engine::task::{
    BuildDartElementModelTask, GenerateDartHintsTask, GetContentTask, IncrementalAnalysisTask,
    ParseDartTask, ResolveDartDependenciesTask, ResolveDartUnitTask, ScanDartTask,
};
use sable_engine::{AnalysisTask, TaskVisitor};

/// Visitor that returns every task it is given, unchanged
pub struct Keep;

impl TaskVisitor for Keep {
    type Output = AnalysisTask;
    type Error = Infallible;

    fn visit_get_content(&mut self, task: GetContentTask) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::GetContent(task))
    }

    fn visit_scan_dart(&mut self, task: ScanDartTask) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::ScanDart(task))
    }

    fn visit_parse_dart(&mut self, task: ParseDartTask) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::ParseDart(task))
    }

    fn visit_resolve_dart_dependencies(
        &mut self,
        task: ResolveDartDependenciesTask,
    ) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::ResolveDartDependencies(task))
    }

    fn visit_build_dart_element_model(
        &mut self,
        task: BuildDartElementModelTask,
    ) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::BuildDartElementModel(task))
    }

    fn visit_resolve_dart_unit(
        &mut self,
        task: ResolveDartUnitTask,
    ) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::ResolveDartUnit(task))
    }

    fn visit_generate_dart_hints(
        &mut self,
        task: GenerateDartHintsTask,
    ) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::GenerateDartHints(task))
    }

    fn visit_incremental_analysis(
        &mut self,
        task: IncrementalAnalysisTask,
    ) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::IncrementalAnalysis(task))
    }

    fn visit_wait_for_async(&mut self) -> Result<AnalysisTask, Infallible> {
        Ok(AnalysisTask::WaitForAsync)
    }
}

pub fn perform(task: AnalysisTask) -> AnalysisTask {
    match task.perform(&mut Keep) {
        Ok(task) => task,
        Err(never) => match never {},
    }
}

pub fn perform_scan(task: ScanDartTask) -> ScanDartTask {
    match perform(AnalysisTask::ScanDart(task)) {
        AnalysisTask::ScanDart(task) => task,
        other => panic!("expected a scan task, got {:?}", other),
    }
}

pub fn perform_parse(task: ParseDartTask) -> ParseDartTask {
    match perform(AnalysisTask::ParseDart(task)) {
        AnalysisTask::ParseDart(task) => task,
        other => panic!("expected a parse task, got {:?}", other),
    }
}

pub fn perform_get_content(task: GetContentTask) -> GetContentTask {
    match perform(AnalysisTask::GetContent(task)) {
        AnalysisTask::GetContent(task) => task,
        other => panic!("expected a content task, got {:?}", other),
    }
}

pub fn perform_dependencies(task: ResolveDartDependenciesTask) -> ResolveDartDependenciesTask {
    match perform(AnalysisTask::ResolveDartDependencies(task)) {
        AnalysisTask::ResolveDartDependencies(task) => task,
        other => panic!("expected a dependencies task, got {:?}", other),
    }
}

pub fn perform_incremental(task: IncrementalAnalysisTask) -> IncrementalAnalysisTask {
    match perform(AnalysisTask::IncrementalAnalysis(task)) {
        AnalysisTask::IncrementalAnalysis(task) => task,
        other => panic!("expected an incremental task, got {:?}", other),
    }
}
