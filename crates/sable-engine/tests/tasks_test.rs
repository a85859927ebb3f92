mod common;

use std::error::Error;
use std::sync::Arc;

use common::{
    perform, perform_dependencies, perform_get_content, perform_incremental, perform_parse,
    perform_scan,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use sable_core::source::MemoryContentProvider;
use sable_core::{AnalysisOptions, SourceFactory, SourceKind, TimestampedData};
use sable_engine::task::{
    GetContentTask, IncrementalAnalysisTask, ParseDartTask, ResolveDartDependenciesTask,
    ScanDartTask, ScanInput,
};
use sable_engine::AnalysisTask;
use sable_test_fixtures::{
    app_source, codes, delivery, DeferredContentProvider, FailingContentProvider,
};

fn scan_text(name: &str, contents: &str) -> ScanDartTask {
    perform_scan(ScanDartTask::new(
        app_source(name),
        ScanInput::Content(TimestampedData::new(7, Arc::from(contents))),
        false,
    ))
}

fn parse_text(name: &str, contents: &str) -> ParseDartTask {
    let scanned = scan_text(name, contents);
    perform_parse(ParseDartTask::new(
        app_source(name),
        scanned.output().cloned(),
        AnalysisOptions::default(),
    ))
}

#[test]
fn test_part_directive_is_an_included_source() {
    let parsed = parse_text("a.dart", "library a; part 'b.dart';");
    let output = parsed.output().expect("parsed");
    assert_eq!(output.kind(), SourceKind::Library);

    let task = perform_dependencies(ResolveDartDependenciesTask::new(
        app_source("a.dart"),
        output.modification_time,
        output.unit.clone(),
        Arc::new(SourceFactory::default()),
    ));

    assert!(task.exception().is_none());
    let included: Vec<_> = task.included_sources().unwrap().iter().cloned().collect();
    assert_eq!(included, vec![app_source("b.dart")]);
    assert!(task.imported_sources().unwrap().is_empty());
    assert!(task.exported_sources().unwrap().is_empty());
}

#[test]
fn test_part_of_source_parses_as_a_part() {
    let parsed = parse_text("b.dart", "part of a;");
    assert!(parsed.has_part_of_directive());
    assert!(!parsed.has_library_directive());
    assert_eq!(parsed.output().unwrap().kind(), SourceKind::Part);
}

#[test]
fn test_scan_and_parse_keep_errors_in_pipeline_order() {
    let parsed = parse_text(
        "broken.dart",
        indoc! {"
            var s = 'unterminated;
            class {
        "},
    );
    let found = codes(parsed.errors());
    assert_eq!(found.first(), Some(&"UNTERMINATED_STRING_LITERAL"));
    assert!(found.len() > 1);
    assert!(parsed.exception().is_none());
}

#[test]
fn test_failed_fetch_leaves_scan_and_parse_empty() {
    let scanned = perform_scan(ScanDartTask::new(
        app_source("a.dart"),
        ScanInput::Provider(Arc::new(FailingContentProvider)),
        false,
    ));
    let exception = scanned.exception().expect("scan failed");
    assert_eq!(
        exception.message(),
        "IO error reading file:///app/a.dart: disk on fire"
    );
    assert!(scanned.output().is_none());
    assert!(scanned.tokens().is_none());
    assert!(scanned.line_info().is_none());
    assert!(scanned.errors().is_empty());

    let parsed = perform_parse(ParseDartTask::new(
        app_source("a.dart"),
        scanned.output().cloned(),
        AnalysisOptions::default(),
    ));
    let exception = parsed.exception().expect("parse failed");
    assert_eq!(exception.message(), "Exception while parsing file:///app/a.dart");
    assert_eq!(
        exception.source().map(|cause| cause.to_string()),
        Some("No token stream for file:///app/a.dart".to_string())
    );
    assert!(parsed.compilation_unit().is_none());
    assert!(parsed.errors().is_empty());
    assert!(!parsed.has_library_directive());
}

#[test]
fn test_failed_fetch_is_captured_on_the_content_task() {
    let task = perform_get_content(GetContentTask::new(
        app_source("a.dart"),
        Arc::new(FailingContentProvider),
    ));
    assert!(task.exception().is_some());
    assert!(task.content().is_none());
    assert!(!task.is_pending());
}

#[test]
fn test_pending_content_is_completed_by_a_delivery() {
    let provider = Arc::new(DeferredContentProvider::new(
        MemoryContentProvider::new(),
        [app_source("late.dart")],
    ));
    let mut task =
        perform_get_content(GetContentTask::new(app_source("late.dart"), provider.clone()));
    assert!(task.is_pending());
    assert!(task.content().is_none());
    assert!(task.exception().is_none());
    assert_eq!(provider.requested(), vec![app_source("late.dart")]);

    assert!(!task.complete(delivery(&app_source("other.dart"), 3, "")));
    assert!(task.is_pending());

    assert!(task.complete(delivery(&app_source("late.dart"), 3, "class Late {}")));
    let content = task.content().expect("delivered");
    assert_eq!(content.modification_time, 3);
    assert_eq!(&*content.data, "class Late {}");
}

#[test]
fn test_a_performed_task_has_exactly_one_of_result_and_exception() {
    let provider = Arc::new(MemoryContentProvider::new());
    provider.set_contents(&app_source("ok.dart"), "int x = 1;");
    let tasks = vec![
        AnalysisTask::ScanDart(ScanDartTask::new(
            app_source("ok.dart"),
            ScanInput::Provider(provider.clone()),
            false,
        )),
        AnalysisTask::ScanDart(ScanDartTask::new(
            app_source("missing.dart"),
            ScanInput::Provider(provider.clone()),
            false,
        )),
        AnalysisTask::GetContent(GetContentTask::new(app_source("ok.dart"), provider.clone())),
        AnalysisTask::GetContent(GetContentTask::new(
            app_source("missing.dart"),
            provider.clone(),
        )),
    ];

    let mut failures = 0;
    for task in tasks {
        let task = perform(task);
        let has_result = match &task {
            AnalysisTask::ScanDart(scan) => scan.output().is_some(),
            AnalysisTask::GetContent(get) => get.content().is_some(),
            other => panic!("unexpected task {:?}", other),
        };
        assert_ne!(has_result, task.exception().is_some(), "{:?}", task);
        if task.exception().is_some() {
            failures += 1;
        }
    }
    assert_eq!(failures, 2);
}

#[test]
fn test_incremental_analysis_without_a_cache_has_no_updated_unit() {
    let task = perform_incremental(IncrementalAnalysisTask::new(None));
    assert!(task.is_performed());
    assert!(task.updated_unit().is_none());
    assert!(task.exception().is_none());
    assert_eq!(task.description(), "incremental analysis without a cache");
}

#[test]
fn test_wait_for_async_is_visited_like_any_other_task() {
    let task = perform(AnalysisTask::WaitForAsync);
    assert!(matches!(task, AnalysisTask::WaitForAsync));
    assert!(task.exception().is_none());
    assert_eq!(task.description(), "waiting for async analysis");
}
