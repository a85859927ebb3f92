use std::sync::Arc;

use pretty_assertions::assert_eq;
use sable_core::TimestampedData;
use sable_engine::task::{ScanDartTask, ScanInput};
use sable_engine::{AnalysisContext, AnalysisTask, CachedValue, ChangeSet};
use sable_test_fixtures::{app_source, codes, Workspace};

const MAIN: &str = "import 'util.dart';\nvoid main() {\n  print(twice(2));\n}\n";
const UTIL: &str = "int twice(int value) => value * 2;\n";

fn analyzed() -> AnalysisContext {
    let mut context = Workspace::new()
        .file("main.dart", MAIN)
        .file("util.dart", UTIL)
        .file("other.dart", "class Other {}\n")
        .context();
    context.run_until_idle().unwrap();
    context
}

/// Descriptions of every task performed until analysis completes
fn drain(context: &mut AnalysisContext) -> Vec<String> {
    let mut tasks = Vec::new();
    while let Some(task) = context.perform_analysis_task().unwrap().task {
        tasks.push(task);
    }
    tasks
}

#[test]
fn test_identical_edit_reuses_the_resolved_unit() {
    let mut context = analyzed();
    let main = app_source("main.dart");
    let before = context.resolved_unit(&main).unwrap();

    context.set_changed_contents(&main, MAIN, 20, 0, 0);
    let tasks = drain(&mut context);

    assert!(tasks.contains(&"incremental analysis of file:///app/main.dart".to_string()));
    assert!(!tasks.iter().any(|task| task == "parsing file:///app/main.dart"));
    assert!(!tasks.iter().any(|task| task.starts_with("resolving file:///app/main.dart")));

    let after = context.resolved_unit(&main).unwrap();
    assert!(Arc::ptr_eq(&before.unit, &after.unit));
    assert!(after.modification_time > before.modification_time);
    assert_eq!(
        Some(after.modification_time),
        context.cache().read(&main, |entry| entry.modification_time)
    );
    assert!(context.library_element(&main).is_some());
    assert_eq!(codes(&context.compute_errors(&main).unwrap()), Vec::<&str>::new());
}

#[test]
fn test_real_edit_falls_back_to_full_analysis() {
    let mut context = analyzed();
    let main = app_source("main.dart");
    let before = context.resolved_unit(&main).unwrap();

    let edited = "import 'util.dart';\nvoid main() {\n  print(twice(3));\n}\n";
    context.set_changed_contents(&main, edited, 35, 1, 1);
    let tasks = drain(&mut context);

    assert!(tasks.contains(&"incremental analysis of file:///app/main.dart".to_string()));
    assert!(tasks.contains(&"parsing file:///app/main.dart".to_string()));
    let after = context.resolved_unit(&main).unwrap();
    assert!(!Arc::ptr_eq(&before.unit, &after.unit));
    assert_ne!(before.unit, after.unit);
}

#[test]
fn test_edit_without_incremental_option_skips_the_fast_path() {
    let mut context = Workspace::new()
        .with_options(sable_core::AnalysisOptions {
            incremental: false,
            ..Default::default()
        })
        .file("main.dart", MAIN)
        .file("util.dart", UTIL)
        .context();
    context.run_until_idle().unwrap();
    let main = app_source("main.dart");

    context.set_changed_contents(&main, MAIN, 0, 0, 0);
    let tasks = drain(&mut context);
    assert!(!tasks.iter().any(|task| task.starts_with("incremental analysis")));
    assert!(tasks.contains(&"parsing file:///app/main.dart".to_string()));
}

#[test]
fn test_change_invalidates_every_dependent_library() {
    let mut context = analyzed();
    let main = app_source("main.dart");
    let util = app_source("util.dart");
    let other = app_source("other.dart");

    context.set_contents(&util, Some("int twice(int value) => value * 3;\n"));
    assert!(context.library_element(&util).is_none());
    assert!(context.library_element(&main).is_none());
    assert!(context.resolved_unit(&main).is_none());
    assert!(context.library_element(&other).is_some());
    assert!(context.dependencies(&main).is_some());

    drain(&mut context);
    assert!(context.library_element(&util).is_some());
    assert!(context.library_element(&main).is_some());
    assert_eq!(codes(&context.compute_errors(&main).unwrap()), Vec::<&str>::new());
}

#[test]
fn test_dropping_an_overlay_goes_back_to_the_provider() {
    let mut context = analyzed();
    let util = app_source("util.dart");

    context.set_contents(&util, Some("int thrice(int value) => value * 3;\n"));
    let main = app_source("main.dart");
    assert_eq!(
        codes(&context.compute_errors(&main).unwrap()),
        vec!["UNDEFINED_FUNCTION", "UNUSED_IMPORT"]
    );

    context.set_contents(&util, None);
    assert_eq!(codes(&context.compute_errors(&main).unwrap()), Vec::<&str>::new());
}

#[test]
fn test_removed_source_leaves_the_context() {
    let mut context = analyzed();
    let other = app_source("other.dart");
    assert!(context.roots().any(|root| root == &other));

    context.apply_changes(ChangeSet::new().removed(other.clone()));
    assert!(!context.cache().contains(&other));
    assert!(!context.roots().any(|root| root == &other));
    assert!(context.run_until_idle().is_ok());
    assert!(!context.cache().contains(&other));
}

#[test]
fn test_stale_results_are_discarded() {
    let mut context = analyzed();
    let main = app_source("main.dart");
    let time = context
        .cache()
        .read(&main, |entry| entry.modification_time)
        .unwrap();

    let stale = ScanDartTask::new(
        main.clone(),
        ScanInput::Content(TimestampedData::new(time + 100, Arc::from("class Stale {}"))),
        false,
    );
    let result = context.perform_task(AnalysisTask::ScanDart(stale)).unwrap();
    assert!(result.changed.is_empty());
    assert!(matches!(
        context.cache().read(&main, |entry| entry.scan.clone()),
        Some(CachedValue::Flushed)
    ));

    let current = ScanDartTask::new(
        main.clone(),
        ScanInput::Content(TimestampedData::new(time, Arc::from(MAIN))),
        false,
    );
    let result = context.perform_task(AnalysisTask::ScanDart(current)).unwrap();
    assert_eq!(result.changed, vec![main.clone()]);
    assert!(context.cache().read(&main, |entry| entry.scan.is_valid()).unwrap());
}
