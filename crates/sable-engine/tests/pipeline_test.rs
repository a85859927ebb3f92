use std::sync::Arc;

use indoc::indoc;
use pretty_assertions::assert_eq;
use sable_core::{
    AnalysisOptions, CompileTimeErrorCode, DartSdk, ErrorCode, ErrorType, SourceKind,
    StaticWarningCode,
};
use sable_engine::{ChangeSet, EngineError, Progress};
use sable_test_fixtures::{app_source, codes, Workspace};

fn without_hints() -> AnalysisOptions {
    AnalysisOptions {
        hint: false,
        ..AnalysisOptions::default()
    }
}

#[test]
fn test_library_and_part_are_analyzed_together() {
    let workspace = Workspace::new()
        .file("a.dart", "library a; part 'b.dart';")
        .file("b.dart", "part of a;");
    let mut context = workspace.context();
    assert_eq!(context.run_until_idle().unwrap(), Progress::Complete);

    let a = app_source("a.dart");
    let b = app_source("b.dart");
    let dependencies = context.dependencies(&a).expect("dependencies");
    assert_eq!(dependencies.included.iter().collect::<Vec<_>>(), vec![&b]);
    assert!(dependencies.imported.is_empty());
    assert!(dependencies.exported.is_empty());

    assert_eq!(context.compute_kind_of(&a).unwrap(), SourceKind::Library);
    assert_eq!(context.compute_kind_of(&b).unwrap(), SourceKind::Part);

    let library = context.compute_library_element(&a).unwrap();
    assert_eq!(library.name, "a");
    assert_eq!(library.parts.len(), 1);
    assert_eq!(library.parts[0].source, b);
    assert!(matches!(
        context.compute_library_element(&b),
        Err(EngineError::NotALibrary(_))
    ));

    let resolved = context.resolve_compilation_unit(&b, &a).unwrap();
    assert_eq!(resolved.library, a);
    assert_eq!(codes(&context.compute_errors(&a).unwrap()), Vec::<&str>::new());
    assert_eq!(codes(&context.compute_errors(&b).unwrap()), Vec::<&str>::new());
}

#[test]
fn test_mutually_importing_libraries_form_one_cycle() {
    let workspace = Workspace::new()
        .with_options(without_hints())
        .file("x.dart", "import 'y.dart';\nclass X {\n  Y y;\n}\n")
        .file("y.dart", "import 'x.dart';\nclass Y {\n  X x;\n}\n");
    let mut context = workspace.context();
    context.run_until_idle().unwrap();

    let x = app_source("x.dart");
    let y = app_source("y.dart");
    let cycles = context.library_cycles();
    assert!(cycles.contains(&vec![x.clone(), y.clone()]), "{:?}", cycles);
    let core_position = cycles
        .iter()
        .position(|cycle| cycle == &vec![DartSdk::core_source()])
        .unwrap();
    let cycle_position = cycles.iter().position(|cycle| cycle.contains(&x)).unwrap();
    assert!(core_position < cycle_position);

    let x_element = context.library_element(&x).unwrap();
    let y_element = context.library_element(&y).unwrap();
    assert_eq!(x_element.imports[0].imported_library.as_ref(), Some(&y));
    assert_eq!(y_element.imports[0].imported_library.as_ref(), Some(&x));
    assert!(x_element.class("X").is_some());
    assert!(y_element.class("Y").is_some());

    assert_eq!(codes(&context.compute_errors(&x).unwrap()), Vec::<&str>::new());
    assert_eq!(codes(&context.compute_errors(&y).unwrap()), Vec::<&str>::new());
}

#[test]
fn test_every_library_imports_core() {
    let workspace = Workspace::new().file("main.dart", "void main() {}");
    let mut context = workspace.context();
    let main = app_source("main.dart");

    let library = context.compute_library_element(&main).unwrap();
    assert_eq!(library.imports.len(), 1);
    assert!(library.imports[0].synthetic);
    assert_eq!(
        library.imports[0].imported_library,
        Some(DartSdk::core_source())
    );
    assert_eq!(
        library.entry_point.as_ref().map(|entry| entry.name.as_str()),
        Some("main")
    );
}

#[test]
fn test_importing_a_part_is_an_error() {
    let workspace = Workspace::new()
        .with_options(without_hints())
        .file("main.dart", "import 'piece.dart';\nvoid main() {}\n")
        .file("piece.dart", "part of other;");
    let mut context = workspace.context();
    let main = app_source("main.dart");

    let errors = context.compute_errors(&main).unwrap();
    assert_eq!(codes(&errors), vec!["IMPORT_OF_NON_LIBRARY"]);
    assert_eq!(
        errors[0].code,
        ErrorCode::CompileTime(CompileTimeErrorCode::ImportOfNonLibrary)
    );
    assert_eq!(errors[0].error_type(), ErrorType::CompileTimeError);
    assert_eq!(
        errors[0].message,
        "The imported library 'piece.dart' must not have a part-of directive"
    );
}

#[test]
fn test_deferred_import_of_a_part_is_a_warning() {
    let workspace = Workspace::new()
        .with_options(without_hints())
        .file("main.dart", "import 'piece.dart' deferred as piece;\nvoid main() {}\n")
        .file("piece.dart", "part of other;");
    let mut context = workspace.context();

    let errors = context.compute_errors(&app_source("main.dart")).unwrap();
    assert_eq!(codes(&errors), vec!["IMPORT_OF_NON_LIBRARY"]);
    assert_eq!(
        errors[0].code,
        ErrorCode::StaticWarning(StaticWarningCode::ImportOfNonLibrary)
    );
    assert_eq!(errors[0].error_type(), ErrorType::StaticWarning);
    assert_eq!(
        errors[0].message,
        "The imported library 'piece.dart' must not have a part-of directive"
    );
}

#[test]
fn test_exporting_a_part_is_an_error() {
    let workspace = Workspace::new()
        .with_options(without_hints())
        .file("main.dart", "export 'piece.dart';\nvoid main() {}\n")
        .file("piece.dart", "part of other;");
    let mut context = workspace.context();

    let errors = context.compute_errors(&app_source("main.dart")).unwrap();
    assert_eq!(codes(&errors), vec!["EXPORT_OF_NON_LIBRARY"]);
    assert_eq!(
        errors[0].code,
        ErrorCode::CompileTime(CompileTimeErrorCode::ExportOfNonLibrary)
    );
    assert_eq!(errors[0].error_type(), ErrorType::CompileTimeError);
    assert_eq!(
        errors[0].message,
        "The exported library 'piece.dart' must not have a part-of directive"
    );
}

#[test]
fn test_missing_import_target_is_reported() {
    let workspace = Workspace::new()
        .with_options(without_hints())
        .file("main.dart", "import 'gone.dart';\nvoid main() {}\n");
    let mut context = workspace.context();
    let main = app_source("main.dart");
    let gone = app_source("gone.dart");

    assert_eq!(
        codes(&context.compute_errors(&main).unwrap()),
        vec!["URI_DOES_NOT_EXIST"]
    );
    assert_eq!(context.compute_kind_of(&gone).unwrap(), SourceKind::Unknown);
    assert!(matches!(
        context.compute_library_element(&gone),
        Err(EngineError::NotALibrary(_))
    ));
    assert!(matches!(
        context.parse_compilation_unit(&gone),
        Err(EngineError::Analysis { .. })
    ));
}

#[test]
fn test_resolution_errors_are_part_of_the_source_errors() {
    let workspace = Workspace::new().with_options(without_hints()).file(
        "main.dart",
        indoc! {"
            void main() {
              undefinedFunction();
            }
        "},
    );
    let mut context = workspace.context();
    let main = app_source("main.dart");

    assert_eq!(
        codes(&context.compute_errors(&main).unwrap()),
        vec!["UNDEFINED_FUNCTION"]
    );
    let line_info = context.compute_line_info(&main).unwrap();
    let error = &context.errors(&main)[0];
    assert_eq!(line_info.location(error.offset).line, 2);
}

#[test]
fn test_unused_import_is_hinted_only_when_hints_are_enabled() {
    let contents = "import 'dart:math';\nvoid main() {}\n";
    let main = app_source("main.dart");

    let mut context = Workspace::new().file("main.dart", contents).context();
    assert_eq!(
        codes(&context.compute_hints(&main).unwrap()),
        vec!["UNUSED_IMPORT"]
    );
    assert_eq!(
        codes(&context.compute_errors(&main).unwrap()),
        vec!["UNUSED_IMPORT"]
    );
    let hints = context.library_hints(&main).unwrap();
    assert_eq!(hints.len(), 1);
    assert_eq!(
        hints[&main].modification_time,
        context.cache().read(&main, |entry| entry.modification_time).unwrap()
    );

    let mut context = Workspace::new()
        .with_options(without_hints())
        .file("main.dart", contents)
        .context();
    assert!(context.compute_hints(&main).unwrap().is_empty());
    assert!(context.compute_errors(&main).unwrap().is_empty());
}

#[test]
fn test_rebuilding_an_unchanged_library_gives_an_equal_element() {
    let workspace = Workspace::new()
        .file("util.dart", "int twice(int value) => value * 2;")
        .file(
            "main.dart",
            "import 'util.dart';\nvoid main() {\n  print(twice(2));\n}\n",
        );
    let mut context = workspace.context();
    let main = app_source("main.dart");
    let before = context.compute_library_element(&main).unwrap();
    let hints_before = context.compute_hints(&main).unwrap();

    context.apply_changes(ChangeSet::new().changed(main.clone()));
    assert!(context.library_element(&main).is_none());
    let after = context.compute_library_element(&main).unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(*before, *after);
    assert_eq!(context.compute_hints(&main).unwrap(), hints_before);
}

#[test]
fn test_tasks_run_in_pipeline_order() {
    let workspace = Workspace::new().file("main.dart", "void main() {}");
    let mut context = workspace.context();
    let mut descriptions = Vec::new();
    loop {
        let result = context.perform_analysis_task().unwrap();
        match result.task {
            Some(task) => descriptions.push(task),
            None => break,
        }
    }
    assert_eq!(context.tasks_performed(), descriptions.len());

    let position = |prefix: &str| {
        descriptions
            .iter()
            .position(|task| task.starts_with(prefix) && task.contains("main.dart"))
            .unwrap_or_else(|| panic!("no task starting with {:?} in {:?}", prefix, descriptions))
    };
    let order = [
        position("getting contents of"),
        position("scanning"),
        position("parsing"),
        position("resolving dependencies of"),
        position("building the element model for"),
        position("resolving file:///app/main.dart"),
        position("generating hints for"),
    ];
    let mut sorted = order;
    sorted.sort();
    assert_eq!(order, sorted);

    let result = context.perform_analysis_task().unwrap();
    assert!(result.is_complete());
    assert!(!result.waiting);
}

#[test]
fn test_failed_content_settles_every_stage() {
    let workspace = Workspace::new();
    let mut context = workspace.empty_context();
    let ghost = app_source("ghost.dart");
    context.apply_changes(ChangeSet::new().added(ghost.clone()));
    assert_eq!(context.run_until_idle().unwrap(), Progress::Complete);

    let entry = context.cache().get(&ghost).unwrap();
    assert!(entry.exception.is_some());
    assert!(entry.parsed_unit.is_settled());
    assert!(entry.resolved_unit.is_settled());
    assert!(entry.hints.is_settled());
    assert!(context.compute_errors(&ghost).unwrap().is_empty());
}

#[test]
fn test_html_sources_stay_out_of_the_dart_pipeline() {
    let workspace = Workspace::new()
        .file("index.html", "<html><body>Hello</body></html>")
        .file("main.dart", "void main() {}");
    let mut context = workspace.context();
    let page = app_source("index.html");

    let mut descriptions = Vec::new();
    while let Some(task) = context.perform_analysis_task().unwrap().task {
        descriptions.push(task);
    }
    assert!(
        !descriptions.iter().any(|task| task.contains("index.html")),
        "{:?}",
        descriptions
    );

    assert_eq!(context.compute_kind_of(&page).unwrap(), SourceKind::Html);
    assert!(context.compute_errors(&page).unwrap().is_empty());
    assert!(context.parse_compilation_unit(&page).is_err());
    assert!(matches!(
        context.compute_library_element(&page),
        Err(EngineError::NotALibrary(_))
    ));
    assert!(!context.library_cycles().iter().flatten().any(|source| source == &page));

    context.set_contents(&page, Some("<html></html>"));
    assert_eq!(context.compute_kind_of(&page).unwrap(), SourceKind::Html);
    assert!(context.resolved_unit(&page).is_none());
}

#[test]
fn test_unusable_core_library_fails_the_libraries_that_depend_on_it() {
    let workspace = Workspace::new()
        .with_options(without_hints())
        .file("main.dart", "void main() {}");
    let mut context = workspace.context();
    let core = DartSdk::core_source();
    let main = app_source("main.dart");
    context.set_contents(&core, Some("class Object {}\n"));

    assert_eq!(context.run_until_idle().unwrap(), Progress::Complete);
    assert!(context.library_element(&core).is_none());
    assert!(context.library_element(&main).is_none());

    let exception = context
        .cache()
        .read(&main, |entry| entry.exception.clone())
        .flatten()
        .expect("element model failed");
    assert_eq!(
        exception.message(),
        format!("Cannot build the element model for {}", main)
    );
    assert_eq!(
        exception.cause().map(|cause| cause.to_string()).as_deref(),
        Some("Could not resolve dart:core")
    );
    assert!(matches!(
        context.compute_library_element(&main),
        Err(EngineError::Analysis { .. })
    ));
    assert!(context.resolved_unit(&main).is_none());
}
