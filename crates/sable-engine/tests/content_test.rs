use std::sync::Arc;

use pretty_assertions::assert_eq;
use sable_core::source::MemoryContentProvider;
use sable_core::{AnalysisOptions, ContentDelivery, CoreError, DartSdk, SourceFactory};
use sable_engine::{AnalysisContext, ChangeSet, EngineError, Progress};
use sable_test_fixtures::{app_source, codes, delivery, DeferredContentProvider};

const MAIN: &str = "import 'late.dart';\nLate value;\n";

fn deferred_context() -> (AnalysisContext, Arc<DeferredContentProvider>) {
    let memory = MemoryContentProvider::new();
    memory.set_contents(&app_source("main.dart"), MAIN);
    let provider = Arc::new(DeferredContentProvider::new(
        memory,
        [app_source("late.dart")],
    ));
    let mut context = AnalysisContext::new(
        AnalysisOptions {
            hint: false,
            ..AnalysisOptions::default()
        },
        SourceFactory::standard(Arc::new(DartSdk::embedded())),
        provider.clone(),
    );
    context.apply_changes(ChangeSet::new().added(app_source("main.dart")));
    (context, provider)
}

#[tokio::test]
async fn test_deferred_content_is_analyzed_once_delivered() {
    let (mut context, provider) = deferred_context();
    let late = app_source("late.dart");
    let main = app_source("main.dart");

    assert_eq!(context.run_until_idle().unwrap(), Progress::WaitingForContent);
    assert_eq!(provider.requested(), vec![late.clone()]);
    assert!(context.has_pending_content());
    assert!(context.library_element(&main).is_none());

    let sender = context.content_sender();
    let handle = tokio::spawn(async move {
        sender
            .send(delivery(&late, 5, "class Late {}\n"))
            .expect("context is listening");
    });
    context.analyze_all().await.unwrap();
    handle.await.unwrap();

    let late = app_source("late.dart");
    assert!(!context.has_pending_content());
    assert!(context.library_element(&late).unwrap().class("Late").is_some());
    assert_eq!(
        context.cache().read(&late, |entry| entry.modification_time),
        Some(5)
    );
    assert_eq!(codes(&context.compute_errors(&main).unwrap()), Vec::<&str>::new());
}

#[test]
fn test_compute_reports_pending_content() {
    let (mut context, _provider) = deferred_context();
    let main = app_source("main.dart");

    assert!(matches!(
        context.compute_library_element(&main),
        Err(EngineError::ContentPending(_))
    ));
    assert!(context.has_pending_content());
}

#[tokio::test]
async fn test_delivery_for_a_changed_source_is_ignored() {
    let (mut context, _provider) = deferred_context();
    let late = app_source("late.dart");

    assert_eq!(context.run_until_idle().unwrap(), Progress::WaitingForContent);
    context.set_contents(&late, Some("class Late {}\n"));
    assert!(!context.has_pending_content());

    context
        .content_sender()
        .send(delivery(&late, 9, "class Stale {}\n"))
        .unwrap();
    context.analyze_all().await.unwrap();

    let element = context.library_element(&late).unwrap();
    assert!(element.class("Late").is_some());
    assert!(element.class("Stale").is_none());
    assert!(!context.wait_for_content().await.unwrap());
}

#[tokio::test]
async fn test_newer_delivery_wins_after_the_request_is_reissued() {
    let (mut context, _provider) = deferred_context();
    let late = app_source("late.dart");
    let main = app_source("main.dart");

    assert_eq!(context.run_until_idle().unwrap(), Progress::WaitingForContent);
    context.apply_changes(ChangeSet::new().changed(late.clone()));
    assert_eq!(context.run_until_idle().unwrap(), Progress::WaitingForContent);
    assert!(context.has_pending_content());

    // The answer to the first request lands before the answer to the second.
    let sender = context.content_sender();
    sender.send(delivery(&late, 5, "class Old {}\n")).unwrap();
    sender.send(delivery(&late, 9, "class Late {}\n")).unwrap();
    context.analyze_all().await.unwrap();

    let element = context.library_element(&late).unwrap();
    assert!(element.class("Late").is_some());
    assert!(element.class("Old").is_none());
    assert_eq!(
        context.cache().read(&late, |entry| entry.modification_time),
        Some(9)
    );
    assert_eq!(codes(&context.compute_errors(&main).unwrap()), Vec::<&str>::new());

    // Anything older than what was accepted is dropped.
    sender.send(delivery(&late, 7, "class Older {}\n")).unwrap();
    context.analyze_all().await.unwrap();
    let element = context.library_element(&late).unwrap();
    assert!(element.class("Late").is_some());
    assert!(element.class("Older").is_none());
    assert_eq!(
        context.cache().read(&late, |entry| entry.modification_time),
        Some(9)
    );
}

#[tokio::test]
async fn test_failed_delivery_makes_the_import_missing() {
    let (mut context, _provider) = deferred_context();
    let late = app_source("late.dart");
    let main = app_source("main.dart");

    assert_eq!(context.run_until_idle().unwrap(), Progress::WaitingForContent);
    context
        .content_sender()
        .send(ContentDelivery {
            source: late.clone(),
            result: Err(CoreError::ContentUnavailable(late.to_string())),
        })
        .unwrap();
    context.analyze_all().await.unwrap();

    let entry = context.cache().get(&late).unwrap();
    assert_eq!(
        entry.exception.as_ref().map(|e| e.message().to_string()),
        Some("Content not available for file:///app/late.dart".to_string())
    );
    assert_eq!(
        codes(&context.compute_errors(&main).unwrap()),
        vec!["URI_DOES_NOT_EXIST", "UNDEFINED_CLASS"]
    );
}
