use super::*;
use crate::state::test_helpers::{self, Accept, MockBackend, RecordingConfirm, source};

fn registry(backend: &Arc<MockBackend>) -> SourceRegistry {
    SourceRegistry::new(backend.clone(), test_helpers::signed_in_context("tok"))
}

#[tokio::test]
async fn adding_bbc_posts_defaults_and_relists() {
    let backend = MockBackend::new();
    let registry = registry(&backend);

    let outcome = registry
        .add(NewSource::new("BBC", "https://bbc.co.uk/rss"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(backend.calls(), vec!["POST /sources".to_owned(), "GET /sources".to_owned()]);

    let items = registry.snapshot().await.items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "BBC");
    assert_eq!(items[0].category, "news");
    assert_eq!(items[0].kind, crate::net::types::SourceKind::Rss);
}

#[tokio::test]
async fn blank_fields_are_rejected_without_request() {
    let backend = MockBackend::new();
    let registry = registry(&backend);

    let err = registry
        .add(NewSource::new("  ", "https://x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Validation(ValidationError::MissingField("name"))));
    let err = registry
        .add(NewSource::new("X", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Validation(ValidationError::MissingField("url"))));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn failed_add_leaves_list_alone() {
    let backend = MockBackend::new();
    backend.state.lock().unwrap().sources = vec![source("1", "Reuters", "https://reuters.com/rss")];
    let registry = registry(&backend);
    registry.list().await.unwrap();
    backend.fail("POST /sources", None);

    assert!(registry.add(NewSource::new("BBC", "https://bbc.co.uk/rss")).await.is_err());
    assert_eq!(registry.snapshot().await.items.len(), 1);
    assert_eq!(backend.count("GET /sources"), 1);
}

#[tokio::test]
async fn remove_requires_confirmation() {
    let backend = MockBackend::new();
    backend.state.lock().unwrap().sources = vec![source("s1", "Reuters", "https://reuters.com/rss")];
    let registry = registry(&backend);
    registry.list().await.unwrap();
    let confirm = RecordingConfirm::new(false);

    let outcome = registry
        .remove(&RecordId::from("s1"), &confirm)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Declined);
    assert_eq!(confirm.prompts(), vec![DELETE_SOURCE_PROMPT.to_owned()]);
    assert_eq!(backend.count("DELETE /sources/s1"), 0);
}

#[tokio::test]
async fn confirmed_remove_deletes_and_relists() {
    let backend = MockBackend::new();
    backend.state.lock().unwrap().sources = vec![source("s1", "Reuters", "https://reuters.com/rss")];
    let registry = registry(&backend);
    registry.list().await.unwrap();

    let outcome = registry
        .remove(&RecordId::from("s1"), &Accept)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Applied);
    assert!(registry.snapshot().await.items.is_empty());
    assert_eq!(backend.count("GET /sources"), 2);
}

#[tokio::test]
async fn list_without_session_is_an_error() {
    let backend = MockBackend::new();
    let registry = SourceRegistry::new(backend.clone(), crate::state::session::SessionContext::new());
    assert_eq!(registry.list().await, Err(RequestError::NoSession));
}

#[tokio::test]
async fn clear_drops_sources() {
    let backend = MockBackend::new();
    backend.state.lock().unwrap().sources = vec![source("1", "A", "https://a")];
    let registry = registry(&backend);
    registry.list().await.unwrap();

    registry.clear().await;
    assert_eq!(registry.snapshot().await, SourcesSnapshot::default());
}

#[tokio::test]
async fn add_answered_after_sign_out_skips_relist() {
    let backend = MockBackend::new();
    let context = test_helpers::signed_in_context("tok-a");
    let registry = SourceRegistry::new(backend.clone(), context.clone());
    let gate = backend.gate("POST /sources");

    let pending = tokio::spawn({
        let registry = registry.clone();
        async move { registry.add(NewSource::new("BBC", "https://bbc.co.uk/rss")).await }
    });
    let probe = backend.clone();
    test_helpers::eventually(|| {
        let probe = probe.clone();
        async move { probe.count("POST /sources") == 1 }
    })
    .await;

    context.publish(None);
    gate.send(()).unwrap();

    assert_eq!(pending.await.unwrap().unwrap(), Outcome::Discarded);
    assert_eq!(backend.count("GET /sources"), 0);
    assert!(registry.snapshot().await.items.is_empty());
}

#[tokio::test]
async fn remove_answered_after_sign_out_leaves_list_alone() {
    let backend = MockBackend::new();
    backend.state.lock().unwrap().sources = vec![source("3", "BBC", "https://bbc.co.uk/rss")];
    let context = test_helpers::signed_in_context("tok-a");
    let registry = SourceRegistry::new(backend.clone(), context.clone());
    registry.list().await.unwrap();
    let gate = backend.gate("DELETE /sources");

    let pending = tokio::spawn({
        let registry = registry.clone();
        async move { registry.remove(&RecordId::from("3"), &Accept).await }
    });
    let probe = backend.clone();
    test_helpers::eventually(|| {
        let probe = probe.clone();
        async move { probe.count("DELETE /sources/3") == 1 }
    })
    .await;

    context.publish(None);
    gate.send(()).unwrap();

    assert_eq!(pending.await.unwrap().unwrap(), Outcome::Discarded);
    assert_eq!(backend.count("GET /sources"), 1);
    let items = registry.snapshot().await.items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "BBC");
}
