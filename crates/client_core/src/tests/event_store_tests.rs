use super::*;

use shared::domain::EventId;

use crate::{
    cache::CachePolicy,
    event_bus,
    test_support::{event, ScriptedFetch, TestEventBackend},
};

fn store_with(
    backend: Arc<TestEventBackend>,
    ordering: RefreshOrdering,
) -> (Arc<EventStore>, broadcast::Receiver<ClientEvent>) {
    let events = event_bus();
    let rx = events.subscribe();
    let store = Arc::new(EventStore::new(
        backend,
        Arc::new(CacheLayer::new(CachePolicy::NetworkFirst, None)),
        ordering,
        events,
    ));
    (store, rx)
}

fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test]
async fn refresh_replaces_collection_wholesale() {
    let backend = TestEventBackend::new();
    backend
        .script(ScriptedFetch::ok(vec![event(1, "A"), event(2, "B")]))
        .await;
    backend.script(ScriptedFetch::ok(vec![event(3, "C")])).await;
    let (store, mut rx) = store_with(backend, RefreshOrdering::LastResolvedWins);

    store.refresh().await;
    let outcome = store.refresh().await;

    assert_eq!(outcome, RefreshOutcome::Applied { count: 1 });
    assert_eq!(store.events().await, vec![event(3, "C")]);
    assert_eq!(
        drain(&mut rx),
        vec![
            ClientEvent::EventsReplaced { count: 2 },
            ClientEvent::EventsReplaced { count: 1 },
        ]
    );
}

#[tokio::test]
async fn refresh_keeps_server_order() {
    let backend = TestEventBackend::new();
    backend
        .script(ScriptedFetch::ok(vec![event(9, "Z"), event(1, "A")]))
        .await;
    let (store, _rx) = store_with(backend, RefreshOrdering::LastResolvedWins);

    store.refresh().await;

    let ids: Vec<_> = store.events().await.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![Some(EventId(9)), Some(EventId(1))]);
}

#[tokio::test]
async fn failed_refresh_falls_back_to_last_good_collection() {
    let backend = TestEventBackend::new();
    backend.script(ScriptedFetch::ok(vec![event(1, "A")])).await;
    backend.script(ScriptedFetch::failing()).await;
    let (store, _rx) = store_with(backend, RefreshOrdering::LastResolvedWins);

    store.refresh().await;
    store.refresh().await;

    assert_eq!(store.events().await, vec![event(1, "A")]);
}

#[tokio::test]
async fn failed_first_refresh_yields_empty_collection() {
    let backend = TestEventBackend::new();
    backend.script(ScriptedFetch::failing()).await;
    let (store, _rx) = store_with(backend, RefreshOrdering::LastResolvedWins);

    assert_eq!(store.refresh().await, RefreshOutcome::Applied { count: 0 });
    assert!(store.events().await.is_empty());
}

#[tokio::test]
async fn overlapping_refreshes_apply_last_resolved_response() {
    let backend = TestEventBackend::new();
    let (slow, release_slow) = ScriptedFetch::gated(vec![event(1, "slow")]);
    backend.script(slow).await;
    backend.script(ScriptedFetch::ok(vec![event(2, "fast")])).await;
    let (store, _rx) = store_with(backend.clone(), RefreshOrdering::LastResolvedWins);

    let first = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.refresh().await }
    });
    backend.wait_for_find_all_calls(1).await;

    store.refresh().await;
    assert_eq!(store.events().await, vec![event(2, "fast")]);

    release_slow.send(()).expect("release");
    let outcome = first.await.expect("join");

    assert_eq!(outcome, RefreshOutcome::Applied { count: 1 });
    assert_eq!(store.events().await, vec![event(1, "slow")]);
}

#[tokio::test]
async fn latest_issued_ordering_discards_superseded_response() {
    let backend = TestEventBackend::new();
    let (slow, release_slow) = ScriptedFetch::gated(vec![event(1, "slow")]);
    backend.script(slow).await;
    backend.script(ScriptedFetch::ok(vec![event(2, "fast")])).await;
    let (store, _rx) = store_with(backend.clone(), RefreshOrdering::LatestIssuedWins);

    let first = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.refresh().await }
    });
    backend.wait_for_find_all_calls(1).await;

    store.refresh().await;
    release_slow.send(()).expect("release");

    assert_eq!(first.await.expect("join"), RefreshOutcome::Discarded);
    assert_eq!(store.events().await, vec![event(2, "fast")]);
}

#[tokio::test]
async fn select_and_clear_selection() {
    let backend = TestEventBackend::new();
    let (store, mut rx) = store_with(backend, RefreshOrdering::LastResolvedWins);

    store.select(event(1, "A")).await;
    store.select(event(2, "B")).await;
    assert_eq!(store.selected().await, Some(event(2, "B")));

    store.clear_selection().await;
    store.clear_selection().await;
    assert!(store.selected().await.is_none());
    assert_eq!(
        drain(&mut rx),
        vec![
            ClientEvent::SelectionChanged(Some(EventId(1))),
            ClientEvent::SelectionChanged(Some(EventId(2))),
            ClientEvent::SelectionChanged(None),
        ]
    );
}

#[tokio::test]
async fn subscription_merges_only_the_referenced_event() {
    let backend = TestEventBackend::new();
    let first = event(1, "Pasta");
    let second = event(2, "Bread");
    backend
        .script(ScriptedFetch::ok(vec![first.clone(), second.clone()]))
        .await;
    let mut updated = second.clone();
    updated.nb_attendees = Some(1);
    backend.store_event(updated.clone()).await;
    let (store, mut rx) = store_with(backend.clone(), RefreshOrdering::LastResolvedWins);
    store.refresh().await;
    store.select(second.clone()).await;
    drain(&mut rx);

    let mut request = Subscriber::for_event(second);
    request.first_name = "Ada".into();
    request.last_name = "Lovelace".into();
    request.email = "ada@example.com".into();
    store
        .apply_subscription(request.clone())
        .await
        .expect("subscribe");

    assert_eq!(store.events().await, vec![first, updated]);
    assert!(store.selected().await.is_none());
    assert_eq!(backend.subscriptions.lock().await.clone(), vec![request]);
    assert_eq!(
        drain(&mut rx),
        vec![ClientEvent::SubscriptionApplied {
            event_id: EventId(2),
            merged: true,
        }]
    );
}

#[tokio::test]
async fn subscription_to_vanished_event_leaves_collection_alone() {
    let backend = TestEventBackend::new();
    backend.script(ScriptedFetch::ok(vec![event(1, "A")])).await;
    let (store, _rx) = store_with(backend, RefreshOrdering::LastResolvedWins);
    store.refresh().await;
    store.select(event(5, "gone")).await;

    store
        .apply_subscription(Subscriber::for_event(event(5, "gone")))
        .await
        .expect("subscribe");

    assert_eq!(store.events().await, vec![event(1, "A")]);
    assert!(store.selected().await.is_none());
}

#[tokio::test]
async fn subscription_endpoint_error_propagates_and_keeps_selection() {
    let backend = TestEventBackend::new();
    *backend.fail_subscribe_with.lock().await = Some("email must be valid".into());
    let (store, _rx) = store_with(backend.clone(), RefreshOrdering::LastResolvedWins);
    store.select(event(1, "A")).await;

    let err = store
        .apply_subscription(Subscriber::for_event(event(1, "A")))
        .await
        .expect_err("should fail");

    assert!(err.is_endpoint());
    assert_eq!(store.selected().await, Some(event(1, "A")));
    assert_eq!(backend.get_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn subscription_requires_persisted_event() {
    let backend = TestEventBackend::new();
    let (store, _rx) = store_with(backend.clone(), RefreshOrdering::LastResolvedWins);

    let err = store
        .apply_subscription(Subscriber::for_event(Event::default()))
        .await
        .expect_err("should fail");

    assert!(matches!(err, ClientError::MissingEventId));
    assert!(backend.subscriptions.lock().await.is_empty());
}

#[tokio::test]
async fn reset_restores_initial_state() {
    let backend = TestEventBackend::new();
    backend.script(ScriptedFetch::ok(vec![event(1, "A")])).await;
    let (store, _rx) = store_with(backend, RefreshOrdering::LastResolvedWins);
    store.refresh().await;
    store.select(event(1, "A")).await;

    store.reset().await;

    assert!(store.events().await.is_empty());
    assert!(store.selected().await.is_none());
    assert!(!store.cache.contains(EVENTS_CACHE_KEY).await);
}

#[tokio::test]
async fn default_cache_serves_second_refresh_without_fetching() {
    let backend = TestEventBackend::new();
    backend.script(ScriptedFetch::ok(vec![event(1, "A")])).await;
    backend
        .script(ScriptedFetch::ok(vec![event(1, "A"), event(2, "B")]))
        .await;
    let store = EventStore::new(
        backend.clone(),
        Arc::new(CacheLayer::default()),
        RefreshOrdering::default(),
        event_bus(),
    );

    store.refresh().await;
    let outcome = store.refresh().await;

    assert_eq!(backend.find_all_calls(), 1);
    assert_eq!(outcome, RefreshOutcome::Applied { count: 1 });
    assert_eq!(store.events().await, vec![event(1, "A")]);
}

#[tokio::test]
async fn revalidate_fetches_even_with_cached_collection() {
    let backend = TestEventBackend::new();
    backend.script(ScriptedFetch::ok(vec![event(1, "A")])).await;
    backend
        .script(ScriptedFetch::ok(vec![event(1, "A"), event(2, "B")]))
        .await;
    backend.script(ScriptedFetch::failing()).await;
    let store = EventStore::new(
        backend.clone(),
        Arc::new(CacheLayer::new(CachePolicy::CacheFirst, None)),
        RefreshOrdering::default(),
        event_bus(),
    );

    store.refresh().await;
    store.revalidate().await;
    assert_eq!(backend.find_all_calls(), 2);
    assert_eq!(store.events().await, vec![event(1, "A"), event(2, "B")]);

    store.revalidate().await;
    assert_eq!(backend.find_all_calls(), 3);
    assert_eq!(store.events().await, vec![event(1, "A"), event(2, "B")]);
}
