use coview_engine::SubscriptionCache;
use coview_store::{CoStore, MemStore};
use coview_types::CoKind;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

const GRACE: Duration = Duration::from_millis(50);

async fn store_and_handle() -> (Arc<MemStore>, coview_store::RawHandle) {
    let store = Arc::new(MemStore::new());
    let handle = store
        .create_primitive(CoKind::KeyedMap, json!({}))
        .await
        .unwrap();
    (store, handle)
}

// ── Deduplication ────────────────────────────────────────────────

#[tokio::test]
async fn many_subscribers_share_one_store_subscription() {
    let (store, handle) = store_and_handle().await;
    let cache = SubscriptionCache::new(GRACE);

    let (tx1, _rx1) = mpsc::unbounded_channel();
    let (tx2, _rx2) = mpsc::unbounded_channel();
    let (tx3, _rx3) = mpsc::unbounded_channel();
    let _a = cache.subscribe(&handle, tx1);
    let _b = cache.subscribe(&handle, tx2);
    let _c = cache.subscribe(&handle, tx3);

    assert_eq!(store.subscribe_count(handle.id()).await, 1);
    assert_eq!(cache.refcount(handle.id()), 3);
}

#[tokio::test]
async fn each_subscriber_receives_its_own_callbacks() {
    let (_store, handle) = store_and_handle().await;
    let cache = SubscriptionCache::new(GRACE);

    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let _a = cache.subscribe(&handle, tx1);
    let _b = cache.subscribe(&handle, tx2);

    handle.set("n", json!(1)).await.unwrap();
    handle.set("n", json!(2)).await.unwrap();

    // Callbacks arrive in store-report order on both channels.
    assert_eq!(rx1.recv().await.unwrap(), json!({"n": 1}));
    assert_eq!(rx1.recv().await.unwrap(), json!({"n": 2}));
    assert_eq!(rx2.recv().await.unwrap(), json!({"n": 1}));
    assert_eq!(rx2.recv().await.unwrap(), json!({"n": 2}));
}

// ── Grace window ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn resubscribe_within_grace_window_reuses_the_subscription() {
    let (store, handle) = store_and_handle().await;
    let cache = SubscriptionCache::new(GRACE);

    let (tx, _rx) = mpsc::unbounded_channel();
    let token = cache.subscribe(&handle, tx);
    token.unsubscribe();

    // Still within the window: the store subscription must be live.
    assert!(cache.is_live(handle.id()));
    assert!(cache.idle_since(handle.id()).is_some());

    let (tx2, _rx2) = mpsc::unbounded_channel();
    let _token2 = cache.subscribe(&handle, tx2);

    // Well past the original window; the reused subscription survives.
    sleep(GRACE * 3).await;
    assert!(cache.is_live(handle.id()));
    assert_eq!(store.subscribe_count(handle.id()).await, 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_happens_only_after_the_window_elapses() {
    let (store, handle) = store_and_handle().await;
    let cache = SubscriptionCache::new(GRACE);

    let (tx, _rx) = mpsc::unbounded_channel();
    let token = cache.subscribe(&handle, tx);
    assert_eq!(store.live_subscriber_count(handle.id()).await, 1);

    token.unsubscribe();
    assert_eq!(store.live_subscriber_count(handle.id()).await, 1);

    sleep(GRACE * 3).await;
    assert!(!cache.is_live(handle.id()));
    assert_eq!(store.live_subscriber_count(handle.id()).await, 0);
}

#[tokio::test]
async fn unsubscribe_resubscribe_churn_opens_one_store_subscription() {
    let (store, handle) = store_and_handle().await;
    let cache = SubscriptionCache::new(GRACE);

    for _ in 0..5 {
        let (tx, _rx) = mpsc::unbounded_channel();
        let token = cache.subscribe(&handle, tx);
        token.unsubscribe();
    }

    assert_eq!(store.subscribe_count(handle.id()).await, 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_token_behaves_like_unsubscribe() {
    let (store, handle) = store_and_handle().await;
    let cache = SubscriptionCache::new(GRACE);

    {
        let (tx, _rx) = mpsc::unbounded_channel();
        let _token = cache.subscribe(&handle, tx);
    }

    sleep(GRACE * 3).await;
    assert!(!cache.is_live(handle.id()));
    assert_eq!(store.live_subscriber_count(handle.id()).await, 0);
}

#[tokio::test(start_paused = true)]
async fn second_teardown_cycle_reopens_a_store_subscription() {
    let (store, handle) = store_and_handle().await;
    let cache = SubscriptionCache::new(GRACE);

    let (tx, _rx) = mpsc::unbounded_channel();
    cache.subscribe(&handle, tx).unsubscribe();
    sleep(GRACE * 3).await;
    assert!(!cache.is_live(handle.id()));

    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let _token = cache.subscribe(&handle, tx2);
    assert_eq!(store.subscribe_count(handle.id()).await, 2);

    // The fresh subscription delivers.
    handle.set("x", json!(true)).await.unwrap();
    assert_eq!(rx2.recv().await.unwrap(), json!({"x": true}));
}

// ── Independence across handles ──────────────────────────────────

#[tokio::test(start_paused = true)]
async fn handles_are_tracked_independently() {
    let store = Arc::new(MemStore::new());
    let a = store
        .create_primitive(CoKind::KeyedMap, json!({}))
        .await
        .unwrap();
    let b = store
        .create_primitive(CoKind::KeyedMap, json!({}))
        .await
        .unwrap();
    let cache = SubscriptionCache::new(GRACE);

    let (tx1, _rx1) = mpsc::unbounded_channel();
    let (tx2, _rx2) = mpsc::unbounded_channel();
    let token_a = cache.subscribe(&a, tx1);
    let _token_b = cache.subscribe(&b, tx2);
    assert_eq!(cache.active_count(), 2);

    token_a.unsubscribe();
    sleep(GRACE * 3).await;
    assert!(!cache.is_live(a.id()));
    assert!(cache.is_live(b.id()));
}
