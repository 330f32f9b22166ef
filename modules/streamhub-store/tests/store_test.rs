//! Behavior tests for the three store shapes, driven by in-memory fetchers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use streamhub_store::{
    CursorPage, CursorQuery, Entity, FetchOptions, FetchPage, FetchSingle, ListStore, PagedStore,
    ParamsOptions, Query, SingleStore, SortDirection, SortValue,
};

// ---------------------------------------------------------------------------
// Test entity and params
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: String,
    created_at: DateTime<Utc>,
}

impl Entity for Item {
    fn key(&self) -> String {
        self.id.clone()
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "createdAt" => Some(SortValue::Time(self.created_at)),
            _ => None,
        }
    }
}

fn item(id: &str, seconds: i64) -> Item {
    Item {
        id: id.to_string(),
        created_at: Utc.timestamp_opt(seconds, 0).unwrap(),
    }
}

#[derive(Debug, Clone)]
struct TestQuery {
    limit: u32,
    sort_by: Option<String>,
    sort_direction: Option<SortDirection>,
    cursor: Option<String>,
    id_after: Option<String>,
}

impl TestQuery {
    fn unsorted() -> Self {
        Self {
            limit: 20,
            sort_by: None,
            sort_direction: None,
            cursor: None,
            id_after: None,
        }
    }

    fn sorted(direction: SortDirection) -> Self {
        Self {
            sort_by: Some("createdAt".to_string()),
            sort_direction: Some(direction),
            ..Self::unsorted()
        }
    }
}

impl Query for TestQuery {
    fn sort(&self) -> Option<(String, SortDirection)> {
        Some((self.sort_by.clone()?, self.sort_direction?))
    }
}

impl CursorQuery for TestQuery {
    fn set_cursor(&mut self, cursor: Option<String>, id_after: Option<String>) {
        self.cursor = cursor;
        self.id_after = id_after;
    }
}

fn page(items: Vec<Item>, next: Option<&str>, has_next: bool, total: u64) -> CursorPage<Item> {
    CursorPage {
        data: items,
        next_cursor: next.map(str::to_string),
        next_id_after: next.map(|cursor| format!("{cursor}-id")),
        has_next: Some(has_next),
        total_count: Some(total),
    }
}

// ---------------------------------------------------------------------------
// Fake fetchers
// ---------------------------------------------------------------------------

/// Serves queued pages in order and records every cursor pair it saw.
struct PagedFake {
    pages: Mutex<VecDeque<CursorPage<Item>>>,
    calls: AtomicUsize,
    cursors_seen: Mutex<Vec<(Option<String>, Option<String>)>>,
}

impl PagedFake {
    fn new(pages: Vec<CursorPage<Item>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            calls: AtomicUsize::new(0),
            cursors_seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchPage<Item, TestQuery> for PagedFake {
    async fn fetch(&self, query: &TestQuery) -> Result<CursorPage<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors_seen
            .lock()
            .unwrap()
            .push((query.cursor.clone(), query.id_after.clone()));
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no page queued"))
    }
}

/// Parks every fetch until a permit is released, so tests can hold a fetch
/// in flight deliberately.
struct ParkedFake {
    gate: tokio::sync::Semaphore,
    calls: AtomicUsize,
    result: CursorPage<Item>,
}

impl ParkedFake {
    fn new(result: CursorPage<Item>) -> Arc<Self> {
        Arc::new(Self {
            gate: tokio::sync::Semaphore::new(0),
            calls: AtomicUsize::new(0),
            result,
        })
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchPage<Item, TestQuery> for ParkedFake {
    async fn fetch(&self, _query: &TestQuery) -> Result<CursorPage<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        Ok(self.result.clone())
    }
}

struct ListFake {
    items: Vec<Item>,
    calls: AtomicUsize,
}

#[async_trait]
impl streamhub_store::FetchList<Item, TestQuery> for ListFake {
    async fn fetch(&self, _query: &TestQuery) -> Result<Vec<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }
}

struct SingleFake {
    value: Item,
}

#[async_trait]
impl FetchSingle<Item, TestQuery> for SingleFake {
    async fn fetch(&self, _query: &TestQuery) -> Result<Item> {
        Ok(self.value.clone())
    }
}

struct FailingFake;

#[async_trait]
impl FetchPage<Item, TestQuery> for FailingFake {
    async fn fetch(&self, _query: &TestQuery) -> Result<CursorPage<Item>> {
        Err(anyhow!("connection reset by peer"))
    }
}

async fn wait_until_loading(store: &PagedStore<Item, TestQuery>) {
    while !store.loading() {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// At-most-one-fetch-in-flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_while_loading_is_dropped() {
    let fake = ParkedFake::new(page(vec![item("a", 1)], None, false, 1));
    let store = Arc::new(PagedStore::new(fake.clone(), TestQuery::unsorted()));

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(FetchOptions::default()).await }
    });
    wait_until_loading(&store).await;

    // Dropped, not queued: no second network call, state untouched.
    store.fetch(FetchOptions::default()).await.unwrap();
    assert_eq!(fake.calls(), 1);
    assert!(store.data().is_empty());

    fake.release();
    first.await.unwrap().unwrap();
    assert_eq!(fake.calls(), 1);
    assert_eq!(store.data().len(), 1);
}

#[tokio::test]
async fn ignore_loading_bypasses_the_guard() {
    let fake = ParkedFake::new(page(vec![item("a", 1)], None, false, 1));
    let store = Arc::new(PagedStore::new(fake.clone(), TestQuery::unsorted()));

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(FetchOptions::default()).await }
    });
    wait_until_loading(&store).await;

    let second = tokio::spawn({
        let store = store.clone();
        async move {
            store
                .fetch(FetchOptions {
                    ignore_loading: true,
                })
                .await
        }
    });
    tokio::task::yield_now().await;

    fake.release();
    fake.release();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(fake.calls(), 2);
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_more_appends_and_tracks_exhaustion() {
    let fake = PagedFake::new(vec![
        page(vec![item("a", 1), item("b", 2)], Some("c1"), true, 3),
        page(vec![item("c", 3)], None, false, 3),
    ]);
    let store = PagedStore::new(fake.clone(), TestQuery::unsorted());

    store.fetch(FetchOptions::default()).await.unwrap();
    assert!(store.has_next());
    assert_eq!(store.cursor().next_cursor.as_deref(), Some("c1"));

    store.fetch_more(FetchOptions::default()).await.unwrap();
    let keys: Vec<String> = store.data().iter().map(Entity::key).collect();
    assert_eq!(keys, ["a", "b", "c"]);
    assert!(!store.has_next());

    // Exhausted: a further fetch_more issues no request.
    store.fetch_more(FetchOptions::default()).await.unwrap();
    assert_eq!(fake.calls(), 2);
}

#[tokio::test]
async fn cursor_pair_is_cleared_on_fetch_and_echoed_on_fetch_more() {
    let fake = PagedFake::new(vec![
        page(vec![item("a", 1)], Some("c1"), true, 2),
        page(vec![item("b", 2)], None, false, 2),
    ]);
    let store = PagedStore::new(fake.clone(), TestQuery::unsorted());

    store.fetch(FetchOptions::default()).await.unwrap();
    store.fetch_more(FetchOptions::default()).await.unwrap();

    let seen = fake.cursors_seen.lock().unwrap().clone();
    assert_eq!(seen[0], (None, None));
    assert_eq!(
        seen[1],
        (Some("c1".to_string()), Some("c1-id".to_string()))
    );
}

#[tokio::test]
async fn fetch_replaces_the_window_wholesale() {
    let fake = PagedFake::new(vec![
        page(vec![item("a", 1), item("b", 2)], Some("c1"), true, 5),
        page(vec![item("x", 9)], None, false, 1),
    ]);
    let store = PagedStore::new(fake.clone(), TestQuery::unsorted());

    store.fetch(FetchOptions::default()).await.unwrap();
    store.fetch(FetchOptions::default()).await.unwrap();

    let keys: Vec<String> = store.data().iter().map(Entity::key).collect();
    assert_eq!(keys, ["x"]);
    assert_eq!(store.count(), 1);
    assert!(!store.has_next());
}

// ---------------------------------------------------------------------------
// Local mutations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_duplicate_key_is_ignored() {
    let fake = PagedFake::new(vec![page(vec![item("a", 1)], None, false, 1)]);
    let store = PagedStore::new(fake, TestQuery::unsorted());
    store.fetch(FetchOptions::default()).await.unwrap();

    store.add(item("a", 99));
    assert_eq!(store.data(), vec![item("a", 1)]);
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn add_without_sort_prepends() {
    let fake = PagedFake::new(vec![]);
    let store = PagedStore::new(fake, TestQuery::unsorted());

    store.add(item("a", 1));
    store.add(item("b", 2));
    let keys: Vec<String> = store.data().iter().map(Entity::key).collect();
    assert_eq!(keys, ["b", "a"]);
    assert_eq!(store.count(), 2);
}

#[tokio::test]
async fn add_preserves_descending_sort_order() {
    let fake = PagedFake::new(vec![]);
    let store = PagedStore::new(fake, TestQuery::sorted(SortDirection::Descending));

    store.add(item("five", 5));
    store.add(item("three", 3));
    store.add(item("eight", 8));

    let keys: Vec<String> = store.data().iter().map(Entity::key).collect();
    assert_eq!(keys, ["eight", "five", "three"]);
    assert_eq!(store.count(), 3);
}

#[tokio::test]
async fn add_preserves_ascending_sort_order() {
    let fake = PagedFake::new(vec![]);
    let store = PagedStore::new(fake, TestQuery::sorted(SortDirection::Ascending));

    store.add(item("five", 5));
    store.add(item("three", 3));
    store.add(item("eight", 8));

    let keys: Vec<String> = store.data().iter().map(Entity::key).collect();
    assert_eq!(keys, ["three", "five", "eight"]);
}

#[tokio::test]
async fn update_patches_in_place_and_never_resorts() {
    let fake = PagedFake::new(vec![]);
    let store = PagedStore::new(fake, TestQuery::sorted(SortDirection::Descending));
    store.add(item("a", 8));
    store.add(item("b", 5));
    store.add(item("c", 3));

    // Move b's sort key past a's; position is only re-evaluated on add or
    // the next full fetch.
    store.update("b", |it| it.created_at = Utc.timestamp_opt(100, 0).unwrap());

    let keys: Vec<String> = store.data().iter().map(Entity::key).collect();
    assert_eq!(keys, ["a", "b", "c"]);
    assert_eq!(
        store.data()[1].created_at,
        Utc.timestamp_opt(100, 0).unwrap()
    );
}

#[tokio::test]
async fn delete_decrements_total_count_only_on_removal() {
    let fake = PagedFake::new(vec![page(
        vec![item("a", 1), item("b", 2)],
        Some("c1"),
        true,
        10,
    )]);
    let store = PagedStore::new(fake, TestQuery::unsorted());
    store.fetch(FetchOptions::default()).await.unwrap();
    assert_eq!(store.count(), 10);

    store.delete("a");
    assert_eq!(store.data().len(), 1);
    assert_eq!(store.count(), 9);

    // Unknown key: nothing removed, nothing decremented.
    store.delete("missing");
    assert_eq!(store.data().len(), 1);
    assert_eq!(store.count(), 9);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_failure_is_recorded_and_returned() {
    let store = PagedStore::new(Arc::new(FailingFake), TestQuery::unsorted());

    let result = store.fetch(FetchOptions::default()).await;
    assert!(result.is_err());
    assert!(store
        .error()
        .unwrap()
        .contains("connection reset by peer"));
    assert!(!store.loading());

    store.clear_error();
    assert_eq!(store.error(), None);
}

// ---------------------------------------------------------------------------
// Params and reset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_params_refetches_unless_opted_out() {
    let fake = PagedFake::new(vec![
        page(vec![item("a", 1)], None, false, 1),
        page(vec![item("b", 2)], None, false, 1),
    ]);
    let store = PagedStore::new(fake.clone(), TestQuery::unsorted());

    store
        .update_params(|q| q.limit = 50, ParamsOptions::default())
        .await
        .unwrap();
    assert_eq!(fake.calls(), 1);
    assert_eq!(store.params().limit, 50);

    store
        .update_params(|q| q.limit = 5, ParamsOptions { auto_fetch: false })
        .await
        .unwrap();
    assert_eq!(fake.calls(), 1);
    assert_eq!(store.params().limit, 5);
}

#[tokio::test]
async fn clear_restores_the_initial_snapshot() {
    let fake = PagedFake::new(vec![page(vec![item("a", 1)], Some("c1"), true, 7)]);
    let store = PagedStore::new(fake, TestQuery::unsorted());

    store
        .update_params(|q| q.limit = 50, ParamsOptions { auto_fetch: false })
        .await
        .unwrap();
    store.fetch(FetchOptions::default()).await.unwrap();
    assert_eq!(store.count(), 7);

    store.clear();
    assert!(store.data().is_empty());
    assert_eq!(store.params().limit, 20);
    assert_eq!(store.count(), 0);
    assert!(!store.has_next());
    assert!(!store.loading());
    assert_eq!(store.error(), None);
}

#[tokio::test]
async fn stale_fetch_after_clear_is_suppressed() {
    let fake = ParkedFake::new(page(vec![item("a", 1)], None, false, 1));
    let store = Arc::new(PagedStore::new(fake.clone(), TestQuery::unsorted()));

    let inflight = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(FetchOptions::default()).await }
    });
    wait_until_loading(&store).await;

    store.clear();
    fake.release();
    inflight.await.unwrap().unwrap();

    // The in-flight result resolved after the clear and must not commit.
    assert!(store.data().is_empty());
    assert_eq!(store.count(), 0);
    assert!(!store.loading());
}

// ---------------------------------------------------------------------------
// List and single shapes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_store_fetches_and_counts_locally() {
    let fake = Arc::new(ListFake {
        items: vec![item("a", 1), item("b", 2)],
        calls: AtomicUsize::new(0),
    });
    let store = ListStore::new(fake.clone(), TestQuery::unsorted());

    store.fetch(FetchOptions::default()).await.unwrap();
    assert_eq!(store.count(), 2);

    store.delete("a");
    assert_eq!(store.count(), 1);

    store.add(item("c", 3));
    store.add(item("c", 4));
    assert_eq!(store.count(), 2);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_store_fetches_and_patches() {
    let fake = Arc::new(SingleFake {
        value: item("me", 42),
    });
    let store = SingleStore::new(fake, TestQuery::unsorted());
    assert_eq!(store.data(), None);

    store.fetch(FetchOptions::default()).await.unwrap();
    assert_eq!(store.data().unwrap().id, "me");

    store.update(|it| it.id = "renamed".to_string());
    assert_eq!(store.data().unwrap().id, "renamed");

    store.clear();
    assert_eq!(store.data(), None);
}

#[tokio::test]
async fn watch_channel_reports_commits() {
    let fake = PagedFake::new(vec![page(vec![item("a", 1)], None, false, 1)]);
    let store = PagedStore::new(fake, TestQuery::unsorted());
    let mut versions = store.watch();
    let before = *versions.borrow_and_update();

    store.fetch(FetchOptions::default()).await.unwrap();
    versions.changed().await.unwrap();
    assert!(*versions.borrow() > before);
}
