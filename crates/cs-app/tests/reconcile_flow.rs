//! Fetch and push reconciliation against the shared collection.

mod common;

use std::sync::Arc;

use cs_app::usecases::{FetchOutcome, PushOutcome, UploadResult};
use cs_core::ports::ApiError;
use cs_core::{ClipboardEntry, EntryId, ItemFilter, ItemPage, PushEvent, RemotePatch, UploadState};

use common::{remote_item, server_entry, ts, FakeApi, Harness};

fn page(items: Vec<ClipboardEntry>, has_more: bool) -> Result<ItemPage, ApiError> {
    Ok(ItemPage { items, has_more })
}

#[tokio::test]
async fn superseded_search_never_reaches_the_collection() {
    let api = Arc::new(FakeApi::default());
    let foo = ItemFilter::Search("foo".into());
    let bar = ItemFilter::Search("bar".into());
    let foo_gate = api.gate_list(&foo);
    api.script_page(&foo, page(vec![server_entry("1", "foo result", 1)], false));
    api.script_page(&bar, page(vec![server_entry("2", "bar result", 2)], false));
    let h = Harness::new(api.clone());

    let reconcile = h.reconcile.clone();
    let foo_fetch = tokio::spawn(async move { reconcile.refresh(foo).await });
    while api.list_count() == 0 {
        tokio::task::yield_now().await;
    }

    let bar_outcome = h.reconcile.refresh(bar.clone()).await;
    foo_gate.notify_one();
    let foo_outcome = foo_fetch.await.unwrap();

    assert_eq!(foo_outcome, FetchOutcome::Superseded);
    assert_eq!(
        bar_outcome,
        FetchOutcome::Applied {
            count: 1,
            has_more: false
        }
    );
    assert_eq!(h.ids().await, vec!["2".to_string()]);
    assert_eq!(h.reconcile.current_filter(), bar);
}

#[tokio::test]
async fn pages_append_until_exhausted() {
    let api = Arc::new(FakeApi::default());
    api.script_page(
        &ItemFilter::All,
        page(vec![server_entry("3", "c", 30), server_entry("2", "b", 20)], true),
    );
    api.script_page(&ItemFilter::All, page(vec![server_entry("1", "a", 10)], false));
    let h = Harness::new(api.clone());

    assert_eq!(
        h.reconcile.refresh(ItemFilter::All).await,
        FetchOutcome::Applied {
            count: 2,
            has_more: true
        }
    );
    assert_eq!(
        h.reconcile.load_next_page().await,
        FetchOutcome::Applied {
            count: 1,
            has_more: false
        }
    );
    assert_eq!(h.reconcile.load_next_page().await, FetchOutcome::Exhausted);

    assert_eq!(h.ids().await, vec!["3", "2", "1"]);
    let pages: Vec<u32> = api
        .list_requests
        .lock()
        .unwrap()
        .iter()
        .map(|request| request.page)
        .collect();
    assert_eq!(pages, vec![1, 2]);

    // The unfiltered first page is snapshotted for offline starts.
    assert_eq!(h.cache.entries.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn first_page_failure_falls_back_to_cache_without_clobbering_drafts() {
    let api = Arc::new(FakeApi::default());
    api.script_page(&ItemFilter::All, Err(ApiError::Timeout));
    let h = Harness::new(api.clone());
    *h.cache.entries.lock().unwrap() = vec![server_entry("8", "cached", 8)];

    // A draft from this session is already in memory.
    h.pipeline
        .upload(ClipboardEntry::new_text("draft", ts(9)))
        .await;
    assert_eq!(h.signals.draft_count(), 1);

    let outcome = h.reconcile.refresh(ItemFilter::All).await;

    assert_eq!(outcome, FetchOutcome::FellBackToCache { count: 1 });
    let ids = h.ids().await;
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"8".to_string()));
    h.assert_draft_invariant().await;
}

#[tokio::test]
async fn unfiltered_first_page_keeps_unconfirmed_entries() {
    let api = Arc::new(FakeApi::default());
    api.script_page(&ItemFilter::All, page(vec![server_entry("5", "server", 5)], false));
    let h = Harness::new(api.clone());

    h.reconcile
        .apply_fetch_page(vec![server_entry("stale", "gone on server", 4)], true)
        .await;
    let failed = h
        .pipeline
        .upload(ClipboardEntry::new_text("pending", ts(6)))
        .await;
    assert!(matches!(failed, UploadResult::Failure(_)));

    h.reconcile.refresh(ItemFilter::All).await;

    let ids = h.ids().await;
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"5".to_string()));
    assert!(!ids.contains(&"stale".to_string()));
    h.assert_draft_invariant().await;
}

#[tokio::test]
async fn new_item_push_is_idempotent() {
    let h = Harness::new(Arc::new(FakeApi::default()));
    let item = remote_item(5, "pushed", "2024-01-01T00:00:00Z");

    assert_eq!(
        h.reconcile.apply_push_event(PushEvent::NewItem(item.clone())).await,
        PushOutcome::Changed
    );
    assert_eq!(
        h.reconcile.apply_push_event(PushEvent::NewItem(item)).await,
        PushOutcome::Unchanged
    );
    assert_eq!(h.ids().await, vec!["5".to_string()]);
}

#[tokio::test]
async fn push_after_upload_confirmation_does_not_duplicate() {
    let api = Arc::new(FakeApi::default());
    api.script_create(Ok(server_entry("42", "mine", 1_704_067_200)));
    let h = Harness::new(api);

    h.pipeline
        .upload(ClipboardEntry::new_text("mine", ts(1_704_067_200)))
        .await;
    let echo = remote_item(42, "mine", "2024-01-01T00:00:00Z");

    assert_eq!(
        h.reconcile.apply_push_event(PushEvent::NewItem(echo)).await,
        PushOutcome::Unchanged
    );
    assert_eq!(h.ids().await, vec!["42".to_string()]);
}

#[tokio::test]
async fn new_item_is_not_inserted_into_a_filtered_view() {
    let api = Arc::new(FakeApi::default());
    let h = Harness::new(api);
    h.reconcile.refresh(ItemFilter::BookmarkedOnly).await;

    let outcome = h
        .reconcile
        .apply_push_event(PushEvent::NewItem(remote_item(1, "x", "2024-01-01T00:00:00Z")))
        .await;

    assert_eq!(outcome, PushOutcome::Unchanged);
    assert!(h.ids().await.is_empty());
}

#[tokio::test]
async fn mixed_fetches_and_pushes_stay_ordered_newest_first() {
    let h = Harness::new(Arc::new(FakeApi::default()));

    h.reconcile
        .apply_fetch_page(vec![server_entry("10", "ten", 10), server_entry("30", "thirty", 30)], true)
        .await;
    h.reconcile
        .apply_push_event(PushEvent::NewItem(remote_item(20, "twenty", "1970-01-01T00:00:20Z")))
        .await;
    h.reconcile
        .apply_push_event(PushEvent::NewItem(remote_item(40, "forty", "1970-01-01T00:00:40Z")))
        .await;
    h.reconcile
        .apply_fetch_page(vec![server_entry("5", "five", 5)], false)
        .await;

    assert_eq!(h.ids().await, vec!["40", "30", "20", "10", "5"]);
    h.history.lock().await.check_invariants().unwrap();
}

#[tokio::test]
async fn update_patch_leaves_absent_fields_alone() {
    let h = Harness::new(Arc::new(FakeApi::default()));
    let mut bookmarked = server_entry("1", "before", 1);
    bookmarked.is_bookmarked = true;
    h.reconcile.apply_fetch_page(vec![bookmarked], true).await;

    let outcome = h
        .reconcile
        .apply_push_event(PushEvent::UpdateItem(RemotePatch {
            id: EntryId::from("1"),
            content: Some("after".into()),
            content_type: None,
            is_bookmarked: None,
        }))
        .await;

    assert_eq!(outcome, PushOutcome::Changed);
    let history = h.history.lock().await;
    let entry = history.get(&EntryId::from("1")).unwrap();
    assert_eq!(entry.content.as_deref(), Some("after"));
    assert!(entry.is_bookmarked);
}

#[tokio::test]
async fn delete_push_removes_entry_and_its_draft() {
    let h = Harness::new(Arc::new(FakeApi::default()));
    let entry = ClipboardEntry::new_text("offline", ts(1));
    let id = entry.id.clone();
    h.pipeline.upload(entry).await;
    assert_eq!(h.state_of(id.as_str()).await, Some(UploadState::Failed));

    let outcome = h.reconcile.apply_push_event(PushEvent::DeleteItem(id)).await;

    assert_eq!(outcome, PushOutcome::Changed);
    assert!(h.ids().await.is_empty());
    assert!(h.draft_ids().await.is_empty());
    assert_eq!(
        h.reconcile
            .apply_push_event(PushEvent::DeleteItem(EntryId::from("unknown")))
            .await,
        PushOutcome::Unchanged
    );
}

#[tokio::test]
async fn sync_and_unknown_events() {
    let h = Harness::new(Arc::new(FakeApi::default()));
    assert_eq!(
        h.reconcile.apply_push_event(PushEvent::Sync).await,
        PushOutcome::ResyncRequested
    );
    assert_eq!(
        h.reconcile
            .apply_push_event(PushEvent::Unknown("party".into()))
            .await,
        PushOutcome::Unchanged
    );
}

async fn wait_for_upload_request(api: &FakeApi) {
    while api.upload_count() == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn filtered_refresh_does_not_orphan_an_in_flight_upload() {
    let api = Arc::new(FakeApi::default());
    let gate = api.gate_create();
    api.script_create(Ok(server_entry("42", "pending", 1)));
    let h = Harness::new(api.clone());

    let entry = ClipboardEntry::new_text("pending", ts(1));
    let id = entry.id.clone();
    let upload = h.pipeline.spawn_upload(entry);
    wait_for_upload_request(&api).await;

    let search = ItemFilter::Search("x".into());
    h.reconcile.refresh(search).await;
    assert_eq!(h.state_of(id.as_str()).await, Some(UploadState::Uploading));
    assert!(h.reconcile.visible_entries().await.is_empty());

    gate.notify_one();
    let result = upload.await.unwrap();

    assert!(matches!(&result, UploadResult::Success(entry) if entry.id == EntryId::from("42")));
    assert!(api.deleted.lock().unwrap().is_empty());
    assert_eq!(h.state_of("42").await, Some(UploadState::Succeeded));
    h.assert_draft_invariant().await;
}

#[tokio::test]
async fn filtered_refresh_during_a_failing_upload_still_saves_the_draft() {
    let api = Arc::new(FakeApi::default());
    let gate = api.gate_create();
    let h = Harness::new(api.clone());

    let entry = ClipboardEntry::new_text("offline", ts(1));
    let id = entry.id.clone();
    let upload = h.pipeline.spawn_upload(entry);
    wait_for_upload_request(&api).await;

    h.reconcile.refresh(ItemFilter::Category("work".into())).await;
    gate.notify_one();

    assert!(matches!(
        upload.await.unwrap(),
        UploadResult::Failure(ApiError::Network(_))
    ));
    assert_eq!(h.draft_ids().await, vec![id.to_string()]);
    assert_eq!(h.state_of(id.as_str()).await, Some(UploadState::Failed));
    assert_eq!(h.signals.draft_count(), 1);
    h.assert_draft_invariant().await;
}

#[tokio::test]
async fn drafts_stay_retryable_across_filtered_views() {
    let api = Arc::new(FakeApi::default());
    let h = Harness::new(api.clone());

    let entry = ClipboardEntry::new_text("draft text", ts(1));
    let id = entry.id.clone();
    h.pipeline.upload(entry).await;
    assert_eq!(h.state_of(id.as_str()).await, Some(UploadState::Failed));

    h.reconcile.refresh(ItemFilter::Search("zzz".into())).await;
    assert!(h.reconcile.visible_entries().await.is_empty());
    h.assert_draft_invariant().await;

    h.reconcile.refresh(ItemFilter::Search("draft".into())).await;
    assert_eq!(h.reconcile.visible_entries().await.len(), 1);

    h.reconcile.refresh(ItemFilter::All).await;
    assert_eq!(h.ids().await, vec![id.to_string()]);

    api.script_create(Ok(server_entry("43", "draft text", 1)));
    let retried = h.pipeline.retry(&id).await.unwrap();
    assert!(matches!(&retried, UploadResult::Success(entry) if entry.id == EntryId::from("43")));
    assert!(h.draft_ids().await.is_empty());
    h.assert_draft_invariant().await;
}

#[tokio::test]
async fn resync_while_filtered_keeps_drafts_and_pending_uploads() {
    let api = Arc::new(FakeApi::default());
    let h = Harness::new(api.clone());

    let draft = ClipboardEntry::new_text("older draft", ts(1));
    let draft_id = draft.id.clone();
    h.pipeline.upload(draft).await;

    let gate = api.gate_create();
    api.script_create(Ok(server_entry("50", "pending", 2)));
    h.reconcile.refresh(ItemFilter::BookmarkedOnly).await;
    let upload = h.pipeline.spawn_upload(ClipboardEntry::new_text("pending", ts(2)));
    while api.upload_count() < 2 {
        tokio::task::yield_now().await;
    }

    assert_eq!(
        h.reconcile.apply_push_event(PushEvent::Sync).await,
        PushOutcome::ResyncRequested
    );
    let filter = h.reconcile.current_filter();
    h.reconcile.refresh(filter).await;

    gate.notify_one();
    assert!(matches!(upload.await.unwrap(), UploadResult::Success(_)));
    assert!(api.deleted.lock().unwrap().is_empty());

    let ids = h.ids().await;
    assert!(ids.contains(&"50".to_string()));
    assert!(ids.contains(&draft_id.to_string()));
    assert_eq!(h.draft_ids().await, vec![draft_id.to_string()]);
    h.assert_draft_invariant().await;
}
