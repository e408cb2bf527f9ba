//! Shared fakes for the engine scenario tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::task::TaskTracker;

use cs_app::events::EngineSignals;
use cs_app::history::{shared_history, SharedHistory};
use cs_app::tasks::EntryTasks;
use cs_app::usecases::{CaptureWatcher, EntryActions, ReconciliationEngine, UploadPipeline};
use cs_core::ports::*;
use cs_core::{
    CaptureCandidate, CapturedImage, Category, ClipboardEntry, DeviceId, EntryId, ImageRef,
    ItemFilter, ItemPage, PageRequest, RemoteItem, UploadRequest, UploadState,
};
use cs_infra::JsonDraftStore;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// An entry as the server would return it.
pub fn server_entry(id: &str, text: &str, secs: i64) -> ClipboardEntry {
    let mut entry = ClipboardEntry::new_text(text, ts(secs)).with_id(EntryId::from(id));
    entry.upload_state = UploadState::Succeeded;
    entry
}

pub fn remote_item(id: i64, text: &str, created_at: &str) -> RemoteItem {
    serde_json::from_value(json!({
        "id": id,
        "content_type": "text",
        "content": text,
        "created_at": created_at,
    }))
    .unwrap()
}

fn filter_key(filter: &ItemFilter) -> String {
    format!("{filter:?}")
}

/// Scripted REST API. Unscripted creates fail with a network error,
/// unscripted list calls return an empty last page.
#[derive(Default)]
pub struct FakeApi {
    create_script: Mutex<VecDeque<Result<ClipboardEntry, ApiError>>>,
    create_gate: Mutex<Option<Arc<Notify>>>,
    pub uploads: Mutex<Vec<UploadRequest>>,
    pages: Mutex<HashMap<String, VecDeque<Result<ItemPage, ApiError>>>>,
    list_gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub list_requests: Mutex<Vec<PageRequest>>,
    pub deleted: Mutex<Vec<EntryId>>,
}

impl FakeApi {
    pub fn script_create(&self, result: Result<ClipboardEntry, ApiError>) {
        self.create_script.lock().unwrap().push_back(result);
    }

    /// Block `create_item` until the returned notify fires.
    pub fn gate_create(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.create_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn script_page(&self, filter: &ItemFilter, result: Result<ItemPage, ApiError>) {
        self.pages
            .lock()
            .unwrap()
            .entry(filter_key(filter))
            .or_default()
            .push_back(result);
    }

    pub fn gate_list(&self, filter: &ItemFilter) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.list_gates
            .lock()
            .unwrap()
            .insert(filter_key(filter), gate.clone());
        gate
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn list_count(&self) -> usize {
        self.list_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ClipboardApiPort for FakeApi {
    async fn list_items(&self, request: &PageRequest) -> Result<ItemPage, ApiError> {
        self.list_requests.lock().unwrap().push(request.clone());
        let key = filter_key(&request.query.filter);
        let gate = self.list_gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.pages
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Ok(ItemPage::default()))
    }

    async fn create_item(&self, request: UploadRequest) -> Result<ClipboardEntry, ApiError> {
        self.uploads.lock().unwrap().push(request);
        let gate = self.create_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.create_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("connection refused".into())))
    }

    async fn update_content(&self, _id: &EntryId, _content: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn set_bookmark(&self, _id: &EntryId, _bookmarked: bool) -> Result<(), ApiError> {
        Ok(())
    }

    async fn delete_item(&self, id: &EntryId) -> Result<(), ApiError> {
        self.deleted.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn fetch_original(&self, _id: &EntryId) -> Result<Vec<u8>, ApiError> {
        Err(ApiError::NotFound)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        Ok(Vec::new())
    }

    async fn create_category(&self, name: &str) -> Result<Category, ApiError> {
        Ok(Category {
            id: "1".into(),
            name: name.into(),
        })
    }

    async fn delete_category(&self, _category_id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn add_item_to_category(&self, _category_id: &str, _item_id: &EntryId) -> Result<(), ApiError> {
        Ok(())
    }
}

pub struct FakeClock(pub AtomicI64);

impl FakeClock {
    pub fn at(ms: i64) -> Self {
        Self(AtomicI64::new(ms))
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl ClockPort for FakeClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct FakeDevice;

impl DeviceIdentityPort for FakeDevice {
    fn current_device_id(&self) -> DeviceId {
        DeviceId::from("device-1")
    }
}

#[derive(Default)]
pub struct MemorySpool {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

#[async_trait]
impl ImageSpoolPort for MemorySpool {
    async fn persist_capture(&self, id: &EntryId, image: &CapturedImage) -> Result<ImageRef> {
        let path = PathBuf::from(format!("/spool/captures/{id}.png"));
        if let CapturedImage::Bytes { bytes } = image {
            self.files.lock().unwrap().insert(path.clone(), bytes.clone());
        }
        Ok(ImageRef::LocalFile { path })
    }

    async fn store_original(&self, id: &EntryId, bytes: &[u8]) -> Result<ImageRef> {
        let path = PathBuf::from(format!("/spool/originals/{id}.png"));
        self.files.lock().unwrap().insert(path.clone(), bytes.to_vec());
        Ok(ImageRef::CachedOriginal { path })
    }

    async fn read(&self, image: &ImageRef) -> Result<Vec<u8>> {
        match image {
            ImageRef::Remote { bytes } => Ok(bytes.clone()),
            ImageRef::LocalFile { path } | ImageRef::CachedOriginal { path } => self
                .files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing {}", path.display())),
        }
    }

    async fn discard(&self, image: &ImageRef) -> Result<()> {
        if let Some(path) = image.local_path() {
            self.files.lock().unwrap().remove(path);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    pub entries: Mutex<Vec<ClipboardEntry>>,
}

#[async_trait]
impl EntryCachePort for MemoryCache {
    async fn load(&self) -> Result<Vec<ClipboardEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn save(&self, entries: &[ClipboardEntry]) -> Result<()> {
        *self.entries.lock().unwrap() = entries.to_vec();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    Text(String),
    Image(Vec<u8>),
}

#[derive(Default)]
pub struct FakeClipboard {
    pub written: Mutex<Vec<Written>>,
}

impl SystemClipboardPort for FakeClipboard {
    fn read(&self) -> Result<Option<CaptureCandidate>> {
        Ok(None)
    }

    fn write_text(&self, text: &str) -> Result<()> {
        self.written.lock().unwrap().push(Written::Text(text.to_string()));
        Ok(())
    }

    fn write_image(&self, bytes: &[u8]) -> Result<()> {
        self.written.lock().unwrap().push(Written::Image(bytes.to_vec()));
        Ok(())
    }
}

/// Change source that hands the registered handler to the test.
#[derive(Default)]
pub struct ManualSource {
    handler: Mutex<Option<Arc<dyn ClipboardChangeHandler>>>,
}

impl ManualSource {
    pub fn handler(&self) -> Option<Arc<dyn ClipboardChangeHandler>> {
        self.handler.lock().unwrap().clone()
    }

    pub async fn wait_for_handler(&self) -> Arc<dyn ClipboardChangeHandler> {
        for _ in 0..500 {
            if let Some(handler) = self.handler() {
                return handler;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("clipboard source was never started");
    }
}

#[async_trait]
impl ClipboardChangeSourcePort for ManualSource {
    async fn start(&self, handler: Arc<dyn ClipboardChangeHandler>) -> Result<()> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.handler.lock().unwrap().take();
        Ok(())
    }
}

/// Transport that never connects.
pub struct OfflineTransport;

#[async_trait]
impl RealtimeTransportPort for OfflineTransport {
    async fn connect(&self, _token: &str, _device_id: &DeviceId) -> Result<RealtimeLink> {
        anyhow::bail!("offline")
    }
}

/// The engine components wired over one collection, as `SyncEngine` does.
pub struct Harness {
    pub dir: TempDir,
    pub drafts: Arc<JsonDraftStore>,
    pub cache: Arc<MemoryCache>,
    pub spool: Arc<MemorySpool>,
    pub clipboard: Arc<FakeClipboard>,
    pub clock: Arc<FakeClock>,
    pub history: SharedHistory,
    pub signals: EngineSignals,
    pub tasks: Arc<EntryTasks>,
    pub tracker: TaskTracker,
    pub watcher: Arc<CaptureWatcher>,
    pub captured: tokio::sync::mpsc::UnboundedReceiver<ClipboardEntry>,
    pub pipeline: Arc<UploadPipeline>,
    pub reconcile: Arc<ReconciliationEngine>,
    pub actions: Arc<EntryActions>,
}

impl Harness {
    pub fn new(api: Arc<dyn ClipboardApiPort>) -> Self {
        Self::in_dir(api, tempfile::tempdir().unwrap())
    }

    pub fn in_dir(api: Arc<dyn ClipboardApiPort>, dir: TempDir) -> Self {
        let drafts = Arc::new(JsonDraftStore::in_dir(dir.path()));
        let cache = Arc::new(MemoryCache::default());
        let spool = Arc::new(MemorySpool::default());
        let clipboard = Arc::new(FakeClipboard::default());
        let clock = Arc::new(FakeClock::at(1_700_000_000_000));
        let history = shared_history();
        let signals = EngineSignals::new();
        let tasks = Arc::new(EntryTasks::new());
        let tracker = TaskTracker::new();

        let (watcher, captured) =
            CaptureWatcher::new(clock.clone(), spool.clone(), Arc::new(FakeDevice), 1000);
        let pipeline = Arc::new(UploadPipeline::new(
            api.clone(),
            drafts.clone(),
            Arc::new(FakeDevice),
            history.clone(),
            tasks.clone(),
            signals.clone(),
            tracker.clone(),
        ));
        let reconcile = Arc::new(ReconciliationEngine::new(
            api.clone(),
            drafts.clone(),
            cache.clone(),
            history.clone(),
            tasks.clone(),
            signals.clone(),
            20,
        ));
        let actions = Arc::new(EntryActions::new(
            api,
            drafts.clone(),
            spool.clone(),
            clipboard.clone(),
            watcher.clone(),
            history.clone(),
            tasks.clone(),
            signals.clone(),
        ));

        Self {
            dir,
            drafts,
            cache,
            spool,
            clipboard,
            clock,
            history,
            signals,
            tasks,
            tracker,
            watcher,
            captured,
            pipeline,
            reconcile,
            actions,
        }
    }

    pub async fn ids(&self) -> Vec<String> {
        self.history
            .lock()
            .await
            .ids()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub async fn state_of(&self, id: &str) -> Option<UploadState> {
        self.history
            .lock()
            .await
            .get(&EntryId::from(id))
            .map(|entry| entry.upload_state)
    }

    pub async fn draft_ids(&self) -> Vec<String> {
        self.drafts
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.id.into_inner())
            .collect()
    }

    /// `Failed` in the collection ⇔ present in the draft store, and the
    /// published count matches the store.
    pub async fn assert_draft_invariant(&self) {
        let drafts = self.draft_ids().await;
        let history = self.history.lock().await;
        history.check_invariants().unwrap();

        for entry in history.snapshot() {
            let in_store = drafts.contains(&entry.id.to_string());
            assert_eq!(
                entry.upload_state == UploadState::Failed,
                in_store,
                "entry {} in state {:?}, in draft store: {}",
                entry.id,
                entry.upload_state,
                in_store
            );
        }
        for id in &drafts {
            let entry = history.get(&EntryId::from(id.as_str()));
            assert!(
                matches!(entry, Some(e) if e.upload_state == UploadState::Failed),
                "draft {id} has no failed entry in the collection"
            );
        }
        assert_eq!(self.signals.draft_count(), drafts.len());
    }
}
