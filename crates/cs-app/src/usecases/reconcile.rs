//! Reconciliation engine
//! 对账引擎
//!
//! Merges paginated REST fetches and realtime push events into the shared
//! entry collection. At most one fetch per query context is in flight; a
//! superseded fetch is cancelled and its late result discarded.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use cs_core::ports::{ApiError, ClipboardApiPort, DraftStorePort, EntryCachePort};
use cs_core::{
    ClipboardEntry, FetchQuery, ItemFilter, ItemPage, PageRequest, PushEvent, UploadState,
};

use crate::events::{EngineEvent, EngineSignals};
use crate::history::{EntryCollection, SharedHistory};
use crate::tasks::EntryTasks;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The page was applied; `count` items came back.
    Applied { count: usize, has_more: bool },
    /// A newer query replaced this one; nothing was applied.
    Superseded,
    /// The first page failed and the cached snapshot is shown instead.
    FellBackToCache { count: usize },
    /// No further pages for the current query.
    Exhausted,
    Failed(ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Changed,
    Unchanged,
    /// The server asked for a full resync; the caller runs a first-page refresh.
    ResyncRequested,
}

#[derive(Debug)]
struct FetchContext {
    generation: u64,
    token: CancellationToken,
    query: FetchQuery,
    next_page: u32,
    has_more: bool,
}

pub struct ReconciliationEngine {
    api: Arc<dyn ClipboardApiPort>,
    drafts: Arc<dyn DraftStorePort>,
    cache: Arc<dyn EntryCachePort>,
    history: SharedHistory,
    tasks: Arc<EntryTasks>,
    signals: EngineSignals,
    context: Mutex<FetchContext>,
}

impl ReconciliationEngine {
    pub fn new(
        api: Arc<dyn ClipboardApiPort>,
        drafts: Arc<dyn DraftStorePort>,
        cache: Arc<dyn EntryCachePort>,
        history: SharedHistory,
        tasks: Arc<EntryTasks>,
        signals: EngineSignals,
        page_size: u32,
    ) -> Self {
        Self {
            api,
            drafts,
            cache,
            history,
            tasks,
            signals,
            context: Mutex::new(FetchContext {
                generation: 0,
                token: CancellationToken::new(),
                query: FetchQuery::new(ItemFilter::All, page_size),
                next_page: 1,
                has_more: false,
            }),
        }
    }

    pub fn current_filter(&self) -> ItemFilter {
        self.lock_context().query.filter.clone()
    }

    /// Start a new query context and fetch its first page.
    ///
    /// Any fetch still running for the previous context is cancelled.
    pub async fn refresh(&self, filter: ItemFilter) -> FetchOutcome {
        let (generation, token, request) = {
            let mut ctx = self.lock_context();
            ctx.token.cancel();
            ctx.generation += 1;
            ctx.token = CancellationToken::new();
            ctx.query = FetchQuery::new(filter, ctx.query.page_size);
            ctx.next_page = 1;
            ctx.has_more = false;
            (ctx.generation, ctx.token.clone(), ctx.query.page(1))
        };

        let span = info_span!("usecase.reconcile.refresh", generation, filter = ?request.query.filter);
        self.fetch(generation, token, request).instrument(span).await
    }

    /// Cancel whatever fetch is running for the current context.
    pub fn cancel_in_flight(&self) {
        self.lock_context().token.cancel();
    }

    /// Fetch the next page of the current query context.
    pub async fn load_next_page(&self) -> FetchOutcome {
        let (generation, token, request) = {
            let ctx = self.lock_context();
            if !ctx.has_more || ctx.next_page <= 1 {
                return FetchOutcome::Exhausted;
            }
            (ctx.generation, ctx.token.clone(), ctx.query.page(ctx.next_page))
        };

        let span = info_span!("usecase.reconcile.load_next_page", generation, page = request.page);
        self.fetch(generation, token, request).instrument(span).await
    }

    /// Apply already fetched items for the current filter.
    ///
    /// A first page replaces every confirmed entry with server truth; drafts
    /// and pending uploads always survive. Later pages append.
    pub async fn apply_fetch_page(&self, items: Vec<ClipboardEntry>, first_page: bool) {
        let mut history = self.history.lock().await;
        Self::apply_page_locked(&mut history, items, first_page);
        drop(history);
        self.signals.emit(EngineEvent::EntriesChanged);
    }

    /// Snapshot of what the current view shows.
    pub async fn visible_entries(&self) -> Vec<ClipboardEntry> {
        let filter = self.current_filter();
        self.history.lock().await.visible(&filter)
    }

    /// Apply one realtime event.
    pub async fn apply_push_event(&self, event: PushEvent) -> PushOutcome {
        let span = info_span!("usecase.reconcile.apply_push_event", event = event.name());
        async move {
            let outcome = match event {
                PushEvent::NewItem(item) => {
                    let entry = match item.into_entry() {
                        Ok(entry) => entry,
                        Err(err) => {
                            warn!(error = %err, "Dropping malformed new_item payload");
                            return PushOutcome::Unchanged;
                        }
                    };
                    if !self.current_filter().is_unfiltered() {
                        debug!(entry_id = %entry.id, "Filtered view active, not inserting pushed item");
                        return PushOutcome::Unchanged;
                    }
                    let inserted = self.history.lock().await.insert_if_absent(entry);
                    if inserted {
                        PushOutcome::Changed
                    } else {
                        PushOutcome::Unchanged
                    }
                }
                PushEvent::UpdateItem(patch) => {
                    let updated = self
                        .history
                        .lock()
                        .await
                        .update(&patch.id, |entry| entry.apply_patch(&patch));
                    if updated {
                        PushOutcome::Changed
                    } else {
                        PushOutcome::Unchanged
                    }
                }
                PushEvent::DeleteItem(id) => {
                    let removed = {
                        let mut history = self.history.lock().await;
                        let removed = history.remove(&id);
                        if removed.is_some() {
                            self.tasks.cancel(&id);
                        }
                        removed
                    };
                    match removed {
                        Some(removed) => {
                            if removed.upload_state == UploadState::Failed {
                                if let Err(err) = self.drafts.remove(&id).await {
                                    warn!(entry_id = %id, error = %err, "Failed to remove draft");
                                }
                            }
                            PushOutcome::Changed
                        }
                        None => PushOutcome::Unchanged,
                    }
                }
                PushEvent::Sync => PushOutcome::ResyncRequested,
                PushEvent::Unknown(name) => {
                    warn!(event = %name, "Dropping unknown push event");
                    PushOutcome::Unchanged
                }
            };

            if outcome == PushOutcome::Changed {
                self.signals.emit(EngineEvent::EntriesChanged);
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn fetch(
        &self,
        generation: u64,
        token: CancellationToken,
        request: PageRequest,
    ) -> FetchOutcome {
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Fetch cancelled by a newer query");
                return FetchOutcome::Superseded;
            }
            response = self.api.list_items(&request) => response,
        };

        match response {
            Ok(page) => self.apply_response(generation, &request, page).await,
            Err(err) => {
                if !self.is_current(generation, &token) {
                    return FetchOutcome::Superseded;
                }
                self.signals.report_api_error("fetch", &err);
                if request.is_first() && request.query.filter.is_unfiltered() {
                    self.fall_back_to_cache(generation, &token).await
                } else {
                    FetchOutcome::Failed(err)
                }
            }
        }
    }

    async fn apply_response(
        &self,
        generation: u64,
        request: &PageRequest,
        page: ItemPage,
    ) -> FetchOutcome {
        let count = page.items.len();
        let mut history = self.history.lock().await;

        // Checked under the collection lock so a newer query cannot slip in
        // between the check and the mutation.
        {
            let mut ctx = self.lock_context();
            if ctx.generation != generation || ctx.token.is_cancelled() {
                debug!(page = request.page, "Discarding late page from superseded query");
                return FetchOutcome::Superseded;
            }
            ctx.next_page = request.page + 1;
            ctx.has_more = page.has_more;
        }

        Self::apply_page_locked(&mut history, page.items, request.is_first());
        let snapshot = (request.is_first() && request.query.filter.is_unfiltered())
            .then(|| history.snapshot());
        drop(history);

        if let Some(snapshot) = snapshot {
            if let Err(err) = self.cache.save(&snapshot).await {
                warn!(error = %err, "Failed to write entry cache");
            }
        }

        info!(page = request.page, count, has_more = page.has_more, "Applied fetch page");
        self.signals.emit(EngineEvent::EntriesChanged);
        FetchOutcome::Applied {
            count,
            has_more: page.has_more,
        }
    }

    async fn fall_back_to_cache(&self, generation: u64, token: &CancellationToken) -> FetchOutcome {
        let cached = match self.cache.load().await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(error = %err, "Failed to read entry cache");
                Vec::new()
            }
        };

        let mut history = self.history.lock().await;
        if !self.is_current(generation, token) {
            return FetchOutcome::Superseded;
        }
        let count = cached.len();
        // Drafts and pending uploads are already in memory; never let a stale
        // snapshot overwrite them.
        for entry in cached {
            history.insert_if_absent(entry);
        }
        drop(history);

        info!(count, "First page unavailable, showing cached entries");
        self.signals.emit(EngineEvent::EntriesChanged);
        FetchOutcome::FellBackToCache { count }
    }

    fn apply_page_locked(history: &mut EntryCollection, items: Vec<ClipboardEntry>, first_page: bool) {
        if first_page {
            // Unconfirmed entries are owned by the upload pipeline; views
            // hide them by filter instead.
            history.retain(|entry| !entry.upload_state.is_confirmed());
        }
        for item in items {
            history.merge_remote(item);
        }
    }

    fn is_current(&self, generation: u64, token: &CancellationToken) -> bool {
        let ctx = self.lock_context();
        ctx.generation == generation && !token.is_cancelled()
    }

    fn lock_context(&self) -> std::sync::MutexGuard<'_, FetchContext> {
        self.context.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
