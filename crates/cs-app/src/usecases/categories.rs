//! Category passthrough with the engine's error-signal policy.

use std::sync::Arc;

use cs_core::ports::{ApiError, ClipboardApiPort};
use cs_core::{Category, EntryId};

use crate::events::EngineSignals;

pub struct CategoryService {
    api: Arc<dyn ClipboardApiPort>,
    signals: EngineSignals,
}

impl CategoryService {
    pub fn new(api: Arc<dyn ClipboardApiPort>, signals: EngineSignals) -> Self {
        Self { api, signals }
    }

    pub async fn list(&self) -> Result<Vec<Category>, ApiError> {
        self.observe("list_categories", self.api.list_categories().await)
    }

    pub async fn create(&self, name: &str) -> Result<Category, ApiError> {
        self.observe("create_category", self.api.create_category(name.trim()).await)
    }

    pub async fn delete(&self, category_id: &str) -> Result<(), ApiError> {
        self.observe("delete_category", self.api.delete_category(category_id).await)
    }

    pub async fn assign(&self, category_id: &str, item_id: &EntryId) -> Result<(), ApiError> {
        self.observe(
            "add_item_to_category",
            self.api.add_item_to_category(category_id, item_id).await,
        )
    }

    fn observe<T>(&self, context: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(err) = &result {
            self.signals.report_api_error(context, err);
        }
        result
    }
}
