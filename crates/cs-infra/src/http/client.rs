use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use cs_core::config::ServerConfig;
use cs_core::ports::{ApiError, ClipboardApiPort};
use cs_core::remote::{Category, ItemPage, PageRequest, RemoteItem, UploadBody, UploadRequest};
use cs_core::{ClipboardEntry, EntryId};

const UPLOAD_FILE_NAME: &str = "clipboard.png";

/// List endpoints answer either with an envelope or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Envelope {
        #[serde(alias = "results", alias = "data")]
        items: Vec<Value>,
        #[serde(default)]
        has_more: Option<bool>,
        #[serde(default)]
        next: Option<String>,
    },
    Bare(Vec<Value>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CategoryList {
    Envelope {
        #[serde(alias = "results", alias = "data")]
        items: Vec<Category>,
    },
    Bare(Vec<Category>),
}

pub struct HttpClipboardApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClipboardApi {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client failed")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        Self::new(
            config.api_base_url.clone(),
            config.token.clone(),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }

    /// Send and turn non-2xx statuses into classified errors.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "Request rejected");
        Err(ApiError::from_status(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn upload_form(request: UploadRequest) -> Result<Form, ApiError> {
        let form = Form::new()
            .text("content_type", request.content_type.as_str())
            .text("device_id", request.device_id.to_string())
            .text("created_at", request.created_at_rfc3339());

        let form = match request.body {
            UploadBody::Text(content) => form.text("content", content),
            UploadBody::ImageFile(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    ApiError::InvalidRequest(format!("read {} failed: {}", path.display(), e))
                })?;
                form.part("file", image_part(bytes)?)
            }
            UploadBody::ImageBytes(bytes) => form.part("file", image_part(bytes)?),
        };
        Ok(form)
    }
}

fn image_part(bytes: Vec<u8>) -> Result<Part, ApiError> {
    Part::bytes(bytes)
        .file_name(UPLOAD_FILE_NAME)
        .mime_str("image/png")
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else if err.is_builder() {
        ApiError::InvalidRequest(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Convert raw items, skipping the ones that fail to decode.
fn decode_items(values: Vec<Value>) -> Vec<ClipboardEntry> {
    values
        .into_iter()
        .filter_map(|value| {
            let item = match serde_json::from_value::<RemoteItem>(value) {
                Ok(item) => item,
                Err(err) => {
                    warn!(error = %err, "Skipping malformed item");
                    return None;
                }
            };
            let id = item.id.clone();
            match item.into_entry() {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(entry_id = %id, error = %err, "Skipping undecodable item");
                    None
                }
            }
        })
        .collect()
}

fn decode_single(value: Value) -> Result<ClipboardEntry, ApiError> {
    // Some deployments wrap the created item as `{"item": {...}}`.
    let value = match value {
        Value::Object(mut map) if map.contains_key("item") && !map.contains_key("id") => {
            map.remove("item").unwrap_or(Value::Null)
        }
        other => other,
    };
    let item: RemoteItem =
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))?;
    item.into_entry().map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl ClipboardApiPort for HttpClipboardApi {
    async fn list_items(&self, request: &PageRequest) -> Result<ItemPage, ApiError> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", request.page.max(1).to_string()),
            ("page_size", request.query.page_size.to_string()),
        ];
        query.extend(request.query.filter.query_pairs());

        let builder = self.client.get(self.url("clipboard/items")).query(&query);
        let response: ListResponse = self.send_json(builder).await?;

        let (raw, has_more) = match response {
            ListResponse::Envelope {
                items,
                has_more,
                next,
            } => {
                let more = has_more.unwrap_or(next.is_some());
                (items, more)
            }
            ListResponse::Bare(items) => {
                let more = items.len() >= request.query.page_size as usize;
                (items, more)
            }
        };
        let received = raw.len();
        let items = decode_items(raw);
        debug!(
            page = request.page,
            received,
            decoded = items.len(),
            has_more,
            "Fetched item page"
        );
        Ok(ItemPage { items, has_more })
    }

    async fn create_item(&self, request: UploadRequest) -> Result<ClipboardEntry, ApiError> {
        let form = Self::upload_form(request).await?;
        let builder = self.client.post(self.url("clipboard/items")).multipart(form);
        let value: Value = self.send_json(builder).await?;
        decode_single(value)
    }

    async fn update_content(&self, id: &EntryId, content: &str) -> Result<(), ApiError> {
        let builder = self
            .client
            .patch(self.url(&format!("clipboard/items/{}/content", id)))
            .json(&json!({ "content": content }));
        self.send(builder).await.map(|_| ())
    }

    async fn set_bookmark(&self, id: &EntryId, bookmarked: bool) -> Result<(), ApiError> {
        let builder = self
            .client
            .patch(self.url(&format!("clipboard/items/{}/bookmark", id)))
            .json(&json!({ "is_bookmarked": bookmarked }));
        self.send(builder).await.map(|_| ())
    }

    async fn delete_item(&self, id: &EntryId) -> Result<(), ApiError> {
        let builder = self
            .client
            .delete(self.url(&format!("clipboard/items/{}", id)));
        self.send(builder).await.map(|_| ())
    }

    async fn fetch_original(&self, id: &EntryId) -> Result<Vec<u8>, ApiError> {
        let builder = self
            .client
            .get(self.url(&format!("clipboard/items/{}/original", id)));
        let response = self.send(builder).await?;
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let builder = self.client.get(self.url("categories"));
        let list: CategoryList = self.send_json(builder).await?;
        Ok(match list {
            CategoryList::Envelope { items } | CategoryList::Bare(items) => items,
        })
    }

    async fn create_category(&self, name: &str) -> Result<Category, ApiError> {
        let builder = self
            .client
            .post(self.url("categories"))
            .json(&json!({ "name": name }));
        self.send_json(builder).await
    }

    async fn delete_category(&self, category_id: &str) -> Result<(), ApiError> {
        let builder = self
            .client
            .delete(self.url(&format!("categories/{}", category_id)));
        self.send(builder).await.map(|_| ())
    }

    async fn add_item_to_category(
        &self,
        category_id: &str,
        item_id: &EntryId,
    ) -> Result<(), ApiError> {
        let builder = self
            .client
            .post(self.url(&format!("categories/{}/items/{}", category_id, item_id)));
        self.send(builder).await.map(|_| ())
    }
}
