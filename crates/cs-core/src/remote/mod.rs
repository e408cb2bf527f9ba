//! Remote store DTOs and query model.
mod category;
mod item;
mod query;
mod upload;

pub use category::Category;
pub use item::{deserialize_flexible_id, RemoteItem, RemoteItemError, RemotePatch};
pub use query::{FetchQuery, ItemFilter, ItemPage, PageRequest};
pub use upload::{UploadBody, UploadRequest};
