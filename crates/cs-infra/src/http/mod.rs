//! REST client for the remote clipboard store.
mod client;

pub use client::HttpClipboardApi;
