use serde::{Deserialize, Serialize};

use crate::clipboard::ClipboardEntry;

/// Which slice of the remote history a fetch targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ItemFilter {
    #[default]
    All,
    Search(String),
    Category(String),
    BookmarkedOnly,
}

impl ItemFilter {
    pub fn is_unfiltered(&self) -> bool {
        matches!(self, ItemFilter::All)
    }

    /// Query-string pairs appended to the list request.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            ItemFilter::All => Vec::new(),
            ItemFilter::Search(term) => vec![("search", term.clone())],
            ItemFilter::Category(id) => vec![("category", id.clone())],
            ItemFilter::BookmarkedOnly => vec![("bookmarked_only", "true".to_string())],
        }
    }

    /// Whether a local-only entry belongs in this view.
    ///
    /// Category membership lives on the server, so unconfirmed entries never
    /// show under a category.
    pub fn matches_local(&self, entry: &ClipboardEntry) -> bool {
        match self {
            ItemFilter::All => true,
            ItemFilter::Search(term) => {
                let term = term.trim().to_lowercase();
                term.is_empty()
                    || entry
                        .content
                        .as_deref()
                        .is_some_and(|content| content.to_lowercase().contains(&term))
            }
            ItemFilter::Category(_) => false,
            ItemFilter::BookmarkedOnly => entry.is_bookmarked,
        }
    }
}

/// A logical query context: filter plus page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub filter: ItemFilter,
    pub page_size: u32,
}

impl FetchQuery {
    pub fn new(filter: ItemFilter, page_size: u32) -> Self {
        Self {
            filter,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self, page: u32) -> PageRequest {
        PageRequest {
            query: self.clone(),
            page,
        }
    }
}

/// One page of a query; pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: FetchQuery,
    pub page: u32,
}

impl PageRequest {
    pub fn is_first(&self) -> bool {
        self.page <= 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<ClipboardEntry>,
    pub has_more: bool,
}
