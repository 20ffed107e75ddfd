//! Common types and utilities for the Vultr API

use super::error::ApiError;
use serde::Deserialize;
use std::future::Future;

/// Error body returned by the API, e.g. `{"error":"Nothing to change","status":400}`
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    #[serde(default)]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub links: Links,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub next: String,
    #[serde(default)]
    pub prev: String,
}

/// Cursor paging options for list endpoints
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub per_page: u32,
    pub cursor: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            per_page: 100,
            cursor: None,
        }
    }
}

impl ListOptions {
    pub fn to_query_string(&self) -> String {
        match &self.cursor {
            Some(cursor) => format!(
                "?per_page={}&cursor={}",
                self.per_page,
                urlencoding::encode(cursor)
            ),
            None => format!("?per_page={}", self.per_page),
        }
    }
}

/// Follows `meta.links.next` until the API stops returning a cursor
pub async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(ListOptions) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Meta), ApiError>>,
{
    let mut options = ListOptions::default();
    let mut items = Vec::new();

    loop {
        let (page, meta) = fetch_page(options.clone()).await?;
        items.extend(page);

        let next = meta.links.next;
        if next.is_empty() || options.cursor.as_deref() == Some(next.as_str()) {
            break;
        }
        tracing::debug!("Following list cursor {}", next);
        options.cursor = Some(next);
    }

    Ok(items)
}
