//! Paginated list retrieval
//!
//! ARM list endpoints return `{"value": [...], "nextLink": "..."}`. The
//! `nextLink` is an absolute URL that already carries `api-version` and the
//! skip token, so it is followed verbatim until it disappears.

use super::client::AzureClient;
use super::http::ArmRequest;
use anyhow::{bail, Context, Result};
use futures::Stream;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::marker::PhantomData;

/// Result of one page fetch
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default, rename = "nextLink")]
    next_link: Option<String>,
}

enum Cursor {
    First { url: String, api_version: String },
    Next(String),
    Done,
}

/// Page-at-a-time iterator over an ARM collection
pub struct Pager<T> {
    client: AzureClient,
    cursor: Cursor,
    pages: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Pager<T> {
    pub fn new(client: AzureClient, url: String, api_version: &str) -> Self {
        Self {
            client,
            cursor: Cursor::First {
                url,
                api_version: api_version.to_string(),
            },
            pages: 0,
            _item: PhantomData,
        }
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Fetch the next page; `None` once the collection is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Page<T>>> {
        let followed = match &self.cursor {
            Cursor::Done => return Ok(None),
            Cursor::First { url, .. } => url.clone(),
            Cursor::Next(link) => link.clone(),
        };
        let response = match &self.cursor {
            Cursor::Done => return Ok(None),
            Cursor::First { url, api_version } => self
                .client
                .send(ArmRequest::new(Method::GET, url).query("api-version", api_version))
                .await
                .with_context(|| format!("listing {}", url))?,
            Cursor::Next(link) => self
                .client
                .send(ArmRequest::new(Method::GET, link))
                .await
                .with_context(|| format!("following nextLink {}", link))?,
        };

        self.pages += 1;

        let list: ListResponse<T> = if response.body.is_null() {
            ListResponse {
                value: Vec::new(),
                next_link: None,
            }
        } else {
            serde_json::from_value(response.body).context("decoding list page")?
        };

        let next_link = list.next_link.filter(|link| !link.trim().is_empty());
        if next_link.as_deref() == Some(followed.as_str()) {
            self.cursor = Cursor::Done;
            bail!("nextLink {} points back at the page just fetched", followed);
        }
        self.cursor = match &next_link {
            Some(link) => Cursor::Next(link.clone()),
            None => Cursor::Done,
        };

        tracing::debug!(
            "page {}: {} items, more: {}",
            self.pages,
            list.value.len(),
            next_link.is_some()
        );

        Ok(Some(Page {
            items: list.value,
            next_link,
        }))
    }

    /// Fetch all items (auto-paginate)
    pub async fn list_all(self) -> Result<Vec<T>> {
        self.list_all_matching(|_| true).await
    }

    /// Fetch all items, keeping those accepted by `predicate`
    pub async fn list_all_matching<F>(mut self, predicate: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        let mut all_items = Vec::new();

        while let Some(page) = self.next_page().await? {
            all_items.extend(page.items.into_iter().filter(|item| predicate(item)));
        }

        Ok(all_items)
    }

    /// Stream pages as they arrive
    pub fn into_stream(self) -> impl Stream<Item = Result<Page<T>>> {
        futures::stream::try_unfold(self, |mut pager| async move {
            Ok::<_, anyhow::Error>(pager.next_page().await?.map(|page| (page, pager)))
        })
    }
}
