//! Paged directory retrieval
//!
//! Drives the continuation-cookie protocol of a paged search one page at a
//! time. The reader does not own the client, so the caller can issue other
//! requests (auxiliary group lookups) on the same connection between pages.

use tracing::debug;

use crate::entry::{DirectoryPage, PageRequest};
use crate::error::DirectoryResult;
use crate::traits::DirectoryClient;

/// Cursor over the pages of one search.
#[derive(Debug)]
pub struct DirectoryPageReader {
    request: PageRequest,
    cookie: Option<Vec<u8>>,
    pages: usize,
    done: bool,
}

impl DirectoryPageReader {
    /// Start a paged search.
    pub fn new(request: PageRequest) -> Self {
        Self {
            request,
            cookie: None,
            pages: 0,
            done: false,
        }
    }

    /// The search being paged.
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Check whether the server has returned its last page.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch the next page, or `Ok(None)` once the cookie came back empty.
    ///
    /// Errors are returned as-is and leave the reader where it was; there is
    /// no retry.
    pub async fn next_page(
        &mut self,
        client: &mut dyn DirectoryClient,
    ) -> DirectoryResult<Option<DirectoryPage>> {
        if self.done {
            return Ok(None);
        }

        let page = client
            .search_page(&self.request, self.cookie.as_deref())
            .await?;
        self.pages += 1;

        if page.has_more() {
            self.cookie = page.cookie;
        } else {
            self.cookie = None;
            self.done = true;
        }

        debug!(
            page = self.pages,
            entries = page.entries.len(),
            more = !self.done,
            "Fetched directory page"
        );
        Ok(Some(DirectoryPage {
            entries: page.entries,
        }))
    }
}

/// Fetch every page of a search.
pub async fn fetch_pages(
    client: &mut dyn DirectoryClient,
    request: PageRequest,
) -> DirectoryResult<Vec<DirectoryPage>> {
    let mut reader = DirectoryPageReader::new(request);
    let mut pages = Vec::new();
    while let Some(page) = reader.next_page(client).await? {
        pages.push(page);
    }
    Ok(pages)
}
