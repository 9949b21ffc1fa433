//! Lazy, cursor-resuming iterator over a paged fetch
//!
//! Records within a page are yielded from the back of the page buffer, so a
//! page `[A, B, C]` comes out as `C, B, A`. Callers that need store order
//! within a page must reverse it themselves.

use super::types::{Next, PageFetcher};
use crate::error::Result;
use crate::types::{ContinuationToken, Record};
use futures::stream::{self, Stream};
use tracing::{debug, warn};

/// Single-pass, pull-based sequence over a paginated result set
#[derive(Debug)]
pub struct PaginatingIterator<F> {
    /// Bound fetch capability
    fetcher: F,
    /// Cursor to resume from; `None` before the first fetch and after the last page
    pending_token: Option<ContinuationToken>,
    /// Records of the latest page not yet yielded
    buffer: Vec<Record>,
    /// Set once the first fetch has returned successfully
    has_fetched_once: bool,
    pages_fetched: u64,
    records_yielded: u64,
}

impl<F: PageFetcher> PaginatingIterator<F> {
    /// Create an iterator that has not fetched anything yet
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            pending_token: None,
            buffer: Vec::new(),
            has_fetched_once: false,
            pages_fetched: 0,
            records_yielded: 0,
        }
    }

    /// Return the next record, fetching pages as needed.
    ///
    /// Returns [`Next::End`] once the buffer is empty and the store has no
    /// further pages; every later call returns [`Next::End`] again. A page
    /// that is empty but carries a token is followed immediately.
    ///
    /// A fetch error leaves the iterator untouched, so calling again retries
    /// the same page.
    pub async fn produce_next(&mut self) -> Result<Next> {
        loop {
            if let Some(record) = self.buffer.pop() {
                self.records_yielded += 1;
                return Ok(Next::Record(record));
            }

            if !self.needs_fetch() {
                return Ok(Next::End);
            }

            self.fetch_page().await?;
        }
    }

    /// Pull every remaining record into a vector, in yield order.
    ///
    /// Materializes the whole result set in memory. If a fetch fails part way,
    /// the records collected so far are dropped with the error; calling again
    /// returns only the rest. Loop on [`produce_next`](Self::produce_next) to
    /// keep every record across a retry.
    pub async fn drain_to_list(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Next::Record(record) = self.produce_next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// First record of the sequence, or `None` if it is empty.
    ///
    /// Drains the entire sequence to get there.
    pub async fn first_or_default(&mut self) -> Result<Option<Record>> {
        Ok(self.drain_to_list().await?.into_iter().next())
    }

    /// Adapt into a `Stream` of records.
    ///
    /// The stream ends at [`Next::End`]. An error is yielded as an item and
    /// the stream stays usable, so polling again retries the failed page.
    /// A fetcher that keeps failing yields errors forever, so consumers should
    /// stop at the first error (`TryStreamExt::try_next` or `try_collect`)
    /// unless they mean to retry.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record>> {
        stream::unfold(self, |mut iter| async move {
            match iter.produce_next().await {
                Ok(Next::Record(record)) => Some((Ok(record), iter)),
                Ok(Next::End) => None,
                Err(e) => Some((Err(e), iter)),
            }
        })
    }

    /// Buffer empty, no cursor left, and at least one page fetched
    pub fn is_exhausted(&self) -> bool {
        self.has_fetched_once && self.buffer.is_empty() && self.pending_token.is_none()
    }

    /// Cursor the next fetch will resume from
    pub fn pending_token(&self) -> Option<&ContinuationToken> {
        self.pending_token.as_ref()
    }

    /// Records fetched but not yet yielded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of successful fetches so far
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Number of records yielded so far
    pub fn records_yielded(&self) -> u64 {
        self.records_yielded
    }

    fn needs_fetch(&self) -> bool {
        !self.has_fetched_once || self.pending_token.is_some()
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page_number = self.pages_fetched + 1;
        debug!(
            "Fetching page {} (resuming: {})",
            page_number,
            self.pending_token.is_some()
        );

        let page = match self.fetcher.fetch(self.pending_token.as_ref()).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Fetching page {} failed: {}", page_number, e);
                return Err(e);
            }
        };

        debug!(
            "Page {} returned {} records (more pages: {})",
            page_number,
            page.records.len(),
            page.has_more()
        );

        self.buffer = page.records;
        self.pending_token = page.next_token;
        self.has_fetched_once = true;
        self.pages_fetched = page_number;
        Ok(())
    }
}
