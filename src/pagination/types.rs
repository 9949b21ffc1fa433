//! Pagination types and traits
//!
//! Defines the fetch capability the iterator pulls pages from and the
//! tagged result it yields.

use crate::error::Result;
use crate::types::{ContinuationToken, Page, Record};
use async_trait::async_trait;
use std::future::Future;

/// Result of pulling from a [`super::PaginatingIterator`]
#[derive(Debug, Clone, PartialEq)]
pub enum Next {
    /// The next unyielded record
    Record(Record),
    /// The sequence is exhausted. Normal termination, not an error.
    End,
}

impl Next {
    /// Check if this is the end marker
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Convert into an `Option`, `None` at the end
    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::End => None,
        }
    }
}

/// A paged fetch bound to fixed query parameters.
///
/// Called with the continuation token from the previous page, or `None` for
/// the first page. Failures are returned unchanged to the iterator's caller.
#[async_trait]
pub trait PageFetcher: Send {
    /// Fetch one page
    async fn fetch(&mut self, token: Option<&ContinuationToken>) -> Result<Page>;
}

#[async_trait]
impl<P: PageFetcher + ?Sized> PageFetcher for Box<P> {
    async fn fetch(&mut self, token: Option<&ContinuationToken>) -> Result<Page> {
        (**self).fetch(token).await
    }
}

/// Adapter turning a closure into a [`PageFetcher`]
pub struct FnFetcher<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnFetcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFetcher").finish_non_exhaustive()
    }
}

/// Wrap a closure taking an owned optional token as a [`PageFetcher`]
///
/// ```ignore
/// let fetcher = fetch_fn(|token| async move { client.page_after(token).await });
/// let mut iter = PaginatingIterator::new(fetcher);
/// ```
pub fn fetch_fn<F, Fut>(f: F) -> FnFetcher<F>
where
    F: FnMut(Option<ContinuationToken>) -> Fut + Send,
    Fut: Future<Output = Result<Page>> + Send,
{
    FnFetcher { f }
}

#[async_trait]
impl<F, Fut> PageFetcher for FnFetcher<F>
where
    F: FnMut(Option<ContinuationToken>) -> Fut + Send,
    Fut: Future<Output = Result<Page>> + Send,
{
    async fn fetch(&mut self, token: Option<&ContinuationToken>) -> Result<Page> {
        (self.f)(token.cloned()).await
    }
}
