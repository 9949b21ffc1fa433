//! Pagination module
//!
//! Turns a paged "fetch a batch + continuation token" call into a lazy,
//! pull-based sequence of records.
//!
//! # Overview
//!
//! - `PageFetcher` - the fetch capability: optional token in, page out
//! - `PaginatingIterator` - buffers one page at a time and follows tokens
//! - `FetchBuilder` / `BoundQuery` - pre-bind query parameters to a table client
//! - `fetch_fn` - use a closure as a fetcher

mod binder;
mod iterator;
mod types;

pub use binder::{BoundQuery, FetchBuilder};
pub use iterator::PaginatingIterator;
pub use types::{fetch_fn, FnFetcher, Next, PageFetcher};
