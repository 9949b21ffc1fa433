// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # dynamo-pager
//!
//! Lazy, record-at-a-time iteration over paged key-value store queries.
//!
//! ## Features
//!
//! - **Paginating iterator**: Hides continuation tokens; fetches a page only when
//!   the buffer runs dry
//! - **Fetch binder**: Fixes query parameters once, reuses them for every page
//! - **Expressions**: Typed key, filter and update expressions with placeholder rendering
//! - **In-memory table**: Sorted store with secondary indexes for local use and tests
//! - **Table service**: Batch writes, conditional updates, filter helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dynamo_pager::expression::Key;
//! use dynamo_pager::store::{MemoryTable, QueryParams};
//! use dynamo_pager::{Next, TableService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> dynamo_pager::Result<()> {
//!     let service = TableService::new(Arc::new(MemoryTable::new()));
//!     let params = QueryParams::new()
//!         .key_condition(Key::new("PK").eq("customer#1"))
//!         .limit(50);
//!
//!     let mut orders = service.db_iterator(params);
//!     while let Next::Record(order) = orders.produce_next().await? {
//!         println!("{order:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TableService                          │
//! │  db_iterator()   add_batch_items()   update_item()   ...     │
//! └──────────────────────────────────────────────────────────────┘
//!                │                                 │
//! ┌──────────────┴───────────────┐   ┌─────────────┴────────────┐
//! │          Pagination          │   │       TableClient        │
//! ├──────────────────────────────┤   ├──────────────────────────┤
//! │ PaginatingIterator           │──▶│ query()                  │
//! │ FetchBuilder / BoundQuery    │   │ batch_write()            │
//! │ fetch_fn                     │   │ update_item()            │
//! └──────────────────────────────┘   │ MemoryTable              │
//!                                    └──────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Records, continuation tokens and pages
pub mod types;

/// Paginating iterator and fetch binder
pub mod pagination;

/// Key, filter and update expressions
pub mod expression;

/// Table client trait and in-memory table
pub mod store;

/// Table service helpers
pub mod service;

/// Environment settings
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::Settings;
pub use pagination::{Next, PageFetcher, PaginatingIterator};
pub use service::TableService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
