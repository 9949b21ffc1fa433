//! Expression module
//!
//! Builders for key conditions and filter conditions, composition helpers,
//! rendering to store expression text, and in-process evaluation.
//!
//! # Example
//!
//! ```ignore
//! use dynamo_pager::expression::{combine_all, Attr, Key};
//!
//! let key = Key::new("GSI1PK").eq("tenant#1").and(Key::new("GSI1SK").begins_with("order#"));
//! let filter = combine_all([Attr::new("status").eq("open"), Attr::new("total").gt(100)]);
//! ```

mod condition;
mod eval;
mod render;

pub use condition::{combine_all, combine_any, Attr, Comparator, Condition, Key, KeyCondition};
pub use eval::{compare_values, resolve_attr};
pub use render::{ExpressionRenderer, RenderedExpression};
