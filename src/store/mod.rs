//! Store module
//!
//! The table client boundary and an in-memory implementation of it.
//!
//! # Overview
//!
//! - `TableClient` - query, batch write and update against a managed table
//! - `QueryParams` - fixed parameters of one query
//! - `MemoryTable` - ordered in-memory table with secondary indexes

mod memory;
mod types;

pub use memory::{KeySchema, MemoryTable};
pub use types::{
    BatchWriteOutput, QueryParams, ReturnValues, TableClient, UpdateAction, UpdateExpression,
    UpdateItemRequest, WriteRequest, MAX_BATCH_WRITE,
};
