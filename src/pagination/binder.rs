//! Binding fixed query parameters to a table client
//!
//! The iterator only ever supplies a continuation token; everything else
//! about the query is fixed here, up front.

use super::types::PageFetcher;
use crate::error::Result;
use crate::store::{QueryParams, TableClient};
use crate::types::{ContinuationToken, Page};
use async_trait::async_trait;
use std::sync::Arc;

/// Builder that accumulates query parameters for a [`BoundQuery`]
#[derive(Clone)]
pub struct FetchBuilder {
    client: Arc<dyn TableClient>,
    params: QueryParams,
}

impl FetchBuilder {
    /// Start binding against a client
    pub fn new(client: Arc<dyn TableClient>) -> Self {
        Self {
            client,
            params: QueryParams::default(),
        }
    }

    /// Apply parameters. Fields set here override fields set by earlier calls.
    #[must_use]
    pub fn having(mut self, params: QueryParams) -> Self {
        self.params = self.params.merge(params);
        self
    }

    /// Finish binding
    pub fn build(self) -> BoundQuery {
        BoundQuery {
            client: self.client,
            params: self.params,
        }
    }
}

/// A query with fixed parameters, fetchable page by page
#[derive(Clone)]
pub struct BoundQuery {
    client: Arc<dyn TableClient>,
    params: QueryParams,
}

impl BoundQuery {
    /// The parameters applied to every fetch
    pub fn params(&self) -> &QueryParams {
        &self.params
    }
}

impl std::fmt::Debug for BoundQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundQuery")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PageFetcher for BoundQuery {
    async fn fetch(&mut self, token: Option<&ContinuationToken>) -> Result<Page> {
        self.client.query(&self.params, token).await
    }
}
