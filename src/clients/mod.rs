//! HTTP clients for the ERP and the storefront.
//!
//! The engine talks to both systems through the [`ErpApi`] and
//! [`StoreApi`] traits; [`TenClient`] and [`WooClient`] are the real
//! implementations.

mod envelope;
mod retry;
mod ten;
mod woo;

pub use envelope::ListEnvelope;
pub use retry::HttpSettings;
pub use ten::{ProductQuery, TenClient, TenSettings};
pub use woo::{
    CategoryPayload, CustomerQuery, OrderQuery, Page, ProductPayload, RemoteCategory,
    RemoteProduct, WooClient, WooSettings,
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value;

/// Errors raised by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("{context}: request failed: {source}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: HTTP {status}: {body}")]
    Status {
        context: String,
        status: u16,
        body: String,
    },

    #[error("{context}: unexpected response shape: {detail}")]
    UnexpectedShape { context: String, detail: String },
}

impl ClientError {
    pub(crate) fn shape(context: &str, detail: impl Into<String>) -> Self {
        ClientError::UnexpectedShape {
            context: context.to_string(),
            detail: detail.into(),
        }
    }
}

/// Read and write access to the ERP.
#[async_trait]
pub trait ErpApi: Send + Sync {
    /// Web categories of the configured company, at most `limit` rows.
    async fn categories(&self, limit: usize) -> Result<Vec<Value>, ClientError>;

    async fn products(&self, query: &ProductQuery) -> Result<Vec<Value>, ClientError>;

    async fn stocks(&self) -> Result<Vec<Value>, ClientError>;

    /// Customers changed after `modified_after`, with their addresses.
    async fn customers(&self, modified_after: NaiveDateTime) -> Result<Vec<Value>, ClientError>;

    /// Creates one customer; returns the raw per-customer result.
    async fn create_customer(&self, payload: &Value) -> Result<Value, ClientError>;
}

/// Read and write access to the storefront.
#[async_trait]
pub trait StoreApi: Send + Sync {
    async fn customers(&self, query: &CustomerQuery) -> Result<Vec<Value>, ClientError>;

    async fn orders(&self, query: &OrderQuery) -> Result<Vec<Value>, ClientError>;

    async fn categories_by_slug(&self, slug: &str) -> Result<Vec<RemoteCategory>, ClientError>;

    async fn create_category(
        &self,
        payload: &CategoryPayload,
    ) -> Result<RemoteCategory, ClientError>;

    async fn update_category(
        &self,
        id: i64,
        payload: &CategoryPayload,
    ) -> Result<RemoteCategory, ClientError>;

    async fn products_by_sku(&self, sku: &str) -> Result<Vec<RemoteProduct>, ClientError>;

    async fn product(&self, id: i64) -> Result<RemoteProduct, ClientError>;

    async fn create_product(&self, payload: &ProductPayload)
        -> Result<RemoteProduct, ClientError>;

    async fn update_product(
        &self,
        id: i64,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, ClientError>;
}
