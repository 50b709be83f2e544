//! Storefront (WooCommerce REST v3) client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::retry::HttpSettings;
use super::{ClientError, StoreApi};

/// Validated storefront endpoint settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WooSettings {
    /// REST root, e.g. `https://shop.example.com/wp-json/wc/v3`.
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub http: HttpSettings,
}

/// A page window; clamped to what the storefront accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub per_page: u32,
    pub page: u32,
}

impl Page {
    pub fn new(per_page: u32, page: u32) -> Self {
        Self {
            per_page: per_page.clamp(1, 100),
            page: page.max(1),
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
        ]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(100, 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerQuery {
    pub page: Page,
    pub email: Option<String>,
    pub search: Option<String>,
}

impl CustomerQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = self.page.params();
        push_opt(&mut params, "email", &self.email);
        push_opt(&mut params, "search", &self.search);
        params
    }
}

/// Order listing filters, passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderQuery {
    pub page: Page,
    pub status: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub modified_after: Option<String>,
    pub modified_before: Option<String>,
    pub customer: Option<i64>,
    pub search: Option<String>,
    pub orderby: Option<String>,
    pub order: Option<String>,
    pub include: Vec<i64>,
}

impl OrderQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = self.page.params();
        push_opt(&mut params, "status", &self.status);
        push_opt(&mut params, "after", &self.after);
        push_opt(&mut params, "before", &self.before);
        push_opt(&mut params, "modified_after", &self.modified_after);
        push_opt(&mut params, "modified_before", &self.modified_before);
        push_opt(&mut params, "customer", &self.customer.map(|id| id.to_string()));
        push_opt(&mut params, "search", &self.search);
        push_opt(&mut params, "orderby", &self.orderby);
        push_opt(&mut params, "order", &self.order);
        if !self.include.is_empty() {
            let ids: Vec<String> = self.include.iter().map(i64::to_string).collect();
            params.push(("include", ids.join(",")));
        }
        params
    }
}

fn push_opt(params: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        params.push((key, value.to_string()));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteCategory {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub parent: i64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPayload {
    pub name: String,
    pub slug: String,
    pub parent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteProduct {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub description: String,
}

/// Product create/update body. Unset fields are left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manage_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
}

pub struct WooClient {
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
    http: HttpSettings,
    client: reqwest::Client,
}

impl WooClient {
    pub fn new(settings: &WooSettings) -> Result<Self, ClientError> {
        for (name, value) in [
            ("woo.base_url", &settings.base_url),
            ("woo.consumer_key", &settings.consumer_key),
            ("woo.consumer_secret", &settings.consumer_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ClientError::Config(format!("{} is not set", name)));
            }
        }

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            consumer_key: settings.consumer_key.clone(),
            consumer_secret: settings.consumer_secret.clone(),
            client: settings.http.build_client()?,
            http: settings.http.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str, params: &[(&'static str, String)]) -> Result<Value, ClientError> {
        let url = self.url(path);
        self.http
            .send(path, || {
                self.client
                    .get(&url)
                    .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
                    .query(params)
            })
            .await
    }

    async fn write<B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<Value, ClientError> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "storefront write");
        self.http
            .send(path, || {
                self.client
                    .request(method.clone(), &url)
                    .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
                    .json(body)
            })
            .await
    }

    async fn get_list<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Vec<T>, ClientError> {
        let body = self.get(path, params).await?;
        expect_list(path, body)
    }
}

/// List endpoints must answer with a bare array.
fn expect_list<T: for<'de> Deserialize<'de>>(path: &str, body: Value) -> Result<Vec<T>, ClientError> {
    if !body.is_array() {
        return Err(ClientError::shape(path, "expected a JSON array"));
    }
    serde_json::from_value(body).map_err(|e| ClientError::shape(path, e.to_string()))
}

/// Entity endpoints must answer with an object.
fn expect_object<T: for<'de> Deserialize<'de>>(path: &str, body: Value) -> Result<T, ClientError> {
    if !body.is_object() {
        return Err(ClientError::shape(path, "expected a JSON object"));
    }
    serde_json::from_value(body).map_err(|e| ClientError::shape(path, e.to_string()))
}

#[async_trait]
impl StoreApi for WooClient {
    async fn customers(&self, query: &CustomerQuery) -> Result<Vec<Value>, ClientError> {
        self.get_list("customers", &query.params()).await
    }

    async fn orders(&self, query: &OrderQuery) -> Result<Vec<Value>, ClientError> {
        self.get_list("orders", &query.params()).await
    }

    async fn categories_by_slug(&self, slug: &str) -> Result<Vec<RemoteCategory>, ClientError> {
        let params = [("slug", slug.to_string()), ("per_page", "100".to_string())];
        self.get_list("products/categories", &params).await
    }

    async fn create_category(
        &self,
        payload: &CategoryPayload,
    ) -> Result<RemoteCategory, ClientError> {
        let path = "products/categories";
        let body = self.write(reqwest::Method::POST, path, payload).await?;
        expect_object(path, body)
    }

    async fn update_category(
        &self,
        id: i64,
        payload: &CategoryPayload,
    ) -> Result<RemoteCategory, ClientError> {
        let path = format!("products/categories/{}", id);
        let body = self.write(reqwest::Method::PUT, &path, payload).await?;
        expect_object(&path, body)
    }

    async fn products_by_sku(&self, sku: &str) -> Result<Vec<RemoteProduct>, ClientError> {
        let params = [("sku", sku.to_string()), ("per_page", "100".to_string())];
        self.get_list("products", &params).await
    }

    async fn product(&self, id: i64) -> Result<RemoteProduct, ClientError> {
        let path = format!("products/{}", id);
        let body = self.get(&path, &[]).await?;
        expect_object(&path, body)
    }

    async fn create_product(
        &self,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, ClientError> {
        let path = "products";
        let body = self.write(reqwest::Method::POST, path, payload).await?;
        expect_object(path, body)
    }

    async fn update_product(
        &self,
        id: i64,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, ClientError> {
        let path = format!("products/{}", id);
        let body = self.write(reqwest::Method::PUT, &path, payload).await?;
        expect_object(&path, body)
    }
}
