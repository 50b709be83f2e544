//! ERP (TEN) REST client.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::{json, Value};

use super::envelope::ListEnvelope;
use super::retry::HttpSettings;
use super::{ClientError, ErpApi};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Validated ERP endpoint settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TenSettings {
    pub base_url: String,
    /// Company whose web categories are read. Required for category import.
    pub company_id: Option<i64>,
    pub http: HttpSettings,
}

/// Product feed window.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub modified_after: NaiveDateTime,
    pub items: u32,
    pub page: u32,
}

pub struct TenClient {
    base_url: String,
    company_id: Option<i64>,
    http: HttpSettings,
    client: reqwest::Client,
}

impl TenClient {
    pub fn new(settings: &TenSettings) -> Result<Self, ClientError> {
        if settings.base_url.trim().is_empty() {
            return Err(ClientError::Config("ten.base_url is not set".to_string()));
        }
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            company_id: settings.company_id,
            client: settings.http.build_client()?,
            http: settings.http.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let url = self.url(path);
        tracing::debug!(%url, "ERP request");
        self.http
            .send(path, || self.client.post(&url).json(body))
            .await
    }

    async fn post_list(&self, path: &str, body: &Value) -> Result<Vec<Value>, ClientError> {
        let response = self.post(path, body).await?;
        Ok(ListEnvelope::parse(path, response)?.into_rows())
    }

    fn category_query(&self, limit: usize) -> Result<String, ClientError> {
        let company_id = self
            .company_id
            .filter(|id| *id > 0)
            .ok_or_else(|| ClientError::Config("ten.company_id must be > 0".to_string()))?;
        Ok(format!(
            "SELECT TOP {} * FROM tblCategoriasWeb WHERE IdEmpresa = {}",
            limit.max(1),
            company_id
        ))
    }
}

#[async_trait]
impl ErpApi for TenClient {
    async fn categories(&self, limit: usize) -> Result<Vec<Value>, ClientError> {
        let query = self.category_query(limit)?;
        self.post_list("/Query/Get", &json!({ "query": query })).await
    }

    async fn products(&self, query: &ProductQuery) -> Result<Vec<Value>, ClientError> {
        let body = json!({
            "ModifiedAfter": query.modified_after.format(DATE_FORMAT).to_string(),
            "Paginate": { "items": query.items, "page": query.page },
        });
        self.post_list("/Products/Get", &body).await
    }

    async fn stocks(&self) -> Result<Vec<Value>, ClientError> {
        self.post_list("/Stocks/Get", &json!({})).await
    }

    async fn customers(&self, modified_after: NaiveDateTime) -> Result<Vec<Value>, ClientError> {
        let body = json!({ "ModifiedAfter": modified_after.format(DATE_FORMAT).to_string() });
        self.post_list("/Customers/Get", &body).await
    }

    async fn create_customer(&self, payload: &Value) -> Result<Value, ClientError> {
        let response = self
            .post("/Customers/Set", &json!({ "Customers": [payload] }))
            .await?;
        let mut results = ListEnvelope::parse("/Customers/Set", response)?.into_rows();
        if results.is_empty() {
            return Err(ClientError::shape("/Customers/Set", "empty result list"));
        }
        Ok(results.swap_remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str, company_id: Option<i64>) -> TenSettings {
        TenSettings {
            base_url: base_url.to_string(),
            company_id,
            http: HttpSettings {
                timeout: Duration::from_secs(5),
                connect_timeout: Duration::from_secs(1),
                attempts: 3,
                retry_delay: Duration::from_millis(1),
            },
        }
    }

    #[test]
    fn test_missing_base_url_is_config_error() {
        let err = TenClient::new(&settings("  ", Some(1))).err().unwrap();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_category_query() {
        let client = TenClient::new(&settings("http://erp:2223/", Some(4))).unwrap();
        assert_eq!(client.url("/Query/Get"), "http://erp:2223/Query/Get");
        assert_eq!(
            client.category_query(500).unwrap(),
            "SELECT TOP 500 * FROM tblCategoriasWeb WHERE IdEmpresa = 4"
        );

        let client = TenClient::new(&settings("http://erp:2223", Some(0))).unwrap();
        assert!(matches!(
            client.category_query(10),
            Err(ClientError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_products_request_and_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Products/Get"))
            .and(body_json(json!({
                "ModifiedAfter": "2024-03-01 08:30:00",
                "Paginate": {"items": 50, "page": 2}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"Products": [{"Id": 1}, {"Id": 2}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = TenClient::new(&settings(&server.uri(), Some(1))).unwrap();
        let query = ProductQuery {
            modified_after: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            items: 50,
            page: 2,
        };
        let rows = client.products(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Stocks/Get"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Stocks/Get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"Stocks": [{"IdProducto": 1, "Stock": "3"}]})),
            )
            .mount(&server)
            .await;

        let client = TenClient::new(&settings(&server.uri(), None)).unwrap();
        let rows = client.stocks().await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Stocks/Get"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = TenClient::new(&settings(&server.uri(), None)).unwrap();
        let err = client.stocks().await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Stocks/Get"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let client = TenClient::new(&settings(&server.uri(), None)).unwrap();
        let err = client.stocks().await.unwrap_err();
        assert!(err.to_string().contains("bad request"));
    }

    #[tokio::test]
    async fn test_create_customer_returns_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Customers/Set"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Codigo": "77", "IdTen": "93141", "Exceptions": []}
            ])))
            .mount(&server)
            .await;

        let client = TenClient::new(&settings(&server.uri(), None)).unwrap();
        let result = client
            .create_customer(&json!({"Codigo": "77"}))
            .await
            .unwrap();
        assert_eq!(result["IdTen"], "93141");
    }
}
