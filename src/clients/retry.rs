use serde_json::Value;
use std::time::Duration;

use super::ClientError;

/// Transport settings shared by both clients.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Total attempts per request, first one included.
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            attempts: 3,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl HttpSettings {
    pub(crate) fn build_client(&self) -> Result<reqwest::Client, ClientError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))
    }

    /// Sends the request built by `build`, retrying transient failures
    /// (connect errors, timeouts, 5xx) with a fixed delay. Returns the
    /// decoded JSON body of the first successful response.
    pub(crate) async fn send<F>(&self, context: &str, build: F) -> Result<Value, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match build().send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| ClientError::shape(context, format!("invalid JSON: {}", e)));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let error = ClientError::Status {
                        context: context.to_string(),
                        status: status.as_u16(),
                        body,
                    };
                    if !status.is_server_error() {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_timeout() || e.is_connect() => ClientError::Http {
                    context: context.to_string(),
                    source: e,
                },
                Err(e) => {
                    return Err(ClientError::Http {
                        context: context.to_string(),
                        source: e,
                    })
                }
            };

            if attempt >= attempts {
                tracing::error!(context, attempt, error = %error, "request failed, giving up");
                return Err(error);
            }
            tracing::warn!(context, attempt, error = %error, "request failed, retrying");
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}
