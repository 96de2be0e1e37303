//! JSON REST transport shared by the Compute, Bigtable Admin and
//! Kubernetes clients.
//!
//! Maps HTTP failures onto [`ApiError`] and retries idempotent requests on
//! transient failures.

use std::time::Duration;

use reqwest::{Client, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::HttpConfig;
use crate::error::{ApiError, Result, SkyforgeError};

/// Content type of JSON request bodies.
pub const JSON: &str = "application/json";

/// Content type of RFC 6902 JSON Patch bodies.
pub const JSON_PATCH: &str = "application/json-patch+json";

/// Authenticated JSON REST client.
#[derive(Debug, Clone)]
pub struct RestClient {
    /// HTTP client.
    client: Client,
    /// Bearer token sent with every request.
    token: Option<String>,
    /// Maximum retries of idempotent requests.
    max_retries: u32,
    /// Base delay between retries.
    retry_delay: Duration,
}

/// One outgoing request.
#[derive(Debug)]
struct RestRequest<'a> {
    method: Method,
    url: &'a str,
    body: Option<serde_json::Value>,
    content_type: &'static str,
    idempotent: bool,
}

impl RestClient {
    /// Creates a client with the given transport settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(http: &HttpConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(http.user_agent.clone())
            .danger_accept_invalid_certs(http.insecure)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            max_retries: http.max_retries,
            retry_delay: Duration::from_millis(http.retry_delay_ms),
        })
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.execute(RestRequest {
            method: Method::GET,
            url,
            body: None,
            content_type: JSON,
            idempotent: true,
        })
        .await
    }

    /// Sends a POST request with a JSON body.
    ///
    /// Only requests marked `idempotent` are retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn post<B, T>(&self, url: &str, body: &B, idempotent: bool) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(RestRequest {
            method: Method::POST,
            url,
            body: Some(to_json(body)?),
            content_type: JSON,
            idempotent,
        })
        .await
    }

    /// Sends a PATCH request with the given content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn patch<B, T>(&self, url: &str, body: &B, content_type: &'static str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(RestRequest {
            method: Method::PATCH,
            url,
            body: Some(to_json(body)?),
            content_type,
            idempotent: false,
        })
        .await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn delete<T: DeserializeOwned>(&self, url: &str, idempotent: bool) -> Result<T> {
        self.execute(RestRequest {
            method: Method::DELETE,
            url,
            body: None,
            content_type: JSON,
            idempotent,
        })
        .await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RestRequest<'_>) -> Result<T> {
        let mut attempt = 0_u32;
        let raw = loop {
            match self.execute_once(&request).await {
                Ok(raw) => break raw,
                Err(e) if request.idempotent && e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(
                        "Retry attempt {attempt} of {} for {} {}: {e}",
                        self.max_retries, request.method, request.url
                    );
                    tokio::time::sleep(self.backoff(&e, attempt)).await;
                }
                Err(e) => return Err(e),
            }
        };

        serde_json::from_value(raw).map_err(|e| {
            ApiError::invalid_response(format!(
                "Failed to parse response from {}: {e}",
                request.url
            ))
            .into()
        })
    }

    /// Linear backoff, stretched to the server's Retry-After on 429.
    fn backoff(&self, error: &SkyforgeError, attempt: u32) -> Duration {
        let delay = self.retry_delay * attempt;
        match error.retry_delay_secs() {
            Some(secs) if error.api_status() == Some(429) => delay.max(Duration::from_secs(secs)),
            _ => delay,
        }
    }

    async fn execute_once(&self, request: &RestRequest<'_>) -> Result<serde_json::Value> {
        trace!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), request.url)
            .header(header::ACCEPT, JSON);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(header::CONTENT_TYPE, request.content_type)
                .body(body.to_string());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(map_status(status.as_u16(), &body));
        }

        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            ApiError::invalid_response(format!("Response is not JSON: {e}")).into()
        })
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body)
        .map_err(|e| SkyforgeError::internal(format!("Failed to encode request body: {e}")))
}

/// Maps a non-success status and body onto an API error.
///
/// The message is taken from a Google error envelope (`error.message`) or
/// a Kubernetes `Status` (`message`) when present.
#[must_use]
pub fn map_status(status: u16, body: &str) -> SkyforgeError {
    let message = error_message(body);
    match status {
        404 => ApiError::not_found(message),
        401 | 403 => ApiError::AuthenticationFailed { message },
        _ => ApiError::api_error(status, message),
    }
    .into()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
