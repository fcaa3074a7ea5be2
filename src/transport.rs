//! HTTP transport for the Ceph dashboard REST API
//!
//! The rest of the crate talks to the server only through the [`Transport`]
//! trait: one request in, status code and raw body out. [`HttpTransport`] is
//! the reqwest-backed implementation; it adds the versioned `Accept` header,
//! the session bearer token and, for requests flagged with `retry`, the
//! fixed-interval retry loop driven by [`RetryPolicy`]. Every exchange is
//! classified by the policy; only flagged requests spend the retry budget.

use crate::config::{RetryConfig, ServerConfig};
use crate::engine::retry_policy::{RetryDecision, RetryPolicy};
use crate::error::handlers::NetworkErrorHandler;
use crate::error::{CephError, Result};
use crate::logging::Logger;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Media type selecting version 1.0 of the dashboard API
pub const CEPH_API_V1: &str = "application/vnd.ceph.api.v1.0+json";

/// Bearer token shared between the session and the transport
pub type TokenSlot = Arc<RwLock<Option<String>>>;

/// Request against an API sub path, e.g. `block/image`
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Apply the transport retry budget
    pub retry: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retry: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_retry(mut self) -> Self {
        self.retry = true;
        self
    }
}

/// Status code and raw body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            CephError::Parse(format!(
                "Failed to decode response (status {}): {}",
                self.status, e
            ))
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// Dashboard API transport operations
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request; non-2xx statuses are returned, not raised
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    server: ServerConfig,
    policy: RetryPolicy,
    token: TokenSlot,
    logger: Logger,
}

impl HttpTransport {
    pub fn new(server: ServerConfig, retry: RetryConfig, logger: Logger) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(server.timeout))
            .danger_accept_invalid_certs(server.skip_tls)
            .build()
            .map_err(|e| CephError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server,
            policy: RetryPolicy::new(retry, logger.clone()),
            token: Arc::new(RwLock::new(None)),
            logger,
        })
    }

    /// Slot the session writes its bearer token into
    pub fn token_slot(&self) -> TokenSlot {
        Arc::clone(&self.token)
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    fn current_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    async fn send_once(
        &self,
        url: &str,
        request: &ApiRequest,
    ) -> std::result::Result<ApiResponse, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(ACCEPT, CEPH_API_V1);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = self.current_token() {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.server.url(&request.path);
        let max_retries = if request.retry { self.policy.max_retries() } else { 0 };
        let mut retries = 0u32;

        self.logger.trace(&format!("{} {}", request.method, url));

        loop {
            match self.send_once(&url, request).await {
                Ok(response) => {
                    let decision = self.policy.decide(response.status, &url);
                    if decision == RetryDecision::RetryNow && retries < max_retries {
                        retries += 1;
                        self.logger.warning(&format!(
                            "{} {} returned {}, retry {}/{} in {}s",
                            request.method,
                            url,
                            response.status,
                            retries,
                            max_retries,
                            self.policy.wait().as_secs()
                        ));
                        tokio::time::sleep(self.policy.wait()).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if retries < max_retries && NetworkErrorHandler::is_transient(&e) => {
                    retries += 1;
                    self.logger.warning(&format!(
                        "{} {} failed: {}, retry {}/{}",
                        request.method, url, e, retries, max_retries
                    ));
                    tokio::time::sleep(self.policy.wait()).await;
                }
                Err(e) => {
                    let context = format!("{} {}", request.method, request.path);
                    return Err(NetworkErrorHandler::handle_network_error(&e, &context));
                }
            }
        }
    }
}

/// Escape one path segment the way the dashboard expects (`/` becomes `%2F`)
pub fn escape_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}
