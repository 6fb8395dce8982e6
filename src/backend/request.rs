use crate::error::{LagError, Result};
use reqwest::header::{self, HeaderMap};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// A response that was received and not rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpOutcome {
    pub status_code: u16,
    pub elapsed_ms: u64,
    /// Parsed body, or an empty object when the body is not JSON.
    pub json: Value,
}

#[derive(Error, Debug)]
pub enum RequestError {
    /// No response was obtained; the status must not be interpreted.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with {status}: {content}")]
    Rejected {
        url: String,
        status: u16,
        content: String,
    },
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => None,
            Self::Rejected { status, .. } => Some(*status),
        }
    }

    /// Whether trying again later could succeed. The executor never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Rejected { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
        }
    }
}

/// Single chokepoint for outbound backend calls.
pub struct RequestExecutor {
    client: reqwest::Client,
}

impl RequestExecutor {
    pub fn new(headers: &HashMap<String, String>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::try_from(headers)
            .map_err(|e| LagError::Config(format!("invalid backend header: {e}")))?;
        default_headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .user_agent(concat!("consumerlag-exporter/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| LagError::Config(format!("unable to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub async fn get(
        &self,
        category: &str,
        url: Url,
    ) -> std::result::Result<HttpOutcome, RequestError> {
        self.execute::<()>(category, Method::GET, url, None).await
    }

    pub async fn delete(
        &self,
        category: &str,
        url: Url,
    ) -> std::result::Result<HttpOutcome, RequestError> {
        self.execute::<()>(category, Method::DELETE, url, None).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        category: &str,
        url: Url,
        body: &B,
    ) -> std::result::Result<HttpOutcome, RequestError> {
        self.execute(category, Method::PUT, url, Some(body)).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        category: &str,
        url: Url,
        body: &B,
    ) -> std::result::Result<HttpOutcome, RequestError> {
        self.execute(category, Method::POST, url, Some(body)).await
    }

    /// Execute one call and classify the response.
    ///
    /// Status >= 400 is a rejection carrying the raw content. 2xx and 3xx are returned as
    /// outcomes with the body parsed as JSON where possible.
    pub async fn execute<B: Serialize + ?Sized>(
        &self,
        category: &str,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> std::result::Result<HttpOutcome, RequestError> {
        let start = Instant::now();

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                error!(
                    category = category,
                    method = %method,
                    url = %url,
                    error = %e,
                    "RequestsError"
                );
                return Err(RequestError::Transport {
                    url: url.to_string(),
                    source: e,
                });
            }
        };

        let status = response.status();
        // A body cut off mid-transfer is as good as no response.
        let content = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(
                    category = category,
                    method = %method,
                    url = %url,
                    status = status.as_u16(),
                    error = %e,
                    "RequestsError"
                );
                return Err(RequestError::Transport {
                    url: url.to_string(),
                    source: e,
                });
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            category = category,
            method = %method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = elapsed_ms,
            "HTTPResponse"
        );

        if status.as_u16() >= 400 {
            let content = String::from_utf8_lossy(&content).into_owned();
            error!(
                category = category,
                url = %url,
                status = status.as_u16(),
                content = %content,
                "RequestsResults"
            );
            return Err(RequestError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                content,
            });
        }

        if status.is_redirection() {
            warn!(
                category = category,
                url = %url,
                status = status.as_u16(),
                "Redirect response was not followed, treating as success"
            );
        }

        let json = serde_json::from_slice(&content).unwrap_or_else(|e| {
            debug!(category = category, url = %url, error = %e, "Response body is not JSON");
            Value::Object(serde_json::Map::new())
        });

        Ok(HttpOutcome {
            status_code: status.as_u16(),
            elapsed_ms,
            json,
        })
    }
}
