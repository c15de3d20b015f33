//! A session-oriented HTTP client: retry/backoff, pluggable authentication,
//! and two response modes (JSON or raw bytes), per spec.md §4.3.
//!
//! One [`Client`] is built per worker task and never shared mutably across
//! tasks — each wraps its own `reqwest::Client`, which is itself
//! connection-pooled internally, so this costs a little memory and nothing
//! in connection reuse.

pub mod auth;
pub mod retry;

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use thiserror::Error;
use tracing::{debug, warn};

pub use auth::Auth;
pub use retry::ExponentialBackoff;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("digest auth challenge from {url} could not be answered: {source}")]
    Auth {
        url: String,
        #[source]
        source: digest_auth::Error,
    },
    #[error("failed decoding response body from {url} as json: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Either a decoded JSON document or the raw response body, matching
/// spec.md §4.3's `(ok, body)` shape once `ok` is folded into `Result`.
#[derive(Debug)]
pub enum ClientResponse {
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl ClientResponse {
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            ClientResponse::Json(v) => Some(v),
            ClientResponse::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            ClientResponse::Bytes(b) => Some(b),
            ClientResponse::Json(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Json,
    Bytes,
}

pub struct Client {
    inner: reqwest::Client,
    auth: Auth,
    max_retries: u32,
    backoff_factor: f32,
}

impl Client {
    pub fn new(auth: Auth, timeout: Duration, max_retries: u32, backoff_factor: f32) -> Self {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builder never fails for this configuration");
        Client {
            inner,
            auth,
            max_retries,
            backoff_factor,
        }
    }

    /// Issues a GET request against `url` with `query`, following the
    /// retry/backoff policy and (if configured) answering a digest
    /// challenge. `accept` selects JSON decoding or raw bytes.
    pub async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        accept: Accept,
    ) -> Result<ClientResponse> {
        let mut backoff = ExponentialBackoff::new(self.max_retries, self.backoff_factor);
        let mut digest_header: Option<String> = None;

        loop {
            let mut request = self.inner.get(url).query(query);
            if let Some(header) = &digest_header {
                request = request.header(AUTHORIZATION, header.clone());
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(source) => {
                    if let Some(delay) = backoff.next_backoff() {
                        warn!(url, error = %source, "transport error, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(ClientError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            };

            let status = response.status();

            if status.as_u16() == 401 && digest_header.is_none() {
                if let Auth::Digest { username, password } = &self.auth {
                    if let Some(challenge) = response
                        .headers()
                        .get(WWW_AUTHENTICATE)
                        .and_then(|v| v.to_str().ok())
                    {
                        let answer = auth::digest_answer(username, password, url, challenge)
                            .map_err(|source| ClientError::Auth {
                                url: url.to_string(),
                                source,
                            })?;
                        digest_header = Some(answer);
                        continue;
                    }
                }
                return Err(ClientError::Status {
                    url: url.to_string(),
                    status: 401,
                });
            }

            if retry::is_retryable_status(status.as_u16()) {
                if let Some(delay) = backoff.next_backoff() {
                    debug!(url, %status, "retryable status, backing off");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(ClientError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            if !status.is_success() {
                return Err(ClientError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            return match accept {
                Accept::Json => {
                    let body =
                        response
                            .json::<serde_json::Value>()
                            .await
                            .map_err(|source| ClientError::Decode {
                                url: url.to_string(),
                                source,
                            })?;
                    Ok(ClientResponse::Json(body))
                }
                Accept::Bytes => {
                    let body = response
                        .bytes()
                        .await
                        .map_err(|source| ClientError::Transport {
                            url: url.to_string(),
                            source,
                        })?;
                    Ok(ClientResponse::Bytes(body.to_vec()))
                }
            };
        }
    }

    /// Issues a POST with the given headers and raw body, used by the sink.
    /// Retries the same way as `get`, with no authentication challenge
    /// (the sink authenticates via a token embedded in its endpoint URL).
    pub async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<()> {
        let mut backoff = ExponentialBackoff::new(self.max_retries, self.backoff_factor);
        let mut header_map = HeaderMap::new();
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                header_map.insert(name, value);
            }
        }

        loop {
            let response = self
                .inner
                .post(url)
                .headers(header_map.clone())
                .body(body.clone())
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(source) => {
                    if let Some(delay) = backoff.next_backoff() {
                        warn!(url, error = %source, "transport error posting to sink, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(ClientError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            };

            let status = response.status();
            if retry::is_retryable_status(status.as_u16()) {
                if let Some(delay) = backoff.next_backoff() {
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(ClientError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            return if status.is_success() {
                Ok(())
            } else {
                Err(ClientError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                })
            };
        }
    }
}
