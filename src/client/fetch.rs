//! The HTTP capability injected into every source adapter.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// HTTP method used by a source request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single outbound request built by an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: Vec::new(),
            body: None,
        }
    }

    /// GET asking for a JSON response
    #[must_use]
    pub fn get_json(url: impl Into<String>) -> Self {
        Self::get(url).header("Accept", "application/json")
    }

    /// POST with a JSON body
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: &serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string()),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Raw upstream response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport level failures; HTTP error statuses are responses, not errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Capability to fetch a remote document
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// HTTP client configuration for source requests
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout duration
    pub timeout: Duration,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// User agent string
    pub user_agent: String,
    /// Proxy URL (optional)
    pub proxy: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
        }
    }
}

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// [`Fetcher`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration
    pub fn new(config: &HttpClientConfig) -> crate::Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .gzip(true)
            .user_agent(&config.user_agent);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                crate::Error::invalid_input("proxy", format!("Invalid proxy URL: {e}"))
            })?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        debug!("Fetching {:?} {}", request.method, request.url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        if status >= 400 {
            warn!("{} answered HTTP {}", request.url, status);
        }
        Ok(FetchResponse { status, body })
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_connect() {
        FetchError::Connect(error.to_string())
    } else {
        FetchError::Request(error.to_string())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{FetchError, FetchRequest, FetchResponse, Fetcher};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves canned responses keyed by a URL fragment, first match wins
    #[derive(Default)]
    pub(crate) struct StubFetcher {
        routes: Vec<(String, Result<FetchResponse, FetchError>)>,
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl StubFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn route(mut self, fragment: &str, body: &str) -> Self {
            self.routes
                .push((fragment.to_string(), Ok(FetchResponse::ok(body))));
            self
        }

        pub(crate) fn status(mut self, fragment: &str, status: u16, body: &str) -> Self {
            self.routes.push((
                fragment.to_string(),
                Ok(FetchResponse {
                    status,
                    body: body.to_string(),
                }),
            ));
            self
        }

        pub(crate) fn fail(mut self, fragment: &str, error: FetchError) -> Self {
            self.routes.push((fragment.to_string(), Err(error)));
            self
        }

        pub(crate) fn requests(&self) -> Vec<FetchRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.requests().into_iter().map(|r| r.url).collect()
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);
            self.routes
                .iter()
                .find(|(fragment, _)| url.contains(fragment.as_str()))
                .map_or_else(
                    || {
                        Ok(FetchResponse {
                            status: 404,
                            body: String::new(),
                        })
                    },
                    |(_, response)| response.clone(),
                )
        }
    }
}
