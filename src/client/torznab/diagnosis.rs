//! Connection checks for indexer configuration screens.

use super::{caps_url, xml_request, IndexerConfig};
use crate::client::fetch::Fetcher;
use roxmltree::Document;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Outcome of probing an indexer with a capabilities request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ConnectionStatus {
    ConnectionEstablished,
    /// DNS, connect or transport failure
    ConnectionFailed(String),
    InvalidApiKey,
    /// Indexer reported an error code in 200-299
    ApplicationError(u32),
    /// Any other error code, or a body that is not a caps document
    UnexpectedResponse(Option<u32>),
}

impl ConnectionStatus {
    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(self, Self::ConnectionEstablished)
    }

    #[must_use]
    pub const fn from_error_code(code: u32) -> Self {
        match code {
            100..=199 => Self::InvalidApiKey,
            200..=299 => Self::ApplicationError(code),
            _ => Self::UnexpectedResponse(Some(code)),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionEstablished => write!(f, "connection established"),
            Self::ConnectionFailed(reason) => write!(f, "connection failed: {reason}"),
            Self::InvalidApiKey => write!(f, "invalid API key"),
            Self::ApplicationError(code) => write!(f, "indexer error {code}"),
            Self::UnexpectedResponse(Some(code)) => write!(f, "unexpected response (code {code})"),
            Self::UnexpectedResponse(None) => write!(f, "unexpected response"),
        }
    }
}

/// Probe `config` with a capabilities request and classify the answer
pub async fn diagnose(config: &IndexerConfig, fetcher: &dyn Fetcher) -> ConnectionStatus {
    let url = match caps_url(config) {
        Ok(url) => url,
        Err(e) => return ConnectionStatus::ConnectionFailed(e.to_string()),
    };
    debug!("Diagnosing indexer {} at {}", config.id, config.url);

    let response = match fetcher.fetch(xml_request(url)).await {
        Ok(response) => response,
        Err(e) => return ConnectionStatus::ConnectionFailed(e.to_string()),
    };

    let status = if response.status == 401 {
        ConnectionStatus::InvalidApiKey
    } else {
        classify_body(&response.body)
    };
    info!("Indexer {} diagnosis: {}", config.id, status);
    status
}

/// Classify a caps response body
#[must_use]
pub fn classify_body(body: &str) -> ConnectionStatus {
    let start = skip_prolog(body);
    if start.starts_with("<caps") {
        return ConnectionStatus::ConnectionEstablished;
    }
    error_code(body).map_or(
        ConnectionStatus::UnexpectedResponse(None),
        ConnectionStatus::from_error_code,
    )
}

/// Body with a BOM, leading whitespace and an XML declaration removed
fn skip_prolog(body: &str) -> &str {
    let body = body.trim_start_matches('\u{feff}').trim_start();
    match body.strip_prefix("<?xml") {
        Some(rest) => rest
            .split_once("?>")
            .map_or(rest, |(_, after)| after)
            .trim_start(),
        None => body,
    }
}

fn error_code(body: &str) -> Option<u32> {
    let document = Document::parse(body.trim_start_matches('\u{feff}').trim_start()).ok()?;
    let root = document.root_element();
    if !root.has_tag_name("error") {
        return None;
    }
    root.attribute("code")?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fetch::test_support::StubFetcher;
    use crate::client::fetch::FetchError;
    use crate::client::record::Category;

    fn config() -> IndexerConfig {
        IndexerConfig {
            id: "local".to_string(),
            name: "Local".to_string(),
            url: "http://localhost:9117/api".to_string(),
            api_key: "secret".to_string(),
            category: Category::All,
        }
    }

    #[test]
    fn test_classify_bodies() {
        assert_eq!(
            classify_body("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<caps><server/></caps>"),
            ConnectionStatus::ConnectionEstablished
        );
        assert_eq!(classify_body("\u{feff}  <caps/>"), ConnectionStatus::ConnectionEstablished);
        assert_eq!(
            classify_body(r#"<error code="100" description="Incorrect user credentials"/>"#),
            ConnectionStatus::InvalidApiKey
        );
        assert_eq!(
            classify_body(r#"<?xml version="1.0"?><error code="201" description="Incorrect parameter"/>"#),
            ConnectionStatus::ApplicationError(201)
        );
        assert_eq!(
            classify_body(r#"<error code="900" description="Unknown error"/>"#),
            ConnectionStatus::UnexpectedResponse(Some(900))
        );
        assert_eq!(
            classify_body("<html>login</html>"),
            ConnectionStatus::UnexpectedResponse(None)
        );
    }

    #[tokio::test]
    async fn test_http_401_is_invalid_key() {
        let fetcher = StubFetcher::new().status("t=caps", 401, "Unauthorized");
        assert_eq!(diagnose(&config(), &fetcher).await, ConnectionStatus::InvalidApiKey);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let fetcher =
            StubFetcher::new().fail("localhost", FetchError::Connect("dns error".to_string()));
        assert!(matches!(
            diagnose(&config(), &fetcher).await,
            ConnectionStatus::ConnectionFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_request_shape() {
        let fetcher = StubFetcher::new().route("t=caps", "<caps/>");
        assert!(diagnose(&config(), &fetcher).await.is_established());
        assert_eq!(
            fetcher.urls(),
            vec!["http://localhost:9117/api?apikey=secret&t=caps".to_string()]
        );
    }
}
