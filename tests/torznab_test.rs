mod common;

use common::{feed, indexer, CAPS};
use torrent_aggregator::client::torznab::{diagnose, filter_categories, parse_capabilities};
use torrent_aggregator::client::{
    Category, ConnectionStatus, HttpClientConfig, HttpFetcher, SourceProvider, TorznabProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(&HttpClientConfig::default()).unwrap()
}

#[test]
fn test_discovery_intersection() {
    let caps = parse_capabilities(
        r#"<caps><categories><category id="5000"><subcat id="5070"/></category></categories></caps>"#,
    )
    .unwrap();
    assert_eq!(caps.categories().collect::<Vec<_>>(), vec!["5000", "5070"]);
    assert_eq!(filter_categories(Category::Anime, Some(&caps)), vec!["5070"]);
}

#[tokio::test]
async fn test_search_against_indexer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("t", "caps"))
        .and(query_param("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CAPS))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("t", "search"))
        .and(query_param("q", "one piece"))
        .and(query_param("cat", "5070"))
        .and(query_param("extended", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed("one piece", 2)))
        .expect(2)
        .mount(&server)
        .await;

    let provider = TorznabProvider::new(indexer(
        "local",
        format!("{}/api", server.uri()),
        Category::All,
    ));
    let fetcher = fetcher();

    let records = provider
        .search("one piece", Category::Anime, &fetcher)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source_id, "local");
    assert_eq!(records[0].category, Some(Category::Anime));
    assert_eq!(records[0].size, "1.00 GB");
    assert_eq!(records[0].date, "2024-01-05");

    // capabilities are cached, so the second search only hits t=search
    provider
        .search("one piece", Category::Anime, &fetcher)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_indexer_error_document_is_empty_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<error code="100" description="Invalid API Key"/>"#),
        )
        .mount(&server)
        .await;

    let provider = TorznabProvider::new(indexer(
        "local",
        format!("{}/api", server.uri()),
        Category::All,
    ));
    let records = provider.search("x", Category::Movies, &fetcher()).await.unwrap();
    assert!(records.is_empty());
}

async fn diagnose_with(response: ResponseTemplate) -> ConnectionStatus {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("t", "caps"))
        .respond_with(response)
        .mount(&server)
        .await;
    let config = indexer("probe", format!("{}/api", server.uri()), Category::All);
    diagnose(&config, &fetcher()).await
}

#[tokio::test]
async fn test_diagnosis_classification() {
    assert_eq!(
        diagnose_with(ResponseTemplate::new(200).set_body_string(CAPS)).await,
        ConnectionStatus::ConnectionEstablished
    );
    assert_eq!(
        diagnose_with(ResponseTemplate::new(401)).await,
        ConnectionStatus::InvalidApiKey
    );
    assert_eq!(
        diagnose_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<error code="101" description="Account suspended"/>"#)
        )
        .await,
        ConnectionStatus::InvalidApiKey
    );
    assert_eq!(
        diagnose_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<error code="203" description="Function not available"/>"#)
        )
        .await,
        ConnectionStatus::ApplicationError(203)
    );
    assert_eq!(
        diagnose_with(ResponseTemplate::new(200).set_body_string("<html>Login</html>")).await,
        ConnectionStatus::UnexpectedResponse(None)
    );
}

#[tokio::test]
async fn test_diagnosis_unreachable_host() {
    // nothing listens on the discard port
    let config = indexer("probe", "http://127.0.0.1:9/api".to_string(), Category::All);
    let status = diagnose(&config, &fetcher()).await;
    assert!(matches!(status, ConnectionStatus::ConnectionFailed(_)));
}
