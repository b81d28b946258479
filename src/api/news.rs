//! General feed, article detail, and the source catalog.
use crate::api::client::{ApiClient, ApiError};
use crate::api::types::{Article, NewsPage, NewsSource};
use reqwest::Method;

/// Fetch one page of the general feed.
///
/// The general feed is readable without a session; ordering is whatever
/// `sort` asks the backend for (the client never re-sorts).
pub async fn fetch_page(
    client: &ApiClient,
    page: u32,
    page_size: u32,
    sort: &str,
) -> Result<NewsPage, ApiError> {
    let sort_encoded: String = url::form_urlencoded::byte_serialize(sort.as_bytes()).collect();
    let path = format!(
        "/news?page={}&page_size={}&sort={}",
        page, page_size, sort_encoded
    );
    client.send_public(Method::GET, &path, None).await
}

/// Fetch a single article by id.
pub async fn fetch_detail(client: &ApiClient, news_id: &str) -> Result<Article, ApiError> {
    let id_encoded: String = url::form_urlencoded::byte_serialize(news_id.as_bytes()).collect();
    let path = format!("/news/details/{}", id_encoded);
    client.send_public(Method::GET, &path, None).await
}

/// Fetch the catalog of all known sources. Requires a session.
pub async fn fetch_sources(client: &ApiClient) -> Result<Vec<NewsSource>, ApiError> {
    client
        .send_authed(Method::GET, "/news/news_sources", None)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenStore;
    use crate::config::Config;
    use secrecy::SecretString;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> ApiClient {
        let config = Config {
            api_base_url: base_url.to_string(),
            ..Config::default()
        };
        ApiClient::new(&config, Arc::new(TokenStore::in_memory())).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_passes_cursor_params() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .and(query_param("page", "3"))
            .and(query_param("page_size", "10"))
            .and(query_param("sort", "-published_at"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"newsList": [{"_id": "n1", "source": "s1", "title": "T"}], "totalItems": 21}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let page = fetch_page(&client, 3, 10, "-published_at").await.unwrap();
        assert_eq!(page.news_list.len(), 1);
        assert_eq!(page.total_items, 21);
    }

    #[tokio::test]
    async fn test_fetch_detail_missing_article_maps_404() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/details/gone"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string(r#"{"detail": "News not found"}"#),
            )
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let result = fetch_detail(&client, "gone").await;
        match result.unwrap_err() {
            ApiError::RequestFailed { status, detail } => {
                assert_eq!(status, 404);
                assert_eq!(detail, "News not found");
            }
            e => panic!("Expected RequestFailed, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_sources_requires_session() {
        let client = test_client("http://127.0.0.1:9");
        let result = fetch_sources(&client).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_fetch_sources_decodes_catalog() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/news_sources"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"_id": "1", "source": "daily-wire", "description": "A daily wire"},
                    {"_id": "2", "source": "herald", "description": null}
                ]"#,
            ))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        client
            .store()
            .set_session(
                SecretString::from("tok"),
                SecretString::from("ref"),
                None,
            )
            .unwrap();

        let sources = fetch_sources(&client).await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source, "daily-wire");
        assert!(sources[1].description.is_none());
    }
}
