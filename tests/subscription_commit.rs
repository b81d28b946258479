//! Integration tests for the subscription commit flow: buffered toggles
//! pushed as a batch, partial failure kept pending, successes folded into
//! canonical state.

use std::sync::Arc;

use kiosk::api::types::SubscriptionAction;
use kiosk::api::ApiClient;
use kiosk::subscriptions::SubscriptionReconciler;
use kiosk::{Config, TokenStore};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn logged_in_client(base_url: &str) -> ApiClient {
    let config = Config {
        api_base_url: base_url.to_string(),
        ..Config::default()
    };
    let client = ApiClient::new(&config, Arc::new(TokenStore::in_memory())).unwrap();
    client
        .store()
        .set_session(SecretString::from("tok"), SecretString::from("ref"), None)
        .unwrap();
    client
}

// ============================================================================
// Seeding
// ============================================================================

#[tokio::test]
async fn load_seeds_canonical_state_from_backend() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"["herald", "gazette"]"#))
        .mount(&mock_server)
        .await;

    let client = logged_in_client(&mock_server.uri());
    let reconciler = SubscriptionReconciler::load(&client).await.unwrap();

    assert!(reconciler.is_subscribed("herald"));
    assert!(reconciler.is_subscribed("gazette"));
    assert!(!reconciler.is_subscribed("tribune"));
    assert!(!reconciler.has_pending());
}

// ============================================================================
// Commit
// ============================================================================

#[tokio::test]
async fn commit_pushes_each_pending_entry_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/subscriptions/tribune"))
        .and(query_param("action", "subscribe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"is_subscribe": true}"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/subscriptions/herald"))
        .and(query_param("action", "unsubscribe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"is_subscribe": false}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = logged_in_client(&mock_server.uri());
    let mut reconciler = SubscriptionReconciler::new(vec!["herald".to_string()]);
    reconciler.toggle("tribune");
    reconciler.toggle("herald");

    let report = reconciler.commit(&client).await;
    assert_eq!(report.succeeded, 2);
    assert!(report.all_succeeded());

    assert!(reconciler.is_subscribed("tribune"));
    assert!(!reconciler.is_subscribed("herald"));
    assert!(!reconciler.has_pending());
}

#[tokio::test]
async fn partial_failure_keeps_only_failed_entry_pending() {
    let mock_server = MockServer::start().await;

    // A: subscribe succeeds
    Mock::given(method("PATCH"))
        .and(path("/subscriptions/alpha"))
        .and(query_param("action", "subscribe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"is_subscribe": true}"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    // B: unsubscribe fails server-side
    Mock::given(method("PATCH"))
        .and(path("/subscriptions/beta"))
        .and(query_param("action", "unsubscribe"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string(r#"{"detail": "Failed to update subscription"}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = logged_in_client(&mock_server.uri());
    let mut reconciler = SubscriptionReconciler::new(vec!["beta".to_string()]);
    reconciler.toggle("alpha"); // pending: subscribe
    reconciler.toggle("beta"); // pending: unsubscribe

    let report = reconciler.commit(&client).await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source_id, "beta");
    assert!(report.failures[0].message.contains("500"));

    // Success applied, failure untouched and still pending
    assert!(reconciler.is_subscribed("alpha"));
    assert!(reconciler.is_subscribed("beta"));
    assert_eq!(
        reconciler.pending_action("beta"),
        Some(SubscriptionAction::Unsubscribe)
    );
    assert_eq!(reconciler.pending_count(), 1);
}

#[tokio::test]
async fn recommit_retries_only_failed_entries() {
    let mock_server = MockServer::start().await;

    // alpha must be pushed exactly once across both commits
    Mock::given(method("PATCH"))
        .and(path("/subscriptions/alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"is_subscribe": true}"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    // beta fails on the first push, succeeds on the retry
    Mock::given(method("PATCH"))
        .and(path("/subscriptions/beta"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string(r#"{"detail": "Try later"}"#),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/subscriptions/beta"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"is_subscribe": false}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = logged_in_client(&mock_server.uri());
    let mut reconciler = SubscriptionReconciler::new(vec!["beta".to_string()]);
    reconciler.toggle("alpha");
    reconciler.toggle("beta");

    let first = reconciler.commit(&client).await;
    assert_eq!(first.succeeded, 1);
    assert_eq!(first.failures.len(), 1);

    let second = reconciler.commit(&client).await;
    assert_eq!(second.succeeded, 1);
    assert!(second.all_succeeded());

    assert!(reconciler.is_subscribed("alpha"));
    assert!(!reconciler.is_subscribed("beta"));
    assert!(!reconciler.has_pending());
}

#[tokio::test]
async fn commit_with_empty_buffer_issues_no_requests() {
    let mock_server = MockServer::start().await;

    let client = logged_in_client(&mock_server.uri());
    let mut reconciler = SubscriptionReconciler::new(vec!["herald".to_string()]);

    let report = reconciler.commit(&client).await;
    assert!(report.is_empty());

    // A toggle cancelled before commit also produces no traffic
    reconciler.toggle("herald");
    reconciler.toggle("herald");
    let report = reconciler.commit(&client).await;
    assert!(report.is_empty());

    assert_eq!(mock_server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn failure_report_is_ordered_by_source_id() {
    let mock_server = MockServer::start().await;
    for source in ["cc", "aa", "bb"] {
        Mock::given(method("PATCH"))
            .and(path(format!("/subscriptions/{}", source)))
            .respond_with(
                ResponseTemplate::new(500).set_body_string(r#"{"detail": "nope"}"#),
            )
            .mount(&mock_server)
            .await;
    }

    let client = logged_in_client(&mock_server.uri());
    let mut reconciler = SubscriptionReconciler::new(vec![]);
    reconciler.toggle("cc");
    reconciler.toggle("aa");
    reconciler.toggle("bb");

    let report = reconciler.commit(&client).await;
    let failed: Vec<&str> = report
        .failures
        .iter()
        .map(|f| f.source_id.as_str())
        .collect();
    assert_eq!(failed, ["aa", "bb", "cc"]);
    assert_eq!(reconciler.pending_count(), 3);
}
