//! Subscription endpoints: the caller's subscribed ids, the subscribed
//! feed, and the per-source toggle.
use crate::api::client::{ApiClient, ApiError};
use crate::api::types::{NewsPage, SubscriptionAction};
use reqwest::Method;

/// Fetch the ids of the sources the caller is subscribed to.
pub async fn fetch_subscribed_ids(client: &ApiClient) -> Result<Vec<String>, ApiError> {
    client.send_authed(Method::GET, "/subscriptions", None).await
}

/// Fetch one page of the subscribed-sources feed. Same envelope as the
/// general feed, so one pager serves both.
pub async fn fetch_subscribed_page(
    client: &ApiClient,
    page: u32,
    page_size: u32,
) -> Result<NewsPage, ApiError> {
    let path = format!("/subscriptions/news?page={}&page_size={}", page, page_size);
    client.send_authed(Method::GET, &path, None).await
}

/// Flip one source's subscription on the backend.
///
/// The backend treats the toggle as idempotent per `(source, action)` pair:
/// repeating the same action yields a 400 with a descriptive detail rather
/// than corrupting state, so a replay after token refresh is safe.
pub async fn toggle(
    client: &ApiClient,
    source_id: &str,
    action: SubscriptionAction,
) -> Result<serde_json::Value, ApiError> {
    let id_encoded: String = url::form_urlencoded::byte_serialize(source_id.as_bytes()).collect();
    let path = format!("/subscriptions/{}?action={}", id_encoded, action.as_str());
    client.send_authed(Method::PATCH, &path, None).await
}
