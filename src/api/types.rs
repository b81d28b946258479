//! Serde mappings for the backend's JSON payloads.
//!
//! Field names mirror the service's wire format (`_id`, `newsList`,
//! `totalItems`, `access_token`), renamed to Rust conventions on this side.
//! Unknown fields are tolerated everywhere: the backend adds fields freely
//! and old clients are expected to keep working.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One news article as served by `/news` and `/news/details/{id}`.
///
/// Nearly every field is optional — upstream aggregators deliver spotty
/// metadata and the backend passes it through as-is. Only `source` is
/// guaranteed.
#[derive(Debug, Clone, Deserialize)]
pub struct Article {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    /// Stable identifier of the publishing source.
    pub source: String,
    pub image: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    /// Passed through verbatim; the backend emits ISO 8601 with or without
    /// an offset depending on the upstream aggregator.
    pub published_at: Option<String>,
}

/// Page envelope returned by the feed endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct NewsPage {
    #[serde(rename = "newsList")]
    pub news_list: Vec<Article>,
    #[serde(rename = "totalItems")]
    pub total_items: u64,
}

/// One entry in the source catalog (`/news/news_sources`).
#[derive(Debug, Clone, Deserialize)]
pub struct NewsSource {
    #[serde(rename = "_id")]
    pub id: String,
    /// Stable identifier, matching [`Article::source`].
    pub source: String,
    pub description: Option<String>,
}

/// Response to `POST /users/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub message: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Option<String>,
}

/// Response to `POST /refresh-token`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Response to `POST /users/signup`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    pub user_id: String,
    pub email: String,
    pub created_at: Option<String>,
}

/// Response to `GET /check-token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenCheck {
    pub valid: bool,
    pub detail: Option<String>,
}

/// Click analytics event posted to `POST /users/click`.
#[derive(Debug, Clone, Serialize)]
pub struct ClickEvent {
    pub user_id: String,
    pub news_id: String,
    pub activity_type: String,
    pub timestamp: DateTime<Utc>,
}

impl ClickEvent {
    /// A plain click on `news_id`, stamped now.
    pub fn click(user_id: impl Into<String>, news_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            news_id: news_id.into(),
            activity_type: "click".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Target state for a subscription toggle, carried as the `action` query
/// parameter of `PATCH /subscriptions/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionAction::Subscribe => "subscribe",
            SubscriptionAction::Unsubscribe => "unsubscribe",
        }
    }

    /// The flip side of this action.
    pub fn inverse(self) -> Self {
        match self {
            SubscriptionAction::Subscribe => SubscriptionAction::Unsubscribe,
            SubscriptionAction::Unsubscribe => SubscriptionAction::Subscribe,
        }
    }

    /// The subscribed-state this action drives toward.
    pub fn target_state(self) -> bool {
        self == SubscriptionAction::Subscribe
    }
}

impl std::fmt::Display for SubscriptionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
