//! HTTP client for the news aggregation backend.
//!
//! This module owns everything that crosses the wire:
//!
//! - [`client`] - the authenticated request pipeline (bearer injection,
//!   single 401-triggered refresh-and-retry, hard logout on refresh failure)
//! - [`types`] - serde mappings for the backend's JSON payloads
//! - [`news`] - general feed pages, article details, the source catalog
//! - [`subscriptions`] - subscribed-source queries and per-source toggles
//! - [`users`] - login/signup, session teardown, click analytics, recovery
//!
//! All endpoint wrappers route through [`ApiClient`]; none of them build
//! `Authorization` headers themselves.

pub mod client;
pub mod news;
pub mod subscriptions;
pub mod types;
pub mod users;

pub use client::{ApiClient, ApiError, RefreshError};
pub use types::{Article, NewsPage, NewsSource, SubscriptionAction};
