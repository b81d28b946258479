//! Client library for a news aggregation service.
//!
//! The pieces compose in one direction:
//!
//! - [`auth::TokenStore`] holds the persisted access/refresh token pair
//! - [`api::ApiClient`] wraps every HTTP call, transparently refreshing and
//!   replaying once on HTTP 401 and forcing a logout when refresh fails
//! - [`subscriptions::SubscriptionReconciler`] buffers per-source toggles
//!   and commits them as a batch with a per-source outcome report
//! - [`pager::NewsFeedPager`] walks a feed page by page, guarding against
//!   duplicate in-flight fetches and stale responses after a feed switch
//!
//! The binary in `src/main.rs` is a thin command-line front over these.

pub mod api;
pub mod auth;
pub mod config;
pub mod pager;
pub mod subscriptions;

pub use api::{ApiClient, ApiError};
pub use auth::TokenStore;
pub use config::Config;
pub use pager::{Feed, NewsFeedPager};
pub use subscriptions::SubscriptionReconciler;
