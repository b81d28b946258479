//! Session credential management.
//!
//! The backend issues an access/refresh token pair at login; this module owns
//! the persisted copy of that pair:
//!
//! - **TokenStore**: process-wide accessor over the credentials, backed by a
//!   JSON file in the config directory (or purely in-memory for tests)
//!
//! Tokens only enter the store through [`TokenStore::set_session`] (login)
//! and [`TokenStore::set_access_token`] (refresh) — callers never construct
//! header values from anything else.

mod store;

pub use store::{StoreError, TokenStore};
