//! Account endpoints: sessions, signup, click analytics, recovery.
use crate::api::client::{ApiClient, ApiError};
use crate::api::types::{ClickEvent, LoginResponse, SignupResponse, TokenCheck};
use reqwest::Method;
use secrecy::SecretString;

/// Exchange credentials for a session and persist it to the token store.
///
/// This is the only place a full token pair enters the store.
pub async fn login(
    client: &ApiClient,
    email: &str,
    password: &str,
) -> Result<LoginResponse, ApiError> {
    let payload = serde_json::json!({ "email": email, "password": password });
    let response: LoginResponse = client
        .send_public(Method::POST, "/users/login", Some(payload))
        .await?;

    client.store().set_session(
        SecretString::from(response.access_token.clone()),
        SecretString::from(response.refresh_token.clone()),
        response.user_id.clone(),
    )?;

    tracing::info!(user_id = ?response.user_id, "Logged in");
    Ok(response)
}

/// Create an account. Does not log in; the caller follows up with [`login`].
pub async fn signup(
    client: &ApiClient,
    email: &str,
    password: &str,
) -> Result<SignupResponse, ApiError> {
    let payload = serde_json::json!({ "email": email, "password": password });
    client
        .send_public(Method::POST, "/users/signup", Some(payload))
        .await
}

/// Probe whether the stored access token is still accepted.
///
/// A backend rejection is an answer, not an error: it comes back as
/// `valid: false` with the rejection detail. Transport-level failures and
/// a wiped session still propagate.
pub async fn check_token(client: &ApiClient) -> Result<TokenCheck, ApiError> {
    match client
        .send_authed::<TokenCheck>(Method::GET, "/check-token", None)
        .await
    {
        Ok(check) => Ok(check),
        Err(ApiError::RequestFailed { status, detail }) => {
            tracing::debug!(status = status, "Token check rejected");
            Ok(TokenCheck {
                valid: false,
                detail: Some(detail),
            })
        }
        Err(e) => Err(e),
    }
}

/// Record a click analytics event for an article.
///
/// Uses the user id captured at login; without one there is no session and
/// nothing to attribute the click to.
pub async fn record_click(client: &ApiClient, news_id: &str) -> Result<(), ApiError> {
    let Some(user_id) = client.store().user_id() else {
        return Err(ApiError::Unauthenticated);
    };

    let event = ClickEvent::click(user_id, news_id);
    // Same wire shape the web client sent: RFC 3339 timestamp included
    let payload = serde_json::json!({
        "user_id": event.user_id,
        "news_id": event.news_id,
        "activity_type": event.activity_type,
        "timestamp": event.timestamp.to_rfc3339(),
    });

    let _: serde_json::Value = client
        .send_authed(Method::POST, "/users/click", Some(payload))
        .await?;
    tracing::debug!(news_id = %news_id, "Recorded click event");
    Ok(())
}

/// Look up the account id registered for an email address.
pub async fn find_user_id(client: &ApiClient, email: &str) -> Result<serde_json::Value, ApiError> {
    let email_encoded: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
    let path = format!("/users/find-id?email={}", email_encoded);
    client.send_public(Method::GET, &path, None).await
}

/// Start a password reset for an email address.
pub async fn reset_password(
    client: &ApiClient,
    email: &str,
) -> Result<serde_json::Value, ApiError> {
    let payload = serde_json::json!({ "email": email });
    client
        .send_public(Method::POST, "/users/find-password", Some(payload))
        .await
}
