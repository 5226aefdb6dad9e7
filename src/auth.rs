//! Identity: exchanging an OAuth provider session id for a user, and resolving
//! bearer tokens on incoming requests.
//!
//! The identity provider is trusted verbatim. The first time it vouches for a user
//! we create the local record; after that we only refresh profile fields.

use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::domain::User;
use crate::error::{AppError, ProviderError};
use crate::session::SessionError;
use crate::state::AppState;

/// What the identity provider tells us about a session.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Identity {
  pub id: String,
  pub email: String,
  pub name: String,
  #[serde(default)]
  pub picture: Option<String>,
}

impl Identity {
  pub fn into_user(self, created_at: DateTime<Utc>) -> User {
    User { id: self.id, email: self.email, name: self.name, picture: self.picture, created_at }
  }
}

#[derive(Clone)]
pub struct IdentityClient {
  client: reqwest::Client,
  pub session_data_url: String,
}

impl IdentityClient {
  /// Construct the client if IDENTITY_PROVIDER_URL is set; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let url = std::env::var("IDENTITY_PROVIDER_URL").ok()?;
    Self::new(url).ok()
  }

  pub fn new(session_data_url: String) -> Result<Self, ProviderError> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
    Ok(Self { client, session_data_url })
  }

  /// Exchange an OAuth session id for the user's identity.
  #[instrument(level = "info", skip(self, session_id), fields(session_id_len = session_id.len()))]
  pub async fn exchange(&self, session_id: &str) -> Result<Identity, ProviderError> {
    let res = self.client.get(&self.session_data_url)
      .header(USER_AGENT, "alif-backend/0.1")
      .header("X-Session-ID", session_id)
      .send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(ProviderError::HttpStatus { status, body });
    }
    let identity: Identity = res.json().await?;
    debug!(target: "auth", user_id = %identity.id, "Identity provider accepted session");
    Ok(identity)
  }
}

/// Authenticated caller, resolved from `Authorization: Bearer <access token>`.
#[derive(Clone, Debug)]
pub struct AuthUser {
  pub user_id: String,
  pub access_token: String,
}

pub fn bearer_token(value: &str) -> Option<&str> {
  let (scheme, token) = value.split_once(' ')?;
  let token = token.trim();
  (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Shared by the HTTP extractor and the WebSocket upgrade (which passes the token in the query).
pub async fn resolve_token(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
  match state.sessions.resolve(token).await {
    Ok(user_id) => Ok(AuthUser { user_id, access_token: token.to_string() }),
    Err(SessionError::Expired) => Err(AppError::unauthorized("Session expired; refresh your token")),
    Err(SessionError::UnknownToken) => Err(AppError::unauthorized("Invalid or revoked session")),
  }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
  type Rejection = AppError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    let header = parts
      .headers
      .get(AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
    let token = bearer_token(header).ok_or_else(|| {
      warn!(target: "auth", "Malformed Authorization header");
      AppError::unauthorized("Expected a Bearer token")
    })?;
    resolve_token(state, token).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_bearer_tokens() {
    assert_eq!(bearer_token("Bearer abc"), Some("abc"));
    assert_eq!(bearer_token("bearer  abc "), Some("abc"));
    assert_eq!(bearer_token("Basic abc"), None);
    assert_eq!(bearer_token("Bearer "), None);
    assert_eq!(bearer_token("Bearer"), None);
  }

  #[test]
  fn identity_payload_tolerates_extra_fields() {
    let json = r#"{"id":"u-1","email":"a@b.c","name":"Amina","picture":null,"session_token":"xyz"}"#;
    let id: Identity = serde_json::from_str(json).expect("parse");
    assert_eq!(id.name, "Amina");
    let at = Utc::now() - chrono::Duration::days(3);
    let user = id.into_user(at);
    assert_eq!(user.id, "u-1");
    assert_eq!(user.created_at, at);
  }
}
