//! Error types shared by handlers and outbound clients.
//!
//! `AppError` is what handlers return; it renders as `{success, error, code, state?}`.
//! `ProviderError` covers every outbound HTTP call (LLM, TTS, identity, Quran API)
//! and is caught at the orchestration boundary before it can reach a handler.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub success: bool,
  pub error: String,
  pub code: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub state: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct AppError {
  status: StatusCode,
  code: &'static str,
  message: String,
  state: Option<serde_json::Value>,
  is_operational: bool,
}

impl AppError {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
  }

  pub fn unauthorized(message: impl Into<String>) -> Self {
    Self::operational(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
  }

  /// Client-state desync (locked letter, stale quiz). Carries the authoritative state
  /// so the client can re-render instead of failing hard.
  pub fn policy(message: impl Into<String>, state: serde_json::Value) -> Self {
    let mut err = Self::operational(StatusCode::CONFLICT, "POLICY_VIOLATION", message);
    err.state = Some(state);
    err
  }

  pub fn upstream(message: impl Into<String>) -> Self {
    Self::operational(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message)
  }

  pub fn unavailable(message: impl Into<String>) -> Self {
    Self::operational(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", message)
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self {
      status: StatusCode::INTERNAL_SERVER_ERROR,
      code: "INTERNAL_ERROR",
      message: message.into(),
      state: None,
      is_operational: false,
    }
  }

  pub fn status(&self) -> StatusCode { self.status }

  pub fn code(&self) -> &'static str { self.code }

  pub fn message(&self) -> &str { &self.message }

  pub fn state(&self) -> Option<&serde_json::Value> { self.state.as_ref() }

  fn operational(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
    Self { status, code, message: message.into(), state: None, is_operational: true }
  }
}

impl std::fmt::Display for AppError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} ({}): {}", self.code, self.status, self.message)
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let error = if self.is_operational {
      self.message
    } else {
      tracing::error!(target: "alif_backend", code = self.code, message = %self.message, "Internal error");
      "Internal server error".to_string()
    };

    let body = ErrorResponse { success: false, error, code: self.code.to_string(), state: self.state };
    (self.status, Json(body)).into_response()
  }
}

/// Failure of an outbound call to a third-party API.
#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("provider not configured: {0}")]
  NotConfigured(&'static str),
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("HTTP {status}: {body}")]
  HttpStatus { status: u16, body: String },
  #[error("JSON decode failed: {0}")]
  Json(#[from] serde_json::Error),
  #[error("empty response")]
  Empty,
}

impl From<ProviderError> for AppError {
  fn from(e: ProviderError) -> Self {
    match e {
      ProviderError::NotConfigured(what) => AppError::unavailable(format!("{what} is not configured")),
      other => {
        // Third-party bodies stay in the logs.
        tracing::warn!(target: "alif_backend", error = %other, "Upstream call failed");
        AppError::upstream("Upstream service request failed")
      }
    }
  }
}

impl From<JsonRejection> for AppError {
  fn from(r: JsonRejection) -> Self {
    AppError::validation(r.body_text())
  }
}

impl From<QueryRejection> for AppError {
  fn from(r: QueryRejection) -> Self {
    AppError::validation(r.body_text())
  }
}

impl From<PathRejection> for AppError {
  fn from(r: PathRejection) -> Self {
    AppError::validation(r.body_text())
  }
}
