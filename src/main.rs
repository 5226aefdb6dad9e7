//! Alif · Arabic Alphabet Trainer Backend
//!
//! - Axum HTTP + WebSocket API
//! - Optional OpenAI tutor, ElevenLabs TTS and identity provider (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 8001)
//!   ALIF_CONFIG_PATH      : path to TOML config (prompts, policy, tutor, tts, session, quran)
//!   OPENAI_API_KEY        : enables the tutor if present
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_MODEL          : default "gpt-4o-mini"
//!   ELEVENLABS_API_KEY    : enables provider TTS if present
//!   ELEVENLABS_BASE_URL   : default "https://api.elevenlabs.io/v1"
//!   IDENTITY_PROVIDER_URL : session-data endpoint of the OAuth identity provider
//!   QURAN_API_BASE        : default "https://api.quran.com/api/v4"
//!   CORS_ORIGINS          : comma separated origins, default "*"
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use alif_backend::{build_router, telemetry, AppState};

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (catalog, stores, sessions, provider clients).
  let state = Arc::new(AppState::new()?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 8001.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8001)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "alif_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
