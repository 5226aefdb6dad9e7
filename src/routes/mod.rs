//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::state::AppState;

mod extract;
pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws?token=...`
/// - health at `/api/v1/health`, everything else under `/api/...`
/// - Static SPA from `./static` with index fallback
/// - CORS from CORS_ORIGINS (comma separated; unset or `*` allows any origin)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // Health
        .route("/api/v1/health", get(http::http_health))
        // Catalog, lessons, progress
        .route("/api/alphabet", get(http::http_get_alphabet))
        .route("/api/lessons", get(http::http_get_alphabet))
        .route("/api/lessons/:letter_id", get(http::http_get_lesson))
        .route("/api/progress", get(http::http_get_progress).post(http::http_post_progress))
        // Quiz + review
        .route("/api/quiz/answer", post(http::http_post_answer))
        .route("/api/quiz/attempts", get(http::http_get_attempts))
        .route("/api/quiz/:letter_id", get(http::http_get_quiz))
        .route("/api/review", get(http::http_get_review))
        // Tutor + audio
        .route("/api/chat", post(http::http_post_chat))
        .route("/api/chat/history", get(http::http_get_chat_history))
        .route("/api/tts/generate", post(http::http_post_tts))
        // Auth
        .route("/api/auth/session", post(http::http_post_auth_session))
        .route("/api/auth/refresh", post(http::http_post_auth_refresh))
        .route("/api/auth/me", get(http::http_get_me))
        .route("/api/auth/logout", post(http::http_post_logout))
        // Quran reference proxy
        .route("/api/quran/chapters", get(http::http_quran_chapters))
        .route("/api/quran/verses/:chapter", get(http::http_quran_verses))
        .route("/api/quran/tafsirs", get(http::http_quran_tafsirs))
        .route("/api/quran/tafsir/:tafsir_id/ayah/:ayah_key", get(http::http_quran_tafsir_ayah))
        .route("/api/quran/tafsir/:tafsir_id/chapter/:chapter", get(http::http_quran_tafsir_chapter))
        .route("/api/quran/audio/:chapter", get(http::http_quran_audio))
        // State + HTTP tracing + CORS
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(cors_layer()),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

fn cors_layer() -> CorsLayer {
    let origins = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into());
    let allow_origin = if origins.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        let list: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(target: "alif_backend", origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
