#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::routing::post as post_route;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use alif_backend::config::AppConfig;
use alif_backend::domain::User;
use alif_backend::openai::OpenAI;
use alif_backend::session::Clock;
use alif_backend::state::Providers;
use alif_backend::tts::ElevenLabs;
use alif_backend::{build_router, AppState};

pub const FAKE_TUTOR_REPLY: &str = "Ba sounds like the b in 'bat'.";
pub const FAKE_MP3: [u8; 4] = [0x49, 0x44, 0x33, 0x04];

pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    pub fn advance(&self, d: Duration) {
        let mut t = self.0.lock().unwrap();
        *t = *t + d;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<TestClock>,
}

/// Router over fresh in-memory state, no outbound providers, controllable clock.
pub fn create_test_app() -> TestApp {
    create_test_app_with(Providers::default())
}

pub fn create_test_app_with(providers: Providers) -> TestApp {
    let clock = Arc::new(TestClock(Mutex::new(Utc::now())));
    let state = Arc::new(AppState::build(AppConfig::default(), providers, clock.clone()).expect("state"));
    TestApp { router: build_router(state.clone()), state, clock }
}

/// Local stand-in for the LLM and TTS APIs, listening on an ephemeral port.
pub struct FakeProviders {
    pub base_url: String,
    pub chat_requests: Arc<Mutex<Vec<Value>>>,
    pub tts_calls: Arc<AtomicUsize>,
}

impl FakeProviders {
    pub async fn spawn() -> Self {
        let chat_requests = Arc::new(Mutex::new(Vec::new()));
        let tts_calls = Arc::new(AtomicUsize::new(0));

        let chats = chat_requests.clone();
        let calls = tts_calls.clone();
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post_route(move |Json(body): Json<Value>| {
                    let chats = chats.clone();
                    async move {
                        chats.lock().unwrap().push(body);
                        Json(json!({
                            "choices": [{ "message": { "content": FAKE_TUTOR_REPLY } }],
                            "usage": { "total_tokens": 42 }
                        }))
                    }
                }),
            )
            .route(
                "/v1/text-to-speech/:voice_id",
                post_route(move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        ([(header::CONTENT_TYPE, "audio/mpeg")], FAKE_MP3.to_vec())
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url: format!("http://{addr}/v1"), chat_requests, tts_calls }
    }

    pub fn providers(&self) -> Providers {
        Providers {
            openai: Some(OpenAI::new("test-key".into(), self.base_url.clone(), "test-model".into()).unwrap()),
            tts: Some(ElevenLabs::new("test-key".into(), self.base_url.clone(), 5).unwrap()),
            identity: None,
        }
    }

    pub fn tts_calls(&self) -> usize {
        self.tts_calls.load(Ordering::SeqCst)
    }
}

impl TestApp {
    /// Create the user record and hand back a live access token.
    pub async fn login(&self, user_id: &str) -> String {
        self.state
            .users
            .upsert(User {
                id: user_id.to_string(),
                email: format!("{user_id}@example.com"),
                name: user_id.to_string(),
                picture: None,
                created_at: Utc::now(),
            })
            .await;
        self.state.sessions.issue(user_id).await.access_token
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    b.body(Body::empty()).unwrap()
}

pub fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    b.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
