use axum::http::StatusCode;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

use common::{create_test_app, create_test_app_with, get, json_body, post, FakeProviders, TestApp, FAKE_TUTOR_REPLY};

async fn call(app: &TestApp, req: axum::http::Request<axum::body::Body>) -> (StatusCode, Value) {
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, json_body(resp).await)
}

/// Build a seeded quiz and answer it, picking the target when `correct`.
async fn take_quiz(app: &TestApp, token: &str, letter_id: u8, correct: bool) -> (StatusCode, Value) {
    let (status, quiz) = call(app, get(&format!("/api/quiz/{letter_id}?seed=11"), Some(token))).await;
    assert_eq!(status, StatusCode::OK);
    let selected = quiz["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_u64().unwrap())
        .find(|id| (*id == letter_id as u64) == correct)
        .unwrap();
    call(app, post("/api/quiz/answer", Some(token), json!({ "letter_id": letter_id, "selected_letter_id": selected }))).await
}

#[tokio::test]
async fn health_reports_catalog_and_providers() {
    let app = create_test_app();
    let (status, body) = call(&app, get("/api/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["letters"], 28);
    assert_eq!(body["tutor_enabled"], false);
}

#[tokio::test]
async fn alphabet_is_public_and_ordered() {
    let app = create_test_app();
    let (status, body) = call(&app, get("/api/alphabet", None)).await;
    assert_eq!(status, StatusCode::OK);
    let letters = body["letters"].as_array().unwrap();
    assert_eq!(letters.len(), 28);
    assert_eq!(letters[0]["arabic"], "ا");
    assert_eq!(letters[1]["arabic"], "ب");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let app = create_test_app();
    let (status, body) = call(&app, get("/api/progress", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["success"], false);

    let (status, _) = call(&app, get("/api/progress", Some("not-a-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn locked_lesson_is_a_policy_violation_with_state() {
    let app = create_test_app();
    let token = app.login("amina").await;

    let (status, body) = call(&app, get("/api/lessons/3", Some(&token))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "POLICY_VIOLATION");
    assert_eq!(body["state"]["unlocked_letter_ids"], json!([1]));

    let (status, body) = call(&app, get("/api/lessons/1", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "available");

    let (status, _) = call(&app, get("/api/lessons/99", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn passing_a_quiz_unlocks_the_next_letter() {
    let app = create_test_app();
    let token = app.login("amina").await;

    let (status, body) = take_quiz(&app, &token, 1, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);
    assert_eq!(body["score"], 100);
    assert_eq!(body["can_proceed"], true);
    assert_eq!(body["xp_earned"], 50);
    assert_eq!(body["unlocked_letter_ids"], json!([1, 2]));

    let (status, body) = call(&app, get("/api/progress", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_xp"], 50);
    assert_eq!(body["completed"], 1);

    let (status, body) = call(&app, get("/api/lessons/2", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "available");
}

#[tokio::test]
async fn retries_are_penalised_and_failures_do_not_unlock() {
    let app = create_test_app();
    let token = app.login("yusuf").await;

    let (_, wrong) = take_quiz(&app, &token, 1, false).await;
    assert_eq!(wrong["score"], 0);
    assert_eq!(wrong["can_proceed"], false);
    assert_eq!(wrong["unlocked_letter_ids"], json!([1]));

    let (_, right) = take_quiz(&app, &token, 1, true).await;
    assert_eq!(right["score"], 90);
    assert_eq!(right["attempts"], 2);
    assert_eq!(right["can_proceed"], true);

    let (_, body) = call(&app, get("/api/quiz/attempts", Some(&token))).await;
    assert_eq!(body["attempts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn answers_need_an_open_quiz_and_a_real_letter() {
    let app = create_test_app();
    let token = app.login("amina").await;

    let (status, body) = call(&app, post("/api/quiz/answer", Some(&token), json!({ "letter_id": 1, "selected_letter_id": 1 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["state"]["unlocked_letter_ids"], json!([1]));

    let (status, _) = call(&app, get("/api/quiz/1", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, post("/api/quiz/answer", Some(&token), json!({ "letter_id": 1, "selected_letter_id": 200 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "POLICY_VIOLATION");

    let (status, _) = call(&app, get("/api/quiz/2", Some(&token))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn answers_outside_the_offered_options_are_rejected() {
    let app = create_test_app();
    let token = app.login("amina").await;

    let (_, quiz) = call(&app, get("/api/quiz/1?seed=11", Some(&token))).await;
    let offered: Vec<u64> = quiz["options"].as_array().unwrap().iter().map(|o| o["id"].as_u64().unwrap()).collect();
    let outsider = (1..=28u64).find(|id| !offered.contains(id)).unwrap();

    let (status, body) = call(&app, post("/api/quiz/answer", Some(&token), json!({ "letter_id": 1, "selected_letter_id": outsider }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "POLICY_VIOLATION");
    assert_eq!(body["state"]["unlocked_letter_ids"], json!([1]));

    // Nothing was scored and the quiz is still open.
    let (_, log) = call(&app, get("/api/quiz/attempts", Some(&token))).await;
    assert!(log["attempts"].as_array().unwrap().is_empty());
    let (status, body) = call(&app, post("/api/quiz/answer", Some(&token), json!({ "letter_id": 1, "selected_letter_id": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 100);
    assert_eq!(body["attempts"], 1);
}

#[tokio::test]
async fn malformed_bodies_get_the_error_envelope() {
    let app = create_test_app();
    let token = app.login("amina").await;

    let (status, body) = call(&app, post("/api/quiz/answer", Some(&token), json!({ "letter_id": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("selected_letter_id"));

    let (status, body) = call(&app, get("/api/lessons/alif", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = call(&app, get("/api/quiz/1?seed=abc", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn lesson_results_are_validated_and_gated() {
    let app = create_test_app();
    let token = app.login("amina").await;

    let (status, body) = call(&app, post("/api/progress", Some(&token), json!({ "letter_id": 1, "score": 140 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = call(&app, post("/api/progress", Some(&token), json!({ "letter_id": 2, "score": 90 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, post("/api/progress", Some(&token), json!({ "letter_id": 1, "score": 85 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["can_proceed"], true);
    assert_eq!(body["unlocked_letter_ids"], json!([1, 2]));
}

#[tokio::test]
async fn review_queue_lists_low_scores_then_stale_letters() {
    let app = create_test_app();
    let token = app.login("amina").await;

    take_quiz(&app, &token, 1, true).await;
    call(&app, post("/api/progress", Some(&token), json!({ "letter_id": 2, "score": 85 }))).await;

    let (_, body) = call(&app, get("/api/review", Some(&token))).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["letter_id"], 2);
    assert_eq!(items[0]["reason"], "low_score");
    assert_eq!(items[0]["priority"], 1);

    app.clock.advance(Duration::days(8));
    let token = app.login("amina").await;
    let (_, body) = call(&app, get("/api/review", Some(&token))).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["letter_id"], 2);
    assert_eq!(items[1]["letter_id"], 1);
    assert_eq!(items[1]["reason"], "stale");
    assert_eq!(items[1]["priority"], 2);
}

#[tokio::test]
async fn tts_without_provider_falls_back_to_browser_speech() {
    let app = create_test_app();
    let (status, body) = call(&app, post("/api/tts/generate", None, json!({ "text": "ب" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "browser-fallback");
    assert_eq!(body["audio_ref"], "browser_speech:ب");

    let (status, _) = call(&app, post("/api/tts/generate", None, json!({ "text": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_audio_is_cached_after_the_first_call() {
    let fake = FakeProviders::spawn().await;
    let app = create_test_app_with(fake.providers());

    let (status, first) = call(&app, post("/api/tts/generate", None, json!({ "text": "ب" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["source"], "provider");
    assert_eq!(first["audio_ref"], "data:audio/mpeg;base64,SUQzBA==");

    for _ in 0..2 {
        let (_, again) = call(&app, post("/api/tts/generate", None, json!({ "text": "ب" }))).await;
        assert_eq!(again["source"], "cache");
        assert_eq!(again["audio_ref"], first["audio_ref"]);
    }
    assert_eq!(fake.tts_calls(), 1);

    let (_, other) = call(&app, post("/api/tts/generate", None, json!({ "text": "ت" }))).await;
    assert_eq!(other["source"], "provider");
    assert_eq!(fake.tts_calls(), 2);
}

#[tokio::test]
async fn tutor_replies_are_relayed_and_fed_back_as_history() {
    let fake = FakeProviders::spawn().await;
    let app = create_test_app_with(fake.providers());
    let token = app.login("amina").await;

    let (status, body) = call(&app, post("/api/chat", Some(&token), json!({ "message": "How do I say ب?", "letter_id": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], true);
    assert_eq!(body["response"], FAKE_TUTOR_REPLY);

    let (_, history) = call(&app, get("/api/chat/history", Some(&token))).await;
    let exchanges = history["exchanges"].as_array().unwrap();
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0]["user_message"], "How do I say ب?");
    assert_eq!(exchanges[0]["assistant_reply"], FAKE_TUTOR_REPLY);

    call(&app, post("/api/chat", Some(&token), json!({ "message": "And ت?" }))).await;
    let requests = fake.chat_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    let messages = requests[1]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "How do I say ب?");
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["content"], FAKE_TUTOR_REPLY);
    assert_eq!(messages[3]["content"], "And ت?");
}

#[tokio::test]
async fn tutor_failure_apologises_and_records_nothing() {
    let app = create_test_app();
    let token = app.login("amina").await;

    let (status, body) = call(&app, post("/api/chat", Some(&token), json!({ "message": "How do I say ب?", "letter_id": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], false);
    assert_eq!(body["response"], app.state.config.prompts.apology.as_str());
    assert!(!body["suggestions"].as_array().unwrap().is_empty());

    let (_, history) = call(&app, get("/api/chat/history", Some(&token))).await;
    assert!(history["exchanges"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn sessions_refresh_and_log_out() {
    let app = create_test_app();
    app.login("amina").await;
    let session = app.state.sessions.issue("amina").await;

    let (status, me) = call(&app, get("/api/auth/me", Some(&session.access_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], "amina");

    let (status, fresh) = call(&app, post("/api/auth/refresh", None, json!({ "refresh_token": session.refresh_token }))).await;
    assert_eq!(status, StatusCode::OK);
    let access = fresh["access_token"].as_str().unwrap().to_string();
    assert_ne!(access, session.access_token);

    let (status, _) = call(&app, get("/api/auth/me", Some(&session.access_token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, post("/api/auth/logout", Some(&access), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let (status, _) = call(&app, get("/api/auth/me", Some(&access))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn identity_exchange_needs_a_configured_provider() {
    let app = create_test_app();
    let (status, body) = call(&app, post("/api/auth/session", None, json!({ "session_id": "abc" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "UNAVAILABLE");
}
