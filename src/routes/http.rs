//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs the caller plus basic result info.

use std::sync::Arc;
use axum::{extract::State, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::auth::AuthUser;
use crate::domain::AudioClip;
use crate::error::AppError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::logic::*;
use crate::protocol::*;
use crate::quran::{Chapter, ChapterAudio, ChapterTafsir, TafsirEntry, TafsirResource, VersePage};
use crate::state::AppState;

const DEFAULT_RECITER: u32 = 7;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    letters: state.catalog.len(),
    tutor_enabled: state.openai.is_some(),
    tts_enabled: state.audio.has_provider(),
  })
}

// ---------- Catalog / lessons / progress ----------

#[instrument(level = "info", skip(state))]
pub async fn http_get_alphabet(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(AlphabetOut { letters: state.catalog.letters().to_vec(), total: state.catalog.len() })
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.user_id))]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
  ApiPath(letter_id): ApiPath<u32>,
) -> Result<Json<LessonOut>, AppError> {
  let lesson = view_lesson(&state, &user.user_id, letter_id).await?;
  info!(target: "quiz", user_id = %user.user_id, letter_id, state = ?lesson.state, "HTTP lesson served");
  Ok(Json(lesson))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.user_id))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>, user: AuthUser) -> Json<ProgressOut> {
  Json(progress_overview(&state, &user.user_id).await)
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.user_id, letter_id = body.letter_id, score = body.score))]
pub async fn http_post_progress(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
  ApiJson(body): ApiJson<LessonResultIn>,
) -> Result<Json<AnswerOut>, AppError> {
  Ok(Json(record_lesson(&state, &user.user_id, body.letter_id, body.score).await?))
}

// ---------- Quiz / review ----------

#[instrument(level = "info", skip(state, user), fields(user_id = %user.user_id))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
  ApiPath(letter_id): ApiPath<u32>,
  ApiQuery(q): ApiQuery<QuizQuery>,
) -> Result<Json<QuizOut>, AppError> {
  Ok(Json(start_quiz(&state, &user.user_id, letter_id, q.seed).await?))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.user_id, letter_id = body.letter_id, selected = body.selected_letter_id))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
  ApiJson(body): ApiJson<AnswerIn>,
) -> Result<Json<AnswerOut>, AppError> {
  let out = answer_quiz(&state, &user.user_id, body.letter_id, body.selected_letter_id).await?;
  info!(target: "quiz", user_id = %user.user_id, correct = out.correct, score = out.score, "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.user_id))]
pub async fn http_get_attempts(State(state): State<Arc<AppState>>, user: AuthUser) -> Json<AttemptsOut> {
  Json(AttemptsOut { attempts: state.progress.attempt_log(&user.user_id).await })
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.user_id))]
pub async fn http_get_review(State(state): State<Arc<AppState>>, user: AuthUser) -> Json<ReviewOut> {
  let items = review_queue(&state, &user.user_id).await;
  info!(target: "quiz", user_id = %user.user_id, items = items.len(), "HTTP review queue served");
  Json(ReviewOut { items })
}

// ---------- Tutor / audio ----------

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.user_id, message_len = body.message.len()))]
pub async fn http_post_chat(
  State(state): State<Arc<AppState>>,
  user: AuthUser,
  ApiJson(body): ApiJson<ChatIn>,
) -> Result<Json<ChatOut>, AppError> {
  Ok(Json(ask_tutor(&state, &user.user_id, body).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.user_id))]
pub async fn http_get_chat_history(State(state): State<Arc<AppState>>, user: AuthUser) -> Json<ChatHistoryOut> {
  let exchanges = state.chats.recent(&user.user_id, state.config.tutor.history_limit).await;
  Json(ChatHistoryOut { exchanges })
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_tts(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<TtsIn>,
) -> Result<Json<AudioClip>, AppError> {
  let clip = speak(&state, &body.text, body.voice_id.as_deref()).await?;
  info!(target: "tts", source = ?clip.source, "HTTP audio served");
  Ok(Json(clip))
}

// ---------- Auth ----------

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_auth_session(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<SessionIn>,
) -> Result<Json<AuthOut>, AppError> {
  Ok(Json(open_session(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_auth_refresh(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<RefreshIn>,
) -> Result<Json<AuthOut>, AppError> {
  Ok(Json(refresh_session(&state, &body.refresh_token).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.user_id))]
pub async fn http_get_me(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<crate::domain::User>, AppError> {
  Ok(Json(current_user(&state, &user.user_id).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.user_id))]
pub async fn http_post_logout(State(state): State<Arc<AppState>>, user: AuthUser) -> Json<OkOut> {
  Json(OkOut { ok: logout(&state, &user.access_token).await })
}

// ---------- Quran proxy ----------

#[instrument(level = "info", skip(state))]
pub async fn http_quran_chapters(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Chapter>>, AppError> {
  Ok(Json(state.quran.chapters().await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quran_verses(
  State(state): State<Arc<AppState>>,
  ApiPath(chapter): ApiPath<u32>,
  ApiQuery(q): ApiQuery<VersesQuery>,
) -> Result<Json<VersePage>, AppError> {
  check_chapter(chapter)?;
  let page = q.page.unwrap_or(1).max(1);
  let per_page = q.per_page.unwrap_or(10).clamp(1, 50);
  Ok(Json(state.quran.verses_by_chapter(chapter, q.translation, page, per_page).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quran_tafsirs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TafsirResource>>, AppError> {
  Ok(Json(state.quran.tafsirs().await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quran_tafsir_ayah(
  State(state): State<Arc<AppState>>,
  ApiPath((tafsir_id, ayah_key)): ApiPath<(u32, String)>,
) -> Result<Json<TafsirEntry>, AppError> {
  let valid_key = ayah_key
    .split_once(':')
    .map(|(c, v)| c.parse::<u32>().is_ok() && v.parse::<u32>().is_ok())
    .unwrap_or(false);
  if !valid_key {
    return Err(AppError::validation("ayah key must look like '2:255'"));
  }
  Ok(Json(state.quran.tafsir_for_ayah(tafsir_id, &ayah_key).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quran_tafsir_chapter(
  State(state): State<Arc<AppState>>,
  ApiPath((tafsir_id, chapter)): ApiPath<(u32, u32)>,
) -> Result<Json<ChapterTafsir>, AppError> {
  check_chapter(chapter)?;
  Ok(Json(state.quran.tafsir_for_chapter(tafsir_id, chapter).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quran_audio(
  State(state): State<Arc<AppState>>,
  ApiPath(chapter): ApiPath<u32>,
  ApiQuery(q): ApiQuery<RecitationQuery>,
) -> Result<Json<ChapterAudio>, AppError> {
  check_chapter(chapter)?;
  let reciter = q.reciter_id.unwrap_or(DEFAULT_RECITER);
  Ok(Json(state.quran.audio_for_chapter(chapter, reciter).await?))
}

fn check_chapter(chapter: u32) -> Result<(), AppError> {
  if (1..=114).contains(&chapter) {
    Ok(())
  } else {
    Err(AppError::validation("chapter must be between 1 and 114"))
  }
}
