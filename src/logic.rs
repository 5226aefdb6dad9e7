//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Lesson views and progress overviews (gating enforced here)
//!   - Building quizzes and scoring submissions / lesson results
//!   - The review queue
//!   - Tutor turns and audio lookups
//!   - Session open / refresh / logout
//!
//! Every gating refusal is a `409 POLICY_VIOLATION` carrying the caller's unlocked ids.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{AudioClip, ChatExchange, LetterId, ProgressSet, ReviewQueueItem, User};
use crate::error::AppError;
use crate::gating::{derive_state, is_unlocked, unlocked_ids};
use crate::protocol::{AnswerOut, AuthOut, ChatIn, ChatOut, GatingState, LessonOut, ProgressOut, QuizOut};
use crate::quiz::{build_quiz, lesson_result, outcome_message, submit_answer};
use crate::review::compute_review_queue;
use crate::session::{Session, SessionError};
use crate::state::AppState;
use crate::tutor;
use crate::util::trunc_for_log;

const MAX_CHAT_CHARS: usize = 2000;
const MAX_TTS_CHARS: usize = 500;

/// Map a wire id onto the catalog. Unknown ids are `NOT_FOUND`.
pub fn catalog_letter(state: &AppState, raw: u32) -> Result<LetterId, AppError> {
  LetterId::try_from(raw)
    .ok()
    .filter(|id| state.catalog.contains(*id))
    .ok_or_else(|| AppError::not_found(format!("Letter {raw} does not exist")))
}

fn gating_violation(message: impl Into<String>, progress: &ProgressSet, catalog_len: usize) -> AppError {
  let gating = GatingState { unlocked_letter_ids: unlocked_ids(progress, catalog_len) };
  AppError::policy(message, serde_json::to_value(gating).unwrap_or_default())
}

async fn require_unlocked(state: &AppState, user_id: &str, letter_id: LetterId) -> Result<ProgressSet, AppError> {
  let progress = state.progress.progress_for(user_id).await;
  if !is_unlocked(letter_id, &progress, state.catalog.len()) {
    warn!(target: "quiz", %user_id, letter_id, "Locked letter requested");
    return Err(gating_violation(
      format!("Letter {letter_id} is locked; complete letter {} first", letter_id.saturating_sub(1)),
      &progress,
      state.catalog.len(),
    ));
  }
  Ok(progress)
}

#[instrument(level = "info", skip(state))]
pub async fn view_lesson(state: &AppState, user_id: &str, raw_letter_id: u32) -> Result<LessonOut, AppError> {
  let letter_id = catalog_letter(state, raw_letter_id)?;
  let progress = require_unlocked(state, user_id, letter_id).await?;
  let letter = state.catalog.get(letter_id).cloned().ok_or_else(|| AppError::internal("catalog lookup failed"))?;
  Ok(LessonOut {
    state: derive_state(letter_id, &progress, state.catalog.len()),
    progress: progress.get(&letter_id).cloned(),
    letter,
  })
}

#[instrument(level = "info", skip(state))]
pub async fn progress_overview(state: &AppState, user_id: &str) -> ProgressOut {
  let progress = state.progress.progress_for(user_id).await;
  let total_xp = state.progress.total_xp(user_id).await;
  ProgressOut {
    unlocked_letter_ids: unlocked_ids(&progress, state.catalog.len()),
    completed: progress.values().filter(|r| r.completed).count(),
    total: state.catalog.len(),
    total_xp,
    records: progress.into_values().collect(),
  }
}

/// Build a quiz for an unlocked letter and remember its options until answered.
#[instrument(level = "info", skip(state))]
pub async fn start_quiz(state: &AppState, user_id: &str, raw_letter_id: u32, seed: Option<u64>) -> Result<QuizOut, AppError> {
  let letter_id = catalog_letter(state, raw_letter_id)?;
  require_unlocked(state, user_id, letter_id).await?;

  let mut rng = match seed {
    Some(s) => StdRng::seed_from_u64(s),
    None => StdRng::from_entropy(),
  };
  let quiz = build_quiz(letter_id, &state.catalog, &mut rng).map_err(|e| AppError::internal(e.to_string()))?;
  state.quizzes.open(user_id, letter_id, quiz.options.iter().map(|o| o.id).collect()).await;
  debug!(target: "quiz", %user_id, letter_id, seeded = seed.is_some(), "Quiz built");
  Ok(QuizOut::from(&quiz))
}

#[instrument(level = "info", skip(state))]
pub async fn answer_quiz(state: &AppState, user_id: &str, raw_letter_id: u32, raw_selected: u32) -> Result<AnswerOut, AppError> {
  let letter_id = catalog_letter(state, raw_letter_id)?;
  let progress = require_unlocked(state, user_id, letter_id).await?;
  let catalog_len = state.catalog.len();

  let selected = match LetterId::try_from(raw_selected).ok().filter(|id| state.catalog.contains(*id)) {
    Some(id) => id,
    None => {
      return Err(gating_violation(format!("Selected letter {raw_selected} is not in the alphabet"), &progress, catalog_len));
    }
  };
  let offered = match state.quizzes.take(user_id, letter_id).await {
    Some(ids) => ids,
    None => {
      return Err(gating_violation(
        format!("No open quiz for letter {letter_id}; request a quiz first"),
        &progress,
        catalog_len,
      ));
    }
  };
  if !offered.contains(&selected) {
    // Not a real answer: keep the quiz open and leave the attempt count alone.
    state.quizzes.open(user_id, letter_id, offered).await;
    warn!(target: "quiz", %user_id, letter_id, selected, "Answer was not one of the offered options");
    return Err(gating_violation(
      format!("Letter {selected} was not offered in the quiz for letter {letter_id}"),
      &progress,
      catalog_len,
    ));
  }

  let now = state.sessions.now();
  let policy = &state.config.policy;
  let (attempt, record) = state
    .progress
    .record_submission(user_id, letter_id, now, |prior, done| submit_answer(letter_id, selected, prior, done, policy))
    .await;
  info!(target: "quiz", %user_id, letter_id, correct = attempt.correct, score = attempt.score, can_proceed = attempt.can_proceed, "Quiz answer scored");

  let after = state.progress.progress_for(user_id).await;
  Ok(AnswerOut {
    message: outcome_message(&attempt),
    correct: attempt.correct,
    score: attempt.score,
    xp_earned: attempt.xp_earned,
    can_proceed: attempt.can_proceed,
    min_score_required: attempt.min_score_required,
    attempts: record.attempts,
    unlocked_letter_ids: unlocked_ids(&after, catalog_len),
  })
}

/// Record a lesson result reported by the client (`POST /api/progress`).
#[instrument(level = "info", skip(state))]
pub async fn record_lesson(state: &AppState, user_id: &str, raw_letter_id: u32, score: i64) -> Result<AnswerOut, AppError> {
  let letter_id = catalog_letter(state, raw_letter_id)?;
  let score = u8::try_from(score)
    .ok()
    .filter(|s| *s <= 100)
    .ok_or_else(|| AppError::validation("score must be between 0 and 100"))?;
  require_unlocked(state, user_id, letter_id).await?;

  let now = state.sessions.now();
  let policy = &state.config.policy;
  let (attempt, record) = state
    .progress
    .record_submission(user_id, letter_id, now, |_prior, done| lesson_result(letter_id, score, done, policy))
    .await;
  info!(target: "quiz", %user_id, letter_id, score, can_proceed = attempt.can_proceed, "Lesson result recorded");

  let after = state.progress.progress_for(user_id).await;
  Ok(AnswerOut {
    message: outcome_message(&attempt),
    correct: attempt.correct,
    score: attempt.score,
    xp_earned: attempt.xp_earned,
    can_proceed: attempt.can_proceed,
    min_score_required: attempt.min_score_required,
    attempts: record.attempts,
    unlocked_letter_ids: unlocked_ids(&after, state.catalog.len()),
  })
}

#[instrument(level = "info", skip(state))]
pub async fn review_queue(state: &AppState, user_id: &str) -> Vec<ReviewQueueItem> {
  let progress = state.progress.progress_for(user_id).await;
  compute_review_queue(&progress, state.sessions.now(), &state.config.policy)
}

#[instrument(level = "info", skip(state, req), fields(message_len = req.message.len(), letter_id = ?req.letter_id))]
pub async fn ask_tutor(state: &AppState, user_id: &str, req: ChatIn) -> Result<ChatOut, AppError> {
  let message = req.message.trim();
  if message.is_empty() {
    return Err(AppError::validation("message must not be empty"));
  }
  if message.chars().count() > MAX_CHAT_CHARS {
    return Err(AppError::validation(format!("message must be at most {MAX_CHAT_CHARS} characters")));
  }
  let letter = match req.letter_id {
    Some(raw) => {
      let id = LetterId::try_from(raw)
        .ok()
        .filter(|id| state.catalog.contains(*id))
        .ok_or_else(|| AppError::validation(format!("Unknown letter_id {raw}")))?;
      state.catalog.get(id)
    }
    None => None,
  };
  let context = req.context.as_deref().map(str::trim).filter(|c| !c.is_empty());
  let session_id = req.session_id.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| Uuid::new_v4().to_string());

  let progress = state.progress.progress_for(user_id).await;
  let summary = tutor::summarize(&progress, state.catalog.len(), &state.config.policy);
  let system = tutor::build_system_instruction(&state.config.prompts, &state.catalog, letter, &summary);
  let history = state.chats.recent(user_id, state.config.tutor.history_limit).await;
  let turn = match context {
    Some(ctx) => format!("Context: {ctx}\nUser question: {message}"),
    None => message.to_string(),
  };
  let messages = tutor::build_messages(system, &history, state.config.tutor.history_limit, &turn);
  let suggestions = tutor::suggestions(&state.catalog, letter, &summary);

  let reply = tutor::ask(state.openai.as_ref(), &messages, &state.config.prompts, &state.config.tutor, suggestions).await;
  if reply.delivered {
    state
      .chats
      .append(ChatExchange {
        user_id: user_id.to_string(),
        session_id: session_id.clone(),
        lesson_letter_id: letter.map(|l| l.id),
        context: context.map(str::to_string),
        user_message: message.to_string(),
        assistant_reply: reply.reply.clone(),
        created_at: state.sessions.now(),
      })
      .await;
  }
  debug!(target: "tutor", %user_id, delivered = reply.delivered, question = %trunc_for_log(message, 80), "Tutor turn finished");

  Ok(ChatOut { response: reply.reply, session_id, delivered: reply.delivered, suggestions: reply.suggestions })
}

#[instrument(level = "info", skip(state, text), fields(text_len = text.len()))]
pub async fn speak(state: &AppState, text: &str, voice_id: Option<&str>) -> Result<AudioClip, AppError> {
  let text = text.trim();
  if text.is_empty() {
    return Err(AppError::validation("text must not be empty"));
  }
  if text.chars().count() > MAX_TTS_CHARS {
    return Err(AppError::validation(format!("text must be at most {MAX_TTS_CHARS} characters")));
  }
  Ok(state.audio.get_audio(text, voice_id).await)
}

fn auth_out(session: Session, user: User) -> AuthOut {
  AuthOut {
    access_token: session.access_token,
    refresh_token: session.refresh_token,
    token_type: "Bearer",
    expires_at: session.access_expires_at,
    refresh_in_secs: session.refresh_in_secs,
    user,
  }
}

/// Exchange an identity-provider session id for a local user and a fresh token pair.
#[instrument(level = "info", skip_all)]
pub async fn open_session(state: &AppState, provider_session_id: &str) -> Result<AuthOut, AppError> {
  if provider_session_id.trim().is_empty() {
    return Err(AppError::validation("session_id must not be empty"));
  }
  let identity = state
    .identity
    .as_ref()
    .ok_or_else(|| AppError::unavailable("Identity provider is not configured"))?;
  let who = identity.exchange(provider_session_id.trim()).await.map_err(|e| {
    warn!(target: "auth", error = %e, "Identity exchange failed");
    AppError::unauthorized("Identity provider rejected the session")
  })?;

  let user = state.users.upsert(who.into_user(state.sessions.now())).await;
  let session = state.sessions.issue(&user.id).await;
  Ok(auth_out(session, user))
}

#[instrument(level = "info", skip_all)]
pub async fn refresh_session(state: &AppState, refresh_token: &str) -> Result<AuthOut, AppError> {
  let session = state.sessions.refresh(refresh_token).await.map_err(|e| match e {
    SessionError::Expired => AppError::unauthorized("Refresh token expired; sign in again"),
    SessionError::UnknownToken => AppError::unauthorized("Unknown refresh token"),
  })?;
  let user = state
    .users
    .get(&session.user_id)
    .await
    .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;
  Ok(auth_out(session, user))
}

pub async fn current_user(state: &AppState, user_id: &str) -> Result<User, AppError> {
  state.users.get(user_id).await.ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn logout(state: &AppState, access_token: &str) -> bool {
  let revoked = state.sessions.revoke(access_token).await;
  info!(target: "auth", revoked, "Logout");
  revoked
}
