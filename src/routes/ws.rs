//! WebSocket upgrade + message loop. The access token travels in the query string
//! (`/ws?token=...`); each client message is parsed as JSON and forwarded to core logic.
//! We reply with a single JSON message per request.
//!
//! The connection tracks the client-observed lesson lifecycle per letter
//! (`InProgress`, `QuizPending`) on top of what the store can derive.

use std::collections::HashMap;
use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::{IntoResponse, Response},
};
use tracing::{info, error, instrument, debug};

use crate::auth::{resolve_token, AuthUser};
use crate::domain::{LetterId, LetterState};
use crate::error::AppError;
use crate::gating::{derive_state, transition, LessonEvent};
use crate::logic::*;
use crate::protocol::{ChatIn, ClientWsMessage, ServerWsMessage, WsQuery};
use crate::state::AppState;
use super::extract::ApiQuery;

#[instrument(level = "info", skip(ws, state, q))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<WsQuery>,
) -> Response {
  let token = q.token.unwrap_or_default();
  let user = match resolve_token(&state, &token).await {
    Ok(u) => u,
    Err(e) => return e.into_response(),
  };
  info!(target: "alif_backend", user_id = %user.user_id, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, user))
}

/// Per-connection lesson lifecycle overlay.
#[derive(Default)]
struct LessonSession {
  states: HashMap<LetterId, LetterState>,
}

impl LessonSession {
  /// Current state: the connection's view if it has one, otherwise what the store implies.
  async fn current(&self, state: &AppState, user_id: &str, letter_id: LetterId) -> LetterState {
    let progress = state.progress.progress_for(user_id).await;
    let stored = derive_state(letter_id, &progress, state.catalog.len());
    match (stored, self.states.get(&letter_id)) {
      // The store wins once it knows the letter is passed or locked.
      (LetterState::Passed | LetterState::Locked, _) => stored,
      (_, Some(local)) => *local,
      (_, None) => stored,
    }
  }

  /// The state `event` would lead to, without recording it.
  async fn check(&self, state: &AppState, user_id: &str, letter_id: LetterId, event: LessonEvent) -> Result<LetterState, AppError> {
    let from = self.current(state, user_id, letter_id).await;
    transition(from, event)
      .ok_or_else(|| AppError::validation(format!("Cannot {event:?} while letter {letter_id} is {from:?}")))
  }

  async fn advance(&mut self, state: &AppState, user_id: &str, letter_id: LetterId, event: LessonEvent) -> Result<LetterState, AppError> {
    let to = self.check(state, user_id, letter_id, event).await?;
    self.states.insert(letter_id, to);
    Ok(to)
  }
}

#[instrument(level = "info", skip(socket, state, user), fields(user_id = %user.user_id))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, user: AuthUser) {
  info!(target: "alif_backend", "WebSocket connected");
  let mut session = LessonSession::default();
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "alif_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &user, &mut session).await.unwrap_or_else(error_msg)
          }
          Err(e) => ServerWsMessage::Error { code: "VALIDATION_ERROR".into(), message: format!("Invalid JSON: {}", e), state: None },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "code": "INTERNAL_ERROR", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "alif_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "alif_backend", "WebSocket disconnected");
}

fn error_msg(e: AppError) -> ServerWsMessage {
  ServerWsMessage::Error { code: e.code().to_string(), message: e.message().to_string(), state: e.state().cloned() }
}

async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  user: &AuthUser,
  session: &mut LessonSession,
) -> Result<ServerWsMessage, AppError> {
  let user_id = user.user_id.as_str();
  match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::ViewLesson { letter_id } => {
      let mut lesson = view_lesson(state, user_id, letter_id).await?;
      lesson.state = session.advance(state, user_id, lesson.letter.id, LessonEvent::ViewLesson).await?;
      Ok(ServerWsMessage::Lesson { lesson })
    }

    ClientWsMessage::BuildQuiz { letter_id, seed } => {
      let id = catalog_letter(state, letter_id)?;
      // Check the lifecycle before touching the open quiz for this letter.
      session.check(state, user_id, id, LessonEvent::StartQuiz).await?;
      let quiz = start_quiz(state, user_id, letter_id, seed).await?;
      let lesson_state = session.advance(state, user_id, id, LessonEvent::StartQuiz).await?;
      Ok(ServerWsMessage::Quiz { quiz, state: lesson_state })
    }

    ClientWsMessage::SubmitAnswer { letter_id, selected_letter_id } => {
      let result = answer_quiz(state, user_id, letter_id, selected_letter_id).await?;
      let id = catalog_letter(state, letter_id)?;
      let event = if result.can_proceed { LessonEvent::QuizPassed } else { LessonEvent::QuizFailed };
      // A quiz built over HTTP leaves no local state; fall back to the store's view.
      let lesson_state = match session.advance(state, user_id, id, event).await {
        Ok(s) => s,
        Err(_) => session.current(state, user_id, id).await,
      };
      info!(target: "quiz", %user_id, letter_id = id, correct = result.correct, state = ?lesson_state, "WS submit_answer evaluated");
      Ok(ServerWsMessage::AnswerResult { result, state: lesson_state })
    }

    ClientWsMessage::Ask { message, letter_id, context } => {
      let reply = ask_tutor(state, user_id, ChatIn { message, letter_id, context, session_id: None }).await?;
      Ok(ServerWsMessage::TutorReply { reply })
    }

    ClientWsMessage::Speak { text, voice_id } => {
      let clip = speak(state, &text, voice_id.as_deref()).await?;
      Ok(ServerWsMessage::Audio { clip })
    }
  }
}
