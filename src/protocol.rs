//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AudioClip, ChatExchange, LetterEntry, LetterId, LetterState, ProgressRecord, QuizAttempt,
    ReviewQueueItem, User,
};
use crate::quiz::Quiz;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ViewLesson {
        letter_id: u32,
    },
    BuildQuiz {
        letter_id: u32,
        #[serde(default)]
        seed: Option<u64>,
    },
    SubmitAnswer {
        letter_id: u32,
        selected_letter_id: u32,
    },
    Ask {
        message: String,
        #[serde(default)]
        letter_id: Option<u32>,
        #[serde(default)]
        context: Option<String>,
    },
    Speak {
        text: String,
        #[serde(default)]
        voice_id: Option<String>,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Lesson {
        lesson: LessonOut,
    },
    Quiz {
        quiz: QuizOut,
        state: LetterState,
    },
    AnswerResult {
        result: AnswerOut,
        state: LetterState,
    },
    TutorReply {
        reply: ChatOut,
    },
    Audio {
        clip: AudioClip,
    },
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<serde_json::Value>,
    },
}

/// Authoritative gating snapshot attached to policy violations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatingState {
    pub unlocked_letter_ids: Vec<LetterId>,
}

//
// Lessons + progress
//

#[derive(Debug, Serialize)]
pub struct AlphabetOut {
    pub letters: Vec<LetterEntry>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonOut {
    pub letter: LetterEntry,
    pub state: LetterState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressRecord>,
}

#[derive(Debug, Serialize)]
pub struct ProgressOut {
    pub records: Vec<ProgressRecord>,
    pub unlocked_letter_ids: Vec<LetterId>,
    pub completed: usize,
    pub total: usize,
    pub total_xp: u32,
}

#[derive(Debug, Deserialize)]
pub struct LessonResultIn {
    pub letter_id: u32,
    pub score: i64,
}

//
// Quiz
//

#[derive(Debug, Deserialize)]
pub struct QuizQuery {
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizOptionOut {
    pub id: LetterId,
    pub arabic: String,
}

/// The target is named, never shown; the learner picks its grapheme from `options`.
#[derive(Debug, Clone, Serialize)]
pub struct QuizOut {
    pub letter_id: LetterId,
    pub name: String,
    pub transliteration: String,
    pub pronunciation: String,
    pub options: Vec<QuizOptionOut>,
}

impl From<&Quiz> for QuizOut {
    fn from(q: &Quiz) -> Self {
        Self {
            letter_id: q.target.id,
            name: q.target.name.clone(),
            transliteration: q.target.transliteration.clone(),
            pronunciation: q.target.pronunciation.clone(),
            options: q
                .options
                .iter()
                .map(|o| QuizOptionOut { id: o.id, arabic: o.arabic.clone() })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub letter_id: u32,
    pub selected_letter_id: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOut {
    pub correct: bool,
    pub score: u8,
    pub xp_earned: u32,
    pub can_proceed: bool,
    pub min_score_required: u8,
    pub message: String,
    pub attempts: u32,
    pub unlocked_letter_ids: Vec<LetterId>,
}

#[derive(Debug, Serialize)]
pub struct AttemptsOut {
    pub attempts: Vec<QuizAttempt>,
}

#[derive(Debug, Serialize)]
pub struct ReviewOut {
    pub items: Vec<ReviewQueueItem>,
}

//
// Tutor + audio
//

#[derive(Debug, Deserialize)]
pub struct ChatIn {
    pub message: String,
    #[serde(default)]
    pub letter_id: Option<u32>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOut {
    pub response: String,
    pub session_id: String,
    pub delivered: bool,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryOut {
    pub exchanges: Vec<ChatExchange>,
}

#[derive(Debug, Deserialize)]
pub struct TtsIn {
    pub text: String,
    #[serde(default)]
    pub voice_id: Option<String>,
}

//
// Auth
//

#[derive(Debug, Deserialize)]
pub struct SessionIn {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshIn {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthOut {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub refresh_in_secs: i64,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct OkOut {
    pub ok: bool,
}

//
// Quran proxy
//

#[derive(Debug, Deserialize)]
pub struct VersesQuery {
    pub translation: Option<u32>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RecitationQuery {
    pub reciter_id: Option<u32>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub letters: usize,
    pub tutor_enabled: bool,
    pub tts_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}
