//! Domain models: catalog entries, progress records, derived quiz/review values, chat log, users.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type LetterId = u8;
pub type UserId = String;

/// One user's progress records, keyed by letter.
pub type ProgressSet = BTreeMap<LetterId, ProgressRecord>;

/// One alphabet unit. Immutable once the catalog is seeded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LetterEntry {
  pub id: LetterId,
  pub arabic: String,
  pub name: String,
  pub transliteration: String,
  pub pronunciation: String,
  pub example_word: String,
  pub example_meaning: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub islamic_context: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub quranic_examples: Vec<String>,
}

/// Per (user, letter) completion record. Unique per pair; never deleted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressRecord {
  pub user_id: UserId,
  pub letter_id: LetterId,
  pub completed: bool,
  /// Most recent submission, not the best one.
  pub score: u8,
  pub attempts: u32,
  pub xp_earned: u32,
  pub last_updated: DateTime<Utc>,
}

/// Outcome of scoring one quiz submission. Pure value; the store applies it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct QuizAttempt {
  pub letter_id: LetterId,
  pub selected_letter_id: LetterId,
  pub correct: bool,
  pub score: u8,
  pub xp_earned: u32,
  pub can_proceed: bool,
  pub min_score_required: u8,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
  LowScore,
  Stale,
}

/// Derived on every read from the progress set; has no identity of its own.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ReviewQueueItem {
  pub letter_id: LetterId,
  pub reason: ReviewReason,
  pub priority: u32,
  pub score: u8,
  pub last_updated: DateTime<Utc>,
}

/// Client-observed lifecycle of one letter.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LetterState {
  Locked,
  Available,
  InProgress,
  QuizPending,
  Passed,
  Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatExchange {
  pub user_id: UserId,
  pub session_id: String,
  #[serde(default)]
  pub lesson_letter_id: Option<LetterId>,
  #[serde(default)]
  pub context: Option<String>,
  pub user_message: String,
  pub assistant_reply: String,
  pub created_at: DateTime<Utc>,
}

/// Local user record, created the first time the identity provider vouches for someone.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
  pub id: UserId,
  pub email: String,
  pub name: String,
  #[serde(default)]
  pub picture: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Where the audio for a `get_audio` call came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AudioSource {
  #[serde(rename = "cache")]
  Cache,
  #[serde(rename = "provider")]
  Provider,
  #[serde(rename = "browser-fallback")]
  BrowserFallback,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AudioClip {
  pub source: AudioSource,
  pub audio_ref: String,
  pub text: String,
  pub voice_id: String,
}
