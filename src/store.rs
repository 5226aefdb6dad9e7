//! In-memory stores: progress records (+ quiz audit log), open quizzes, chat exchanges, users.
//!
//! Writes follow last-write-wins across requests. A single submission's
//! read-modify-write runs under one write lock, so `attempts` never loses an increment.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::{ChatExchange, LetterId, ProgressRecord, ProgressSet, QuizAttempt, User, UserId};

#[derive(Default)]
pub struct ProgressStore {
  records: RwLock<HashMap<UserId, ProgressSet>>,
  audit: RwLock<HashMap<UserId, Vec<QuizAttempt>>>,
}

impl ProgressStore {
  /// Snapshot of one user's records.
  pub async fn progress_for(&self, user_id: &str) -> ProgressSet {
    self.records.read().await.get(user_id).cloned().unwrap_or_default()
  }

  pub async fn get(&self, user_id: &str, letter_id: LetterId) -> Option<ProgressRecord> {
    self.records.read().await.get(user_id).and_then(|p| p.get(&letter_id)).cloned()
  }

  /// Score a submission against the current record and persist the result atomically.
  ///
  /// `score` receives `(prior_attempts, already_completed)` and returns the attempt to apply.
  /// `completed` is sticky: a later failure never re-locks the next letter.
  #[instrument(level = "debug", skip(self, now, score))]
  pub async fn record_submission<F>(
    &self,
    user_id: &str,
    letter_id: LetterId,
    now: DateTime<Utc>,
    score: F,
  ) -> (QuizAttempt, ProgressRecord)
  where
    F: FnOnce(u32, bool) -> QuizAttempt,
  {
    let (attempt, record) = {
      let mut records = self.records.write().await;
      let set = records.entry(user_id.to_string()).or_default();
      let (prior_attempts, already_completed) = set
        .get(&letter_id)
        .map(|r| (r.attempts, r.completed))
        .unwrap_or((0, false));

      let mut attempt = score(prior_attempts, already_completed);
      attempt.at = Some(now);

      let record = set.entry(letter_id).or_insert_with(|| ProgressRecord {
        user_id: user_id.to_string(),
        letter_id,
        completed: false,
        score: 0,
        attempts: 0,
        xp_earned: 0,
        last_updated: now,
      });
      record.attempts = record.attempts.saturating_add(1);
      record.score = attempt.score;
      record.completed = record.completed || attempt.can_proceed;
      record.xp_earned = record.xp_earned.saturating_add(attempt.xp_earned);
      record.last_updated = now;
      (attempt, record.clone())
    };

    self.audit
      .write()
      .await
      .entry(user_id.to_string())
      .or_default()
      .push(attempt.clone());

    debug!(target: "quiz", %user_id, letter_id, attempts = record.attempts, completed = record.completed, "Progress updated");
    (attempt, record)
  }

  /// Every scored submission for a user, oldest first.
  pub async fn attempt_log(&self, user_id: &str) -> Vec<QuizAttempt> {
    self.audit.read().await.get(user_id).cloned().unwrap_or_default()
  }

  pub async fn total_xp(&self, user_id: &str) -> u32 {
    self.records
      .read()
      .await
      .get(user_id)
      .map(|p| p.values().map(|r| r.xp_earned).sum())
      .unwrap_or(0)
  }
}

/// Append-only tutor conversation log.
#[derive(Default)]
pub struct ChatLog {
  by_user: RwLock<HashMap<UserId, Vec<ChatExchange>>>,
}

impl ChatLog {
  pub async fn append(&self, exchange: ChatExchange) {
    self.by_user
      .write()
      .await
      .entry(exchange.user_id.clone())
      .or_default()
      .push(exchange);
  }

  /// The `limit` most recent exchanges, oldest first.
  pub async fn recent(&self, user_id: &str, limit: usize) -> Vec<ChatExchange> {
    let by_user = self.by_user.read().await;
    match by_user.get(user_id) {
      Some(all) => {
        let start = all.len().saturating_sub(limit);
        all[start..].to_vec()
      }
      None => Vec::new(),
    }
  }

  #[cfg(test)]
  pub(crate) async fn len_for(&self, user_id: &str) -> usize {
    self.by_user.read().await.get(user_id).map(Vec::len).unwrap_or(0)
  }
}

#[derive(Default)]
pub struct UserStore {
  by_id: RwLock<HashMap<UserId, User>>,
}

impl UserStore {
  /// Insert the user on first sight; later sightings refresh name/picture but keep `created_at`.
  #[instrument(level = "debug", skip(self, user), fields(user_id = %user.id))]
  pub async fn upsert(&self, user: User) -> User {
    let mut by_id = self.by_id.write().await;
    match by_id.get_mut(&user.id) {
      Some(existing) => {
        existing.name = user.name;
        existing.email = user.email;
        existing.picture = user.picture;
        existing.clone()
      }
      None => {
        info!(target: "auth", user_id = %user.id, "Created local user record");
        by_id.insert(user.id.clone(), user.clone());
        user
      }
    }
  }

  pub async fn get(&self, user_id: &str) -> Option<User> {
    self.by_id.read().await.get(user_id).cloned()
  }
}

/// Quizzes handed out but not yet answered, keyed by (user, target letter).
/// A submission consumes the entry; answering again needs a fresh quiz.
#[derive(Default)]
pub struct PendingQuizzes {
  open: RwLock<HashMap<(UserId, LetterId), Vec<LetterId>>>,
}

impl PendingQuizzes {
  pub async fn open(&self, user_id: &str, letter_id: LetterId, option_ids: Vec<LetterId>) {
    self.open.write().await.insert((user_id.to_string(), letter_id), option_ids);
  }

  pub async fn take(&self, user_id: &str, letter_id: LetterId) -> Option<Vec<LetterId>> {
    self.open.write().await.remove(&(user_id.to_string(), letter_id))
  }
}
