//! Review queue: previously mastered letters worth practicing again.
//!
//! Recomputed from the progress set on every request. Nothing is cached, so the
//! queue always reflects the current records.

use chrono::{DateTime, Duration, Utc};

use crate::config::PolicyConfig;
use crate::domain::{ProgressRecord, ProgressSet, ReviewQueueItem, ReviewReason};

/// Why a record qualifies, if it does. A low score takes precedence over staleness.
pub fn review_reason(record: &ProgressRecord, now: DateTime<Utc>, policy: &PolicyConfig) -> Option<ReviewReason> {
  if !record.completed {
    return None;
  }
  if record.score < policy.comfortable_mastery {
    return Some(ReviewReason::LowScore);
  }
  let window = Duration::days(policy.staleness_days);
  if now.signed_duration_since(record.last_updated) > window {
    return Some(ReviewReason::Stale);
  }
  None
}

/// Low-score items first, then stale-only items; within each group lowest score,
/// then oldest `last_updated`, then letter id.
pub fn compute_review_queue(progress: &ProgressSet, now: DateTime<Utc>, policy: &PolicyConfig) -> Vec<ReviewQueueItem> {
  let mut candidates: Vec<(ReviewReason, &ProgressRecord)> = progress
    .values()
    .filter_map(|r| review_reason(r, now, policy).map(|reason| (reason, r)))
    .collect();

  candidates.sort_by(|(ra, a), (rb, b)| {
    ra.cmp(rb)
      .then(a.score.cmp(&b.score))
      .then(a.last_updated.cmp(&b.last_updated))
      .then(a.letter_id.cmp(&b.letter_id))
  });

  candidates
    .into_iter()
    .enumerate()
    .map(|(idx, (reason, r))| ReviewQueueItem {
      letter_id: r.letter_id,
      reason,
      priority: idx as u32 + 1,
      score: r.score,
      last_updated: r.last_updated,
    })
    .collect()
}
