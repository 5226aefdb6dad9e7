//! Gating policy: which letters a learner may open, and the per-letter lesson lifecycle.
//!
//! Pure functions over a user's `ProgressSet`; a missing record simply means "not completed".

use crate::domain::{LetterId, LetterState, ProgressSet};

/// Letter 1 is always open; letter n opens once every letter before it has a completed record.
/// Ids outside `1..=catalog_len` are never unlocked.
pub fn is_unlocked(letter_id: LetterId, progress: &ProgressSet, catalog_len: usize) -> bool {
  if letter_id == 0 || letter_id as usize > catalog_len {
    return false;
  }
  if letter_id == 1 {
    return true;
  }
  (1..letter_id).all(|prev| progress.get(&prev).map(|r| r.completed).unwrap_or(false))
}

/// All unlocked ids in catalog order.
pub fn unlocked_ids(progress: &ProgressSet, catalog_len: usize) -> Vec<LetterId> {
  (1..=catalog_len)
    .filter_map(|n| LetterId::try_from(n).ok())
    .filter(|id| is_unlocked(*id, progress, catalog_len))
    .collect()
}

/// State the server can see from the store alone. `InProgress` and `QuizPending`
/// only exist inside a client session and are never derived here.
pub fn derive_state(letter_id: LetterId, progress: &ProgressSet, catalog_len: usize) -> LetterState {
  if !is_unlocked(letter_id, progress, catalog_len) {
    return LetterState::Locked;
  }
  match progress.get(&letter_id) {
    Some(r) if r.completed => LetterState::Passed,
    Some(_) => LetterState::Failed,
    None => LetterState::Available,
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LessonEvent {
  /// Lesson content opened (also the "review" path after a failure).
  ViewLesson,
  /// Quiz requested (also the "retry" path after a failure).
  StartQuiz,
  QuizPassed,
  QuizFailed,
}

/// Advance the lesson lifecycle. `None` means the event is not valid in `state`.
///
/// `Locked -> Available` is not an event: it happens when the previous letter passes,
/// and callers observe it by re-deriving with [`derive_state`].
pub fn transition(state: LetterState, event: LessonEvent) -> Option<LetterState> {
  use LessonEvent::*;
  use LetterState::*;

  match (state, event) {
    (Locked, _) => None,
    (Passed, _) => Some(Passed),
    (Available | InProgress | Failed, ViewLesson) => Some(InProgress),
    (QuizPending, ViewLesson) => Some(InProgress),
    (InProgress | Failed, StartQuiz) => Some(QuizPending),
    (QuizPending, StartQuiz) => Some(QuizPending),
    (QuizPending, QuizPassed) => Some(Passed),
    (QuizPending, QuizFailed) => Some(Failed),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ProgressRecord;
  use chrono::Utc;

  fn rec(letter_id: LetterId, completed: bool) -> ProgressRecord {
    ProgressRecord {
      user_id: "u1".into(),
      letter_id,
      completed,
      score: if completed { 100 } else { 0 },
      attempts: 1,
      xp_earned: 0,
      last_updated: Utc::now(),
    }
  }

  fn set(records: &[(LetterId, bool)]) -> ProgressSet {
    records.iter().map(|(id, c)| (*id, rec(*id, *c))).collect()
  }

  #[test]
  fn first_letter_is_always_unlocked() {
    assert!(is_unlocked(1, &ProgressSet::new(), 28));
    assert!(!is_unlocked(2, &ProgressSet::new(), 28));
  }

  #[test]
  fn out_of_range_ids_are_locked() {
    let all: Vec<(LetterId, bool)> = (1..=28).map(|i| (i, true)).collect();
    let p = set(&all);
    assert!(!is_unlocked(0, &p, 28));
    assert!(!is_unlocked(29, &p, 28));
  }

  #[test]
  fn incomplete_predecessor_blocks_even_with_earlier_completions() {
    let p = set(&[(1, true), (2, true), (3, true), (4, true), (5, false)]);
    assert!(is_unlocked(5, &p, 28));
    assert!(!is_unlocked(6, &p, 28));
    assert_eq!(unlocked_ids(&p, 28), vec![1, 2, 3, 4, 5]);
  }

  #[test]
  fn a_gap_in_the_chain_locks_everything_after_it() {
    // 3 has a completed record but 2 was never attempted.
    let p = set(&[(1, true), (3, true)]);
    assert!(is_unlocked(2, &p, 28));
    assert!(!is_unlocked(3, &p, 28));
    assert!(!is_unlocked(4, &p, 28));
    assert_eq!(unlocked_ids(&p, 28), vec![1, 2]);
  }

  #[test]
  fn derived_states() {
    let p = set(&[(1, true), (2, false)]);
    assert_eq!(derive_state(1, &p, 28), LetterState::Passed);
    assert_eq!(derive_state(2, &p, 28), LetterState::Failed);
    assert_eq!(derive_state(3, &p, 28), LetterState::Locked);
    assert_eq!(derive_state(1, &ProgressSet::new(), 28), LetterState::Available);
  }

  #[test]
  fn lifecycle_happy_path_and_retry() {
    let s = LetterState::Available;
    let s = transition(s, LessonEvent::ViewLesson).expect("view");
    assert_eq!(s, LetterState::InProgress);
    let s = transition(s, LessonEvent::StartQuiz).expect("quiz");
    assert_eq!(s, LetterState::QuizPending);
    let s = transition(s, LessonEvent::QuizFailed).expect("fail");
    assert_eq!(s, LetterState::Failed);
    let s = transition(s, LessonEvent::StartQuiz).expect("retry");
    assert_eq!(s, LetterState::QuizPending);
    let s = transition(s, LessonEvent::QuizPassed).expect("pass");
    assert_eq!(s, LetterState::Passed);
    assert_eq!(transition(s, LessonEvent::QuizFailed), Some(LetterState::Passed));
  }

  #[test]
  fn invalid_transitions_are_rejected() {
    assert_eq!(transition(LetterState::Locked, LessonEvent::ViewLesson), None);
    assert_eq!(transition(LetterState::Available, LessonEvent::StartQuiz), None);
    assert_eq!(transition(LetterState::InProgress, LessonEvent::QuizPassed), None);
  }
}
