//! Quiz engine: multiple-choice question building and answer scoring.
//!
//! Both halves are pure. Randomness is injected so callers (and tests) control the
//! option set; persistence of the outcome is the progress store's job.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::config::PolicyConfig;
use crate::domain::{LetterEntry, LetterId, QuizAttempt};

pub const OPTION_COUNT: usize = 4;

#[derive(Clone, Debug, Serialize)]
pub struct Quiz {
  pub target: LetterEntry,
  pub options: Vec<LetterEntry>,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum QuizError {
  #[error("letter {0} is not in the catalog")]
  UnknownLetter(LetterId),
  #[error("catalog has {0} letters, a quiz needs at least four")]
  CatalogTooSmall(usize),
}

/// Target plus three distinct decoys drawn uniformly from the rest of the catalog, shuffled.
pub fn build_quiz<R: Rng + ?Sized>(target_id: LetterId, catalog: &Catalog, rng: &mut R) -> Result<Quiz, QuizError> {
  let target = catalog.get(target_id).ok_or(QuizError::UnknownLetter(target_id))?.clone();
  let pool = catalog.decoys_for(target_id);
  if pool.len() < OPTION_COUNT - 1 {
    return Err(QuizError::CatalogTooSmall(catalog.len()));
  }

  let mut options: Vec<LetterEntry> = pool
    .choose_multiple(rng, OPTION_COUNT - 1)
    .map(|l| (*l).clone())
    .collect();
  options.push(target.clone());
  options.shuffle(rng);

  Ok(Quiz { target, options })
}

/// Highest score a correct answer can earn after `prior_attempts` earlier submissions.
pub fn score_ceiling(prior_attempts: u32, policy: &PolicyConfig) -> u8 {
  let penalty = prior_attempts.saturating_mul(policy.retry_penalty_step as u32);
  let ceiling = 100u32.saturating_sub(penalty);
  ceiling.max(policy.min_correct_score as u32).min(100) as u8
}

/// Score one submission. XP is credited only on a pass for a letter that was not
/// already completed, so repeat passes never re-award it.
pub fn submit_answer(
  target_id: LetterId,
  selected_id: LetterId,
  prior_attempts: u32,
  already_completed: bool,
  policy: &PolicyConfig,
) -> QuizAttempt {
  let correct = target_id == selected_id;
  let score = if correct { score_ceiling(prior_attempts, policy) } else { 0 };
  let can_proceed = score >= policy.min_score_required;
  let xp_earned = if can_proceed && !already_completed { policy.xp_per_letter } else { 0 };

  QuizAttempt {
    letter_id: target_id,
    selected_letter_id: selected_id,
    correct,
    score,
    xp_earned,
    can_proceed,
    min_score_required: policy.min_score_required,
    at: None,
  }
}

/// Score a lesson result reported by the client (e.g. a practice drill) rather than a quiz pick.
/// The reported score is taken as-is; pass/XP rules match `submit_answer`.
pub fn lesson_result(letter_id: LetterId, score: u8, already_completed: bool, policy: &PolicyConfig) -> QuizAttempt {
  let score = score.min(100);
  let can_proceed = score >= policy.min_score_required;
  QuizAttempt {
    letter_id,
    selected_letter_id: letter_id,
    correct: can_proceed,
    score,
    xp_earned: if can_proceed && !already_completed { policy.xp_per_letter } else { 0 },
    can_proceed,
    min_score_required: policy.min_score_required,
    at: None,
  }
}

/// Short learner-facing message for an attempt.
pub fn outcome_message(attempt: &QuizAttempt) -> String {
  match (attempt.correct, attempt.can_proceed) {
    (true, true) if attempt.xp_earned > 0 => format!("Correct! +{} XP. The next letter is unlocked.", attempt.xp_earned),
    (true, true) => "Correct! You have already mastered this letter.".to_string(),
    (true, false) => format!(
      "Correct, but {}% is below the {}% needed. Try again or review the lesson.",
      attempt.score, attempt.min_score_required
    ),
    (false, _) => "Not quite. Retry the quiz or review the lesson first.".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use std::collections::HashSet;

  #[test]
  fn quiz_has_four_distinct_options_with_one_target() {
    let cat = Catalog::arabic();
    let mut rng = StdRng::seed_from_u64(7);
    for target in 1..=28 {
      let q = build_quiz(target, &cat, &mut rng).expect("quiz");
      assert_eq!(q.options.len(), OPTION_COUNT);
      let ids: HashSet<_> = q.options.iter().map(|o| o.id).collect();
      assert_eq!(ids.len(), OPTION_COUNT);
      assert_eq!(q.options.iter().filter(|o| o.id == target).count(), 1);
      assert_eq!(q.target.id, target);
    }
  }

  #[test]
  fn same_seed_gives_same_options() {
    let cat = Catalog::arabic();
    let a = build_quiz(3, &cat, &mut StdRng::seed_from_u64(42)).expect("quiz");
    let b = build_quiz(3, &cat, &mut StdRng::seed_from_u64(42)).expect("quiz");
    let ids = |q: &Quiz| q.options.iter().map(|o| o.id).collect::<Vec<_>>();
    assert_eq!(ids(&a), ids(&b));
  }

  #[test]
  fn unknown_target_is_an_error() {
    let cat = Catalog::arabic();
    let err = build_quiz(40, &cat, &mut StdRng::seed_from_u64(1)).unwrap_err();
    assert_eq!(err, QuizError::UnknownLetter(40));
  }

  #[test]
  fn correct_first_try_scores_full_marks_with_xp() {
    let policy = PolicyConfig::default();
    let a = submit_answer(1, 1, 0, false, &policy);
    assert!(a.correct);
    assert_eq!(a.score, 100);
    assert!(a.can_proceed);
    assert!(a.xp_earned > 0);
    assert_eq!(a.min_score_required, 80);
  }

  #[test]
  fn incorrect_answer_scores_zero() {
    let policy = PolicyConfig::default();
    for prior in [0, 1, 5] {
      let a = submit_answer(1, 2, prior, false, &policy);
      assert!(!a.correct);
      assert_eq!(a.score, 0);
      assert!(!a.can_proceed);
      assert_eq!(a.xp_earned, 0);
    }
  }

  #[test]
  fn retries_lower_the_ceiling_down_to_the_floor() {
    let policy = PolicyConfig::default();
    assert_eq!(score_ceiling(0, &policy), 100);
    assert_eq!(score_ceiling(1, &policy), 90);
    assert_eq!(score_ceiling(2, &policy), 80);
    assert_eq!(score_ceiling(9, &policy), 80);
    assert_eq!(score_ceiling(u32::MAX, &policy), 80);
  }

  #[test]
  fn floor_below_threshold_can_block_progress() {
    let policy = PolicyConfig { min_correct_score: 60, ..PolicyConfig::default() };
    let a = submit_answer(4, 4, 3, false, &policy);
    assert_eq!(a.score, 70);
    assert!(a.correct);
    assert!(!a.can_proceed);
    assert_eq!(a.xp_earned, 0);
  }

  #[test]
  fn completed_letter_never_re_awards_xp() {
    let policy = PolicyConfig::default();
    let a = submit_answer(2, 2, 1, true, &policy);
    assert!(a.can_proceed);
    assert_eq!(a.xp_earned, 0);
  }

  #[test]
  fn lesson_result_uses_reported_score() {
    let policy = PolicyConfig::default();
    let pass = lesson_result(3, 85, false, &policy);
    assert!(pass.can_proceed);
    assert_eq!(pass.xp_earned, 50);
    let fail = lesson_result(3, 60, false, &policy);
    assert!(!fail.can_proceed);
    assert_eq!(fail.xp_earned, 0);
    assert_eq!(lesson_result(3, 250, true, &policy).score, 100);
  }
}
