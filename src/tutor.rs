//! Tutor session: prompt assembly over lesson context, progress rollup and recent history.
//!
//! Building the prompt is pure and unit-tested. `ask` is the only I/O; on any provider
//! failure it returns the configured apology with `delivered = false`, and the caller
//! must not record the exchange.

use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::catalog::Catalog;
use crate::config::{PolicyConfig, Prompts, TutorConfig};
use crate::domain::{ChatExchange, LetterEntry, LetterId, ProgressSet};
use crate::error::ProviderError;
use crate::openai::{ChatMessage, OpenAI};
use crate::util::fill_template;

/// Rollup of one learner's progress, as the tutor sees it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ProgressSummary {
  pub completed: usize,
  pub total: usize,
  /// Mean of the latest scores across every letter with a record, rounded.
  pub average_score: u8,
  /// Completed letters still below the comfortable-mastery bar, in catalog order.
  pub struggles: Vec<LetterId>,
}

pub fn summarize(progress: &ProgressSet, catalog_len: usize, policy: &PolicyConfig) -> ProgressSummary {
  let completed = progress.values().filter(|r| r.completed).count();
  let average_score = if progress.is_empty() {
    0
  } else {
    let sum: u32 = progress.values().map(|r| r.score as u32).sum();
    ((sum as f64) / (progress.len() as f64)).round() as u8
  };
  let struggles = progress
    .values()
    .filter(|r| r.completed && r.score < policy.comfortable_mastery)
    .map(|r| r.letter_id)
    .collect();

  ProgressSummary { completed, total: catalog_len, average_score, struggles }
}

pub fn lesson_context(prompts: &Prompts, letter: &LetterEntry) -> String {
  fill_template(&prompts.lesson_context_template, &[
    ("arabic", letter.arabic.as_str()),
    ("name", letter.name.as_str()),
    ("transliteration", letter.transliteration.as_str()),
    ("pronunciation", letter.pronunciation.as_str()),
    ("example_word", letter.example_word.as_str()),
    ("example_meaning", letter.example_meaning.as_str()),
  ])
}

/// Persona, then the current letter (if any), then the progress rollup.
pub fn build_system_instruction(
  prompts: &Prompts,
  catalog: &Catalog,
  letter: Option<&LetterEntry>,
  summary: &ProgressSummary,
) -> String {
  let mut parts = vec![prompts.tutor_system.trim().to_string()];
  if let Some(l) = letter {
    parts.push(lesson_context(prompts, l));
    if let Some(ctx) = &l.islamic_context {
      parts.push(format!("Islamic context: {ctx}"));
    }
  }

  let struggles = if summary.struggles.is_empty() {
    "none".to_string()
  } else {
    summary
      .struggles
      .iter()
      .filter_map(|id| catalog.get(*id))
      .map(|l| format!("{} ({})", l.arabic, l.name))
      .collect::<Vec<_>>()
      .join(", ")
  };
  let (completed, total, average) =
    (summary.completed.to_string(), summary.total.to_string(), summary.average_score.to_string());
  parts.push(fill_template(&prompts.progress_template, &[
    ("completed", completed.as_str()),
    ("total", total.as_str()),
    ("average", average.as_str()),
    ("struggles", struggles.as_str()),
  ]));
  parts.join("\n\n")
}

/// System instruction, then up to `limit` most recent exchanges as alternating turns, then the new message.
pub fn build_messages(system: String, history: &[ChatExchange], limit: usize, user_message: &str) -> Vec<ChatMessage> {
  let start = history.len().saturating_sub(limit);
  let mut messages = Vec::with_capacity(2 + 2 * (history.len() - start));
  messages.push(ChatMessage::system(system));
  for ex in &history[start..] {
    messages.push(ChatMessage::user(ex.user_message.clone()));
    messages.push(ChatMessage::assistant(ex.assistant_reply.clone()));
  }
  messages.push(ChatMessage::user(user_message));
  messages
}

/// Follow-up prompts derived locally; never sent to the provider.
pub fn suggestions(catalog: &Catalog, letter: Option<&LetterEntry>, summary: &ProgressSummary) -> Vec<String> {
  let mut out = Vec::new();
  if let Some(l) = letter {
    out.push(format!("How do I pronounce {} ({}) correctly?", l.arabic, l.name));
    out.push(format!("Show me more words that use {}.", l.arabic));
    if !l.quranic_examples.is_empty() {
      out.push(format!("Where does {} appear in the Quran?", l.example_word));
    }
  }
  for id in summary.struggles.iter().take(2) {
    if let Some(s) = catalog.get(*id) {
      out.push(format!("Help me practice {} ({}).", s.arabic, s.name));
    }
  }
  if out.is_empty() {
    out.push("Where should I start with the Arabic alphabet?".to_string());
  }
  out
}

#[derive(Clone, Debug, Serialize)]
pub struct TutorReply {
  pub reply: String,
  /// False when the apology was returned instead of a provider answer.
  pub delivered: bool,
  pub suggestions: Vec<String>,
}

/// One tutor turn. No retries; a failure yields the apology.
#[instrument(level = "info", skip_all, fields(messages = messages.len()))]
pub async fn ask(
  provider: Option<&OpenAI>,
  messages: &[ChatMessage],
  prompts: &Prompts,
  cfg: &TutorConfig,
  suggestions: Vec<String>,
) -> TutorReply {
  let result = match provider {
    Some(oa) => oa.chat(messages, cfg.temperature).await,
    None => Err(ProviderError::NotConfigured("OPENAI_API_KEY")),
  };
  match result {
    Ok(reply) => {
      debug!(target: "tutor", reply_len = reply.len(), "Tutor replied");
      TutorReply { reply, delivered: true, suggestions }
    }
    Err(e) => {
      error!(target: "tutor", error = %e, "Tutor provider failed; returning apology");
      TutorReply { reply: prompts.apology.clone(), delivered: false, suggestions }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ProgressRecord;
  use crate::openai::Role;
  use chrono::Utc;

  fn progress(entries: &[(LetterId, bool, u8)]) -> ProgressSet {
    entries
      .iter()
      .map(|&(id, completed, score)| {
        (id, ProgressRecord {
          user_id: "u1".into(),
          letter_id: id,
          completed,
          score,
          attempts: 1,
          xp_earned: 0,
          last_updated: Utc::now(),
        })
      })
      .collect()
  }

  fn exchange(i: usize) -> ChatExchange {
    ChatExchange {
      user_id: "u1".into(),
      session_id: "s".into(),
      lesson_letter_id: None,
      context: None,
      user_message: format!("q{i}"),
      assistant_reply: format!("a{i}"),
      created_at: Utc::now(),
    }
  }

  #[test]
  fn rollup_counts_average_and_struggles() {
    let p = progress(&[(1, true, 100), (2, true, 80), (3, false, 0)]);
    let s = summarize(&p, 28, &PolicyConfig::default());
    assert_eq!(s.completed, 2);
    assert_eq!(s.total, 28);
    assert_eq!(s.average_score, 60);
    assert_eq!(s.struggles, vec![2]);
  }

  #[test]
  fn empty_progress_rolls_up_to_zero() {
    let s = summarize(&ProgressSet::new(), 28, &PolicyConfig::default());
    assert_eq!((s.completed, s.average_score), (0, 0));
    assert!(s.struggles.is_empty());
  }

  #[test]
  fn system_instruction_includes_letter_and_rollup() {
    let cat = Catalog::arabic();
    let prompts = Prompts::default();
    let p = progress(&[(1, true, 85)]);
    let s = summarize(&p, cat.len(), &PolicyConfig::default());
    let sys = build_system_instruction(&prompts, &cat, cat.get(2), &s);
    assert!(sys.starts_with(prompts.tutor_system.trim()));
    assert!(sys.contains("ب"));
    assert!(sys.contains("1 of 28"));
    assert!(sys.contains("ا (Alif)"));
  }

  #[test]
  fn history_is_bounded_and_chronological() {
    let history: Vec<_> = (0..25).map(exchange).collect();
    let msgs = build_messages("sys".into(), &history, 20, "new question");
    assert_eq!(msgs.len(), 1 + 40 + 1);
    assert_eq!(msgs[0].role, Role::System);
    assert_eq!(msgs[1].content, "q5");
    assert_eq!(msgs[2].role, Role::Assistant);
    assert_eq!(msgs[40].content, "a24");
    assert_eq!(msgs[41].content, "new question");
  }

  #[test]
  fn suggestions_fall_back_without_context() {
    let cat = Catalog::arabic();
    let s = summarize(&ProgressSet::new(), cat.len(), &PolicyConfig::default());
    assert_eq!(suggestions(&cat, None, &s).len(), 1);
    assert!(suggestions(&cat, cat.get(1), &s).len() >= 2);
  }

  #[tokio::test]
  async fn missing_provider_returns_apology() {
    let prompts = Prompts::default();
    let out = ask(None, &[ChatMessage::user("hi")], &prompts, &TutorConfig::default(), vec![]).await;
    assert!(!out.delivered);
    assert_eq!(out.reply, prompts.apology);
  }
}
