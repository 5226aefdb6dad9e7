//! Loading application configuration (prompts + policy knobs + provider settings) from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! Secrets never live here, they come from the environment (see `main.rs`).

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub policy: PolicyConfig,
  #[serde(default)]
  pub tutor: TutorConfig,
  #[serde(default)]
  pub tts: TtsConfig,
  #[serde(default)]
  pub session: SessionConfig,
  #[serde(default)]
  pub quran: QuranConfig,
}

/// Upper bounds for the duration knobs; chrono panics on spans far past these.
const MAX_STALENESS_DAYS: i64 = 3650;
const MAX_ACCESS_TTL_MINUTES: i64 = 7 * 24 * 60;
const MAX_REFRESH_TTL_DAYS: i64 = 365;

fn bounded(name: &str, value: i64, min: i64, max: i64, default: i64) -> i64 {
  if (min..=max).contains(&value) {
    value
  } else {
    warn!(target: "alif_backend", key = name, value, min, max, default, "Config value out of range; using default");
    default
  }
}

impl AppConfig {
  /// Replace out-of-range duration settings with their defaults.
  pub fn sanitized(mut self) -> Self {
    let policy = PolicyConfig::default();
    let session = SessionConfig::default();
    self.policy.staleness_days = bounded("policy.staleness_days", self.policy.staleness_days, 0, MAX_STALENESS_DAYS, policy.staleness_days);
    self.session.access_ttl_minutes =
      bounded("session.access_ttl_minutes", self.session.access_ttl_minutes, 1, MAX_ACCESS_TTL_MINUTES, session.access_ttl_minutes);
    self.session.refresh_ttl_days =
      bounded("session.refresh_ttl_days", self.session.refresh_ttl_days, 1, MAX_REFRESH_TTL_DAYS, session.refresh_ttl_days);
    let max_lead = self.session.access_ttl_minutes * 60;
    self.session.refresh_lead_seconds =
      bounded("session.refresh_lead_seconds", self.session.refresh_lead_seconds, 0, max_lead, session.refresh_lead_seconds.min(max_lead));
    self
  }
}

/// Prompts used by the tutor. Override in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub tutor_system: String,
  pub lesson_context_template: String,
  pub progress_template: String,
  pub apology: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      tutor_system: "You are an expert Arabic language tutor helping English-speaking Muslims learn Arabic. \
You specialize in the Arabic alphabet and pronunciation, basic grammar for Quranic understanding, \
and the Islamic context of Arabic words and phrases. Always give clear, simple explanations. \
When discussing Arabic letters or words include both Arabic text and transliteration. \
Be encouraging and patient. Keep responses concise but helpful.".into(),
      lesson_context_template: "Current lesson: letter {arabic} ({name}), transliteration '{transliteration}', \
pronounced '{pronunciation}'. Example: {example_word} ({example_meaning}).".into(),
      progress_template: "Learner progress: {completed} of {total} letters completed, average score {average}%. \
Struggling with: {struggles}.".into(),
      apology: "Sorry, the tutor is unavailable right now. Please try again in a moment.".into(),
    }
  }
}

/// Thresholds and rewards for gating, quiz scoring and review selection.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
  /// Pass threshold; a score at or above it unlocks the next letter.
  pub min_score_required: u8,
  /// Ceiling reduction per prior attempt on the same letter.
  pub retry_penalty_step: u8,
  /// Lowest score a correct answer can receive after penalties.
  pub min_correct_score: u8,
  pub xp_per_letter: u32,
  /// Review-only bar; never affects progression.
  pub comfortable_mastery: u8,
  pub staleness_days: i64,
}

impl Default for PolicyConfig {
  fn default() -> Self {
    Self {
      min_score_required: 80,
      retry_penalty_step: 10,
      min_correct_score: 80,
      xp_per_letter: 50,
      comfortable_mastery: 90,
      staleness_days: 7,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
  pub history_limit: usize,
  pub temperature: f32,
}

impl Default for TutorConfig {
  fn default() -> Self {
    Self { history_limit: 20, temperature: 0.4 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
  pub voice_id: String,
  pub model_id: String,
  pub stability: f32,
  pub similarity_boost: f32,
  pub timeout_secs: u64,
}

impl Default for TtsConfig {
  fn default() -> Self {
    Self {
      voice_id: "21m00Tcm4TlvDq8ikWAM".into(),
      model_id: "eleven_multilingual_v2".into(),
      stability: 0.7,
      similarity_boost: 0.8,
      timeout_secs: 20,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  pub access_ttl_minutes: i64,
  pub refresh_ttl_days: i64,
  /// How long before access expiry the client should be told to refresh.
  pub refresh_lead_seconds: i64,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self { access_ttl_minutes: 60, refresh_ttl_days: 7, refresh_lead_seconds: 300 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuranConfig {
  pub base_url: String,
  pub cache_ttl_secs: u64,
  pub retries: u32,
  pub timeout_secs: u64,
}

impl Default for QuranConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.quran.com/api/v4".into(),
      cache_ttl_secs: 1800,
      retries: 2,
      timeout_secs: 15,
    }
  }
}

/// Attempt to load `AppConfig` from ALIF_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("ALIF_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "alif_backend", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "alif_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "alif_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
