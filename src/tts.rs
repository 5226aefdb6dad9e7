//! Audio playback adapter: cache, then the ElevenLabs TTS API, then on-device speech.
//!
//! `get_audio` never fails. A provider error (or no provider at all) yields a
//! `browser-fallback` clip telling the client to use its local speech synthesis.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::TtsConfig;
use crate::domain::{AudioClip, AudioSource};
use crate::error::ProviderError;

pub const BROWSER_SPEECH_PREFIX: &str = "browser_speech:";

#[derive(Clone)]
pub struct ElevenLabs {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
}

impl ElevenLabs {
  /// Construct the client if we find ELEVENLABS_API_KEY; otherwise return None.
  pub fn from_env(cfg: &TtsConfig) -> Option<Self> {
    let api_key = std::env::var("ELEVENLABS_API_KEY").ok()?;
    let base_url = std::env::var("ELEVENLABS_BASE_URL").unwrap_or_else(|_| "https://api.elevenlabs.io/v1".into());
    Self::new(api_key, base_url, cfg.timeout_secs).ok()
  }

  pub fn new(api_key: String, base_url: String, timeout_secs: u64) -> Result<Self, ProviderError> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string() })
  }

  /// Synthesize `text` and return raw MP3 bytes.
  #[instrument(level = "info", skip(self, text, cfg), fields(text_len = text.len(), %voice_id))]
  pub async fn synthesize(&self, text: &str, voice_id: &str, cfg: &TtsConfig) -> Result<Vec<u8>, ProviderError> {
    #[derive(Serialize)]
    struct VoiceSettings { stability: f32, similarity_boost: f32, style: f32, use_speaker_boost: bool }
    #[derive(Serialize)]
    struct Req<'a> { text: &'a str, model_id: &'a str, voice_settings: VoiceSettings }

    let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);
    let req = Req {
      text,
      model_id: &cfg.model_id,
      voice_settings: VoiceSettings {
        stability: cfg.stability,
        similarity_boost: cfg.similarity_boost,
        style: 0.0,
        use_speaker_boost: true,
      },
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "alif-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(ACCEPT, "audio/mpeg")
      .header("xi-api-key", &self.api_key)
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(ProviderError::HttpStatus { status, body });
    }

    let bytes = res.bytes().await?;
    if bytes.is_empty() {
      return Err(ProviderError::Empty);
    }
    Ok(bytes.to_vec())
  }
}

pub struct AudioAdapter {
  provider: Option<ElevenLabs>,
  config: TtsConfig,
  // (voice id, exact text) -> data URL
  cache: RwLock<HashMap<(String, String), String>>,
}

impl AudioAdapter {
  pub fn new(provider: Option<ElevenLabs>, config: TtsConfig) -> Self {
    Self { provider, config, cache: RwLock::new(HashMap::new()) }
  }

  pub fn has_provider(&self) -> bool {
    self.provider.is_some()
  }

  #[cfg(test)]
  pub(crate) fn default_voice(&self) -> &str {
    &self.config.voice_id
  }

  #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
  pub async fn get_audio(&self, text: &str, voice_id: Option<&str>) -> AudioClip {
    let voice = voice_id.filter(|v| !v.trim().is_empty()).unwrap_or(self.config.voice_id.as_str()).to_string();
    let key = (voice.clone(), text.to_string());

    if let Some(hit) = { self.cache.read().await.get(&key).cloned() } {
      debug!(target: "tts", %voice, "Audio cache hit");
      return AudioClip { source: AudioSource::Cache, audio_ref: hit, text: text.to_string(), voice_id: voice };
    }

    let Some(provider) = &self.provider else {
      debug!(target: "tts", "No TTS provider configured; using browser speech");
      return browser_fallback(text, voice);
    };

    let start = Instant::now();
    match provider.synthesize(text, &voice, &self.config).await {
      Ok(bytes) => {
        let data_url = format!("data:audio/mpeg;base64,{}", BASE64.encode(&bytes));
        // Same key always maps to the same audio, so keep whichever write landed first.
        let stored = self.cache.write().await.entry(key).or_insert(data_url).clone();
        info!(target: "tts", %voice, bytes = bytes.len(), elapsed = ?start.elapsed(), "Synthesized audio");
        AudioClip { source: AudioSource::Provider, audio_ref: stored, text: text.to_string(), voice_id: voice }
      }
      Err(e) => {
        warn!(target: "tts", %voice, error = %e, elapsed = ?start.elapsed(), "TTS provider failed; using browser speech");
        browser_fallback(text, voice)
      }
    }
  }

  #[cfg(test)]
  pub(crate) async fn prime(&self, voice_id: &str, text: &str, audio_ref: String) {
    self.cache.write().await.insert((voice_id.to_string(), text.to_string()), audio_ref);
  }

  #[cfg(test)]
  pub(crate) async fn cached_len(&self) -> usize {
    self.cache.read().await.len()
  }
}

fn browser_fallback(text: &str, voice_id: String) -> AudioClip {
  AudioClip {
    source: AudioSource::BrowserFallback,
    audio_ref: format!("{BROWSER_SPEECH_PREFIX}{text}"),
    text: text.to_string(),
    voice_id,
  }
}
