//! Read-only proxy over the public Quran.com v4 API (chapters, verses, tafsir, recitations).
//!
//! List endpoints are cached in memory with a TTL. Every upstream call gets bounded
//! retries: linear backoff on errors, and a capped wait when the API answers 429.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, instrument, warn};

use crate::config::QuranConfig;
use crate::error::ProviderError;

const BACKOFF_STEP: Duration = Duration::from_millis(1500);
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Chapter {
  pub id: u32,
  pub name_ar: Option<String>,
  pub name_en: Option<String>,
  pub name_simple: Option<String>,
  pub revelation_place: Option<String>,
  pub verses_count: Option<u32>,
  pub bismillah_pre: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Verse {
  pub id: u32,
  pub verse_key: String,
  pub text_uthmani: Option<String>,
  pub translation: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct VersePage {
  pub chapter: u32,
  pub page: u32,
  pub per_page: u32,
  pub total_pages: Option<u32>,
  pub verses: Vec<Verse>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TafsirResource {
  pub id: u32,
  pub slug: Option<String>,
  pub name: Option<String>,
  pub language: Option<String>,
  pub author: Option<String>,
  pub translated_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TafsirEntry {
  pub verse_key: String,
  pub text: Option<String>,
  pub resource_id: u32,
  pub resource_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChapterTafsir {
  pub chapter: u32,
  pub tafsir_id: u32,
  pub items: Vec<TafsirEntry>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChapterAudio {
  pub chapter: u32,
  pub reciter_id: u32,
  pub audio_url: Option<String>,
  pub format: Option<String>,
  pub duration: Option<f64>,
}

// --- Upstream payloads (tolerant: everything optional) ---

#[derive(Deserialize)]
struct TranslatedName { name: Option<String> }

#[derive(Deserialize)]
struct RawChapter {
  id: u32,
  name_arabic: Option<String>,
  name_simple: Option<String>,
  translated_name: Option<TranslatedName>,
  revelation_place: Option<String>,
  verses_count: Option<u32>,
  bismillah_pre: Option<bool>,
}

#[derive(Deserialize)]
struct ChaptersEnvelope { #[serde(default)] chapters: Vec<RawChapter> }

#[derive(Deserialize)]
struct RawTranslation { text: Option<String> }

#[derive(Deserialize)]
struct RawVerse {
  id: u32,
  verse_key: String,
  text_uthmani: Option<String>,
  text_imlaei: Option<String>,
  #[serde(default)]
  translations: Vec<RawTranslation>,
}

#[derive(Deserialize, Default)]
struct Pagination { current_page: Option<u32>, per_page: Option<u32>, total_pages: Option<u32> }

#[derive(Deserialize)]
struct VersesEnvelope {
  #[serde(default)]
  verses: Vec<RawVerse>,
  #[serde(default)]
  pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct RawTafsirResource {
  id: u32,
  slug: Option<String>,
  name: Option<String>,
  language_name: Option<String>,
  author_name: Option<String>,
  translated_name: Option<TranslatedName>,
}

#[derive(Deserialize)]
struct TafsirsEnvelope { #[serde(default)] tafsirs: Vec<RawTafsirResource> }

#[derive(Deserialize)]
struct RawTafsirText {
  verse_key: Option<String>,
  text: Option<String>,
  resource_id: Option<u32>,
  resource_name: Option<String>,
}

#[derive(Deserialize)]
struct TafsirTextsEnvelope { #[serde(default)] tafsirs: Vec<RawTafsirText> }

#[derive(Deserialize)]
struct AyahTafsirEnvelope { tafsir: Option<RawTafsirText> }

#[derive(Deserialize)]
struct RawAudioFile { url: Option<String>, format: Option<String>, duration: Option<f64> }

#[derive(Deserialize)]
struct AudioEnvelope { audio_file: Option<RawAudioFile> }

pub struct QuranClient {
  client: reqwest::Client,
  config: QuranConfig,
  cache: RwLock<HashMap<String, (Instant, serde_json::Value)>>,
}

impl QuranClient {
  pub fn new(mut config: QuranConfig) -> Result<Self, ProviderError> {
    if let Ok(base) = std::env::var("QURAN_API_BASE") {
      config.base_url = base;
    }
    config.base_url = config.base_url.trim_end_matches('/').to_string();
    let client = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
    Ok(Self { client, config, cache: RwLock::new(HashMap::new()) })
  }

  #[instrument(level = "info", skip(self))]
  pub async fn chapters(&self) -> Result<Vec<Chapter>, ProviderError> {
    self.cached("chapters_list", || async {
      let env: ChaptersEnvelope = self.fetch("/chapters", &[]).await?;
      Ok::<_, ProviderError>(env.chapters.into_iter().map(|c| Chapter {
        id: c.id,
        name_ar: c.name_arabic,
        name_en: c.translated_name.and_then(|t| t.name),
        name_simple: c.name_simple,
        revelation_place: c.revelation_place,
        verses_count: c.verses_count,
        bismillah_pre: c.bismillah_pre,
      }).collect::<Vec<_>>())
    }).await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn tafsirs(&self) -> Result<Vec<TafsirResource>, ProviderError> {
    self.cached("tafsirs_list", || async {
      let env: TafsirsEnvelope = self.fetch("/resources/tafsirs", &[]).await?;
      Ok::<_, ProviderError>(env.tafsirs.into_iter().map(|t| TafsirResource {
        id: t.id,
        slug: t.slug,
        name: t.name,
        language: t.language_name,
        author: t.author_name,
        translated_name: t.translated_name.and_then(|n| n.name),
      }).collect::<Vec<_>>())
    }).await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn verses_by_chapter(
    &self,
    chapter: u32,
    translation_id: Option<u32>,
    page: u32,
    per_page: u32,
  ) -> Result<VersePage, ProviderError> {
    let mut params = vec![
      ("page", page.to_string()),
      ("per_page", per_page.to_string()),
      ("words", "false".to_string()),
      ("fields", "text_uthmani".to_string()),
    ];
    if let Some(t) = translation_id {
      params.push(("translations", t.to_string()));
    }
    let env: VersesEnvelope = self.fetch(&format!("/verses/by_chapter/{chapter}"), &params).await?;
    let pagination = env.pagination.unwrap_or_default();

    Ok(VersePage {
      chapter,
      page: pagination.current_page.unwrap_or(page),
      per_page: pagination.per_page.unwrap_or(per_page),
      total_pages: pagination.total_pages,
      verses: env.verses.into_iter().map(|v| Verse {
        id: v.id,
        verse_key: v.verse_key,
        text_uthmani: v.text_uthmani.or(v.text_imlaei),
        translation: v.translations.into_iter().next().and_then(|t| t.text),
      }).collect(),
    })
  }

  #[instrument(level = "info", skip(self))]
  pub async fn tafsir_for_chapter(&self, tafsir_id: u32, chapter: u32) -> Result<ChapterTafsir, ProviderError> {
    let env: TafsirTextsEnvelope = self.fetch(&format!("/tafsirs/by_chapter/{tafsir_id}/{chapter}"), &[]).await?;
    Ok(ChapterTafsir {
      chapter,
      tafsir_id,
      items: env.tafsirs.into_iter().map(|t| TafsirEntry {
        verse_key: t.verse_key.unwrap_or_default(),
        text: t.text,
        resource_id: t.resource_id.unwrap_or(tafsir_id),
        resource_name: t.resource_name,
      }).collect(),
    })
  }

  #[instrument(level = "info", skip(self))]
  pub async fn tafsir_for_ayah(&self, tafsir_id: u32, ayah_key: &str) -> Result<TafsirEntry, ProviderError> {
    let env: AyahTafsirEnvelope = self.fetch(&format!("/tafsirs/{tafsir_id}/by_ayah/{ayah_key}"), &[]).await?;
    let t = env.tafsir.ok_or(ProviderError::Empty)?;
    Ok(TafsirEntry {
      verse_key: t.verse_key.unwrap_or_else(|| ayah_key.to_string()),
      text: t.text,
      resource_id: t.resource_id.unwrap_or(tafsir_id),
      resource_name: t.resource_name,
    })
  }

  #[instrument(level = "info", skip(self))]
  pub async fn audio_for_chapter(&self, chapter: u32, reciter_id: u32) -> Result<ChapterAudio, ProviderError> {
    let env: AudioEnvelope = self.fetch(&format!("/chapter_recitations/{reciter_id}/{chapter}"), &[]).await?;
    let audio = env.audio_file;
    Ok(ChapterAudio {
      chapter,
      reciter_id,
      audio_url: audio.as_ref().and_then(|a| a.url.clone()),
      format: audio.as_ref().and_then(|a| a.format.clone()),
      duration: audio.as_ref().and_then(|a| a.duration),
    })
  }

  /// Serve `key` from the TTL cache or compute, store and return it.
  async fn cached<T, F, Fut>(&self, key: &str, load: F) -> Result<T, ProviderError>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
  {
    if let Some(value) = self.cache_get(key).await {
      if let Ok(hit) = serde_json::from_value::<T>(value) {
        return Ok(hit);
      }
    }
    let fresh = load().await?;
    let ttl = Duration::from_secs(self.config.cache_ttl_secs);
    self.cache.write().await.insert(key.to_string(), (Instant::now() + ttl, serde_json::to_value(&fresh)?));
    Ok(fresh)
  }

  async fn cache_get(&self, key: &str) -> Option<serde_json::Value> {
    let now = Instant::now();
    {
      let cache = self.cache.read().await;
      match cache.get(key) {
        Some((exp, v)) if now < *exp => return Some(v.clone()),
        Some(_) => {}
        None => return None,
      }
    }
    self.cache.write().await.remove(key);
    None
  }

  async fn fetch<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T, ProviderError> {
    let url = format!("{}{}", self.config.base_url, path);
    let mut attempt = 0u32;
    loop {
      let err = match self.try_fetch::<T>(&url, params).await {
        Ok(v) => return Ok(v),
        Err(e) => e,
      };
      let wait = match &err {
        ProviderError::HttpStatus { status: 429, .. } => (BACKOFF_STEP * (attempt + 1)).min(MAX_RATE_LIMIT_WAIT),
        _ => BACKOFF_STEP * (attempt + 1),
      };
      attempt += 1;
      if attempt > self.config.retries {
        error!(target: "quran", %url, error = %err, attempts = attempt, "Quran API fetch failed");
        return Err(err);
      }
      warn!(target: "quran", %url, attempt, error = %err, wait_ms = wait.as_millis() as u64, "Retrying Quran API call");
      tokio::time::sleep(wait).await;
    }
  }

  async fn try_fetch<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Result<T, ProviderError> {
    let res = self.client.get(url)
      .header(USER_AGENT, "alif-backend/0.1")
      .query(params)
      .send().await?;
    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(ProviderError::HttpStatus { status, body });
    }
    Ok(res.json::<T>().await?)
  }
}
