//! Application state: the catalog, in-memory stores, session manager and provider clients.
//!
//! This module owns:
//!   - the immutable letter catalog
//!   - progress, pending-quiz, chat and user stores
//!   - the session manager (injected clock + refresh scheduler)
//!   - the audio adapter and optional OpenAI / identity clients
//!   - the Quran proxy client
//!
//! Providers are optional. Without OPENAI_API_KEY the tutor answers with its apology;
//! without ELEVENLABS_API_KEY every clip is a browser-speech fallback.

use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use crate::auth::IdentityClient;
use crate::catalog::{self, Catalog};
use crate::config::{load_app_config_from_env, AppConfig};
use crate::error::ProviderError;
use crate::openai::OpenAI;
use crate::quran::QuranClient;
use crate::session::{Clock, SessionManager, SystemClock};
use crate::store::{ChatLog, PendingQuizzes, ProgressStore, UserStore};
use crate::tts::{AudioAdapter, ElevenLabs};

/// External clients, each present only when its credentials/endpoint are configured.
#[derive(Clone, Default)]
pub struct Providers {
    pub openai: Option<OpenAI>,
    pub tts: Option<ElevenLabs>,
    pub identity: Option<IdentityClient>,
}

impl Providers {
    pub fn from_env(config: &AppConfig) -> Self {
        Self {
            openai: OpenAI::from_env(),
            tts: ElevenLabs::from_env(&config.tts),
            identity: IdentityClient::from_env(),
        }
    }
}

pub struct AppState {
    pub catalog: Catalog,
    pub config: AppConfig,
    pub progress: ProgressStore,
    pub quizzes: PendingQuizzes,
    pub chats: ChatLog,
    pub users: UserStore,
    pub sessions: SessionManager,
    pub audio: AudioAdapter,
    pub openai: Option<OpenAI>,
    pub identity: Option<IdentityClient>,
    pub quran: QuranClient,
}

impl AppState {
    /// Build state from env: load config, seed the catalog, init provider clients.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, ProviderError> {
        let config = load_app_config_from_env().unwrap_or_default();
        let providers = Providers::from_env(&config);
        Self::build(config, providers, Arc::new(SystemClock))
    }

    /// Build state from explicit parts. Tests use this with a fake clock and no providers.
    pub fn build(config: AppConfig, providers: Providers, clock: Arc<dyn Clock>) -> Result<Self, ProviderError> {
        let config = config.sanitized();
        let catalog = Catalog::arabic();
        match catalog::validate(catalog.letters()) {
            Ok(()) => info!(target: "alif_backend", letters = catalog.len(), "Letter catalog seeded"),
            Err(e) => error!(target: "alif_backend", error = %e, "Letter catalog failed validation"),
        }

        match &providers.openai {
            Some(oa) => info!(target: "alif_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI tutor enabled."),
            None => info!(target: "alif_backend", "OpenAI disabled (no OPENAI_API_KEY). Tutor will apologise."),
        }
        match &providers.tts {
            Some(tts) => info!(target: "alif_backend", base_url = %tts.base_url, "ElevenLabs TTS enabled."),
            None => info!(target: "alif_backend", "TTS disabled (no ELEVENLABS_API_KEY). Using browser speech."),
        }
        if providers.identity.is_none() {
            info!(target: "alif_backend", "Identity provider not configured (no IDENTITY_PROVIDER_URL).");
        }

        let sessions = SessionManager::new(clock, config.session.clone()).with_scheduler(Arc::new(|user_id: &str, delay: chrono::Duration| {
            debug!(target: "auth", %user_id, refresh_in_secs = delay.num_seconds(), "Session refresh scheduled");
        }));
        let quran = QuranClient::new(config.quran.clone())?;
        let audio = AudioAdapter::new(providers.tts, config.tts.clone());

        Ok(Self {
            catalog,
            progress: ProgressStore::default(),
            quizzes: PendingQuizzes::default(),
            chats: ChatLog::default(),
            users: UserStore::default(),
            sessions,
            audio,
            openai: providers.openai,
            identity: providers.identity,
            quran,
            config,
        })
    }
}
