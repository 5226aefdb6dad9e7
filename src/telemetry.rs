//! Tracing setup.
//!
//! `LOG_LEVEL` takes an EnvFilter directive string; when unset, the crate's own
//! targets log at debug and everything else at info. `LOG_FORMAT` is one of
//! `pretty` (default), `compact` or `json`.

use tracing_subscriber::EnvFilter;

/// Log targets emitted by this crate.
pub const TARGETS: [&str; 6] = ["alif_backend", "quiz", "tutor", "tts", "auth", "quran"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub directives: String,
    pub format: LogFormat,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::var("LOG_LEVEL").ok(), std::env::var("LOG_FORMAT").ok())
    }

    fn from_vars(level: Option<String>, format: Option<String>) -> Self {
        let directives = level
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(default_directives);
        Self { directives, format: LogFormat::parse(format.as_deref()) }
    }
}

fn default_directives() -> String {
    let ours: Vec<String> = TARGETS.iter().map(|t| format!("{t}=debug")).collect();
    format!("info,{},tower_http=info,axum=info", ours.join(","))
}

pub fn init_tracing() {
    let settings = LogSettings::from_env();
    let filter = EnvFilter::try_new(&settings.directives).unwrap_or_else(|e| {
        eprintln!("invalid LOG_LEVEL {:?} ({e}); using defaults", settings.directives);
        EnvFilter::new(default_directives())
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Each format is a different subscriber type, so init inside the match.
    match settings.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.init(),
    }
}
