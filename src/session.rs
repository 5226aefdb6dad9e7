//! Session manager: access/refresh tokens with an injected clock and an explicit
//! refresh-scheduling callback.
//!
//! The manager never starts timers itself. Whenever it issues or rotates a session it
//! tells the registered scheduler how long until a refresh is due; the HTTP layer turns
//! that into a `refresh_in_secs` hint, and tests capture it directly.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::domain::UserId;

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Called with (user id, delay until the access token should be refreshed).
pub type RefreshScheduler = Arc<dyn Fn(&str, Duration) + Send + Sync>;

#[derive(Clone, Debug, Serialize)]
pub struct Session {
  pub access_token: String,
  pub refresh_token: String,
  pub user_id: UserId,
  pub access_expires_at: DateTime<Utc>,
  pub refresh_expires_at: DateTime<Utc>,
  /// Seconds from issue until the client should refresh.
  pub refresh_in_secs: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
  UnknownToken,
  Expired,
}

#[derive(Default)]
struct Tables {
  by_access: HashMap<String, Session>,
  refresh_to_access: HashMap<String, String>,
}

pub struct SessionManager {
  clock: Arc<dyn Clock>,
  config: SessionConfig,
  scheduler: Option<RefreshScheduler>,
  tables: RwLock<Tables>,
}

impl SessionManager {
  pub fn new(clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
    Self { clock, config, scheduler: None, tables: RwLock::new(Tables::default()) }
  }

  pub fn with_scheduler(mut self, scheduler: RefreshScheduler) -> Self {
    self.scheduler = Some(scheduler);
    self
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  pub async fn issue(&self, user_id: &str) -> Session {
    let session = self.mint(user_id);
    {
      let mut t = self.tables.write().await;
      t.refresh_to_access.insert(session.refresh_token.clone(), session.access_token.clone());
      t.by_access.insert(session.access_token.clone(), session.clone());
    }
    info!(target: "auth", %user_id, expires_at = %session.access_expires_at, "Session issued");
    self.schedule(&session);
    session
  }

  /// Resolve an access token to its user. Sessions past their refresh window are dropped on sight.
  pub async fn resolve(&self, access_token: &str) -> Result<UserId, SessionError> {
    let now = self.clock.now();
    let expired = {
      let t = self.tables.read().await;
      match t.by_access.get(access_token) {
        None => return Err(SessionError::UnknownToken),
        Some(s) if s.access_expires_at > now => return Ok(s.user_id.clone()),
        Some(s) => s.refresh_expires_at <= now,
      }
    };
    if expired {
      self.remove(access_token).await;
    }
    Err(SessionError::Expired)
  }

  /// Rotate both tokens. The old pair stops working immediately.
  pub async fn refresh(&self, refresh_token: &str) -> Result<Session, SessionError> {
    let now = self.clock.now();
    let old = {
      let t = self.tables.read().await;
      let access = t.refresh_to_access.get(refresh_token).ok_or(SessionError::UnknownToken)?;
      t.by_access.get(access).cloned().ok_or(SessionError::UnknownToken)?
    };
    self.remove(&old.access_token).await;
    if old.refresh_expires_at <= now {
      return Err(SessionError::Expired);
    }
    debug!(target: "auth", user_id = %old.user_id, "Refreshing session");
    Ok(self.issue(&old.user_id).await)
  }

  pub async fn revoke(&self, access_token: &str) -> bool {
    self.remove(access_token).await
  }

  async fn remove(&self, access_token: &str) -> bool {
    let mut t = self.tables.write().await;
    match t.by_access.remove(access_token) {
      Some(s) => {
        t.refresh_to_access.remove(&s.refresh_token);
        true
      }
      None => false,
    }
  }

  fn mint(&self, user_id: &str) -> Session {
    let now = self.clock.now();
    let access_ttl = Duration::minutes(self.config.access_ttl_minutes);
    let lead = Duration::seconds(self.config.refresh_lead_seconds);
    let refresh_in = (access_ttl - lead).max(Duration::zero());
    Session {
      access_token: Uuid::new_v4().simple().to_string(),
      refresh_token: Uuid::new_v4().simple().to_string(),
      user_id: user_id.to_string(),
      access_expires_at: now + access_ttl,
      refresh_expires_at: now + Duration::days(self.config.refresh_ttl_days),
      refresh_in_secs: refresh_in.num_seconds(),
    }
  }

  fn schedule(&self, session: &Session) {
    if let Some(cb) = &self.scheduler {
      cb(&session.user_id, Duration::seconds(session.refresh_in_secs));
    }
  }
}
