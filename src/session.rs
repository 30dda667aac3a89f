//! Short-lived browser session bookkeeping.
//!
//! A session is created when a CAPTCHA is fetched and destroyed when the
//! attendance request completes, fails, or times out. Each session owns one
//! browser; nothing else may touch the driver while the session is live.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thirtyfour::WebDriver;
use tracing::{info, warn};
use uuid::Uuid;

/// How often the sweeper checks for expired sessions.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A pending login awaiting the human-solved CAPTCHA.
pub struct Session {
    pub driver: WebDriver,
    pub roll_no: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Close the underlying browser. Failures are logged, not propagated;
    /// a dead chromedriver leaves nothing further to clean up.
    pub async fn discard(self) {
        if let Err(e) = self.driver.quit().await {
            warn!(error = %e, "Failed to quit browser");
        }
    }
}

/// Thread-safe registry of pending sessions, keyed by an opaque UUID handed
/// back to the client alongside the CAPTCHA image.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<DashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly-prepared browser and return its session id.
    pub fn insert(&self, driver: WebDriver, roll_no: String) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.insert(
            id,
            Session {
                driver,
                roll_no,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Take exclusive ownership of a session, removing it from the store.
    pub fn take(&self, id: &Uuid) -> Option<Session> {
        self.inner.remove(id).map(|(_, session)| session)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Spawn a background task that closes and discards sessions older than
    /// `timeout`. Best-effort; runs until the process exits.
    pub fn spawn_sweeper(&self, timeout: Duration) {
        let store = self.clone();
        let max_age = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::minutes(5));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                let now = Utc::now();
                let expired: Vec<Uuid> = store
                    .inner
                    .iter()
                    .filter(|entry| is_expired(entry.value().created_at, now, max_age))
                    .map(|entry| *entry.key())
                    .collect();

                for id in expired {
                    if let Some(session) = store.take(&id) {
                        info!(session_id = %id, roll_no = %mask_roll_no(&session.roll_no), "Sweeping expired session");
                        session.discard().await;
                    }
                }
            }
        });
    }
}

/// Whether a session created at `created_at` has outlived `max_age` as of
/// `now`. A session exactly at the limit is still live; only strictly older
/// ones are swept.
fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
    now - created_at > max_age
}

/// Redact a roll number down to its first three characters for logging.
pub fn mask_roll_no(roll_no: &str) -> String {
    let prefix: String = roll_no.chars().take(3).collect();
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fresh_is_not_expired() {
        let now = Utc::now();
        let max_age = chrono::Duration::minutes(5);
        assert!(!is_expired(now - chrono::Duration::seconds(30), now, max_age));
    }

    #[test]
    fn test_session_at_exact_timeout_is_not_expired() {
        let now = Utc::now();
        let max_age = chrono::Duration::minutes(5);
        assert!(!is_expired(now - max_age, now, max_age));
    }

    #[test]
    fn test_session_past_timeout_is_expired() {
        let now = Utc::now();
        let max_age = chrono::Duration::minutes(5);
        assert!(is_expired(
            now - max_age - chrono::Duration::seconds(1),
            now,
            max_age
        ));
    }

    #[test]
    fn test_mask_roll_no() {
        assert_eq!(mask_roll_no("2021UIT3105"), "202***");
    }

    #[test]
    fn test_mask_roll_no_short() {
        assert_eq!(mask_roll_no("ab"), "ab***");
    }

    #[test]
    fn test_mask_roll_no_empty() {
        assert_eq!(mask_roll_no(""), "***");
    }
}
