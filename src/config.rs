//! Environment-driven configuration.

use serde::Deserialize;
use std::time::Duration;

fn default_port() -> u16 {
    5001
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_portal_url() -> String {
    "https://www.imsnsit.org/imsnsit/".to_string()
}

fn default_session_timeout_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP API listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address of a running chromedriver (or compatible WebDriver endpoint).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Root URL of the IMS portal.
    #[serde(default = "default_portal_url")]
    pub portal_url: String,

    /// Sessions older than this are swept and their browsers closed.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// The portal's CAPTCHA is solved by a human watching the browser, so the
    /// default is a visible window. Headless is opt-in for server deployments.
    #[serde(default)]
    pub headless: bool,
}

impl Config {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    #[test]
    fn test_defaults() {
        let config: Config = figment::Figment::new().extract().unwrap();
        assert_eq!(config.port, 5001);
        assert_eq!(config.webdriver_url, "http://localhost:9515");
        assert_eq!(config.portal_url, "https://www.imsnsit.org/imsnsit/");
        assert_eq!(config.session_timeout_secs, 300);
        assert!(!config.headless);
    }

    #[test]
    fn test_overrides() {
        let config: Config = figment::Figment::new()
            .merge(Serialized::default("port", 8080))
            .merge(Serialized::default("session_timeout_secs", 60))
            .merge(Serialized::default("headless", true))
            .extract()
            .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_timeout(), Duration::from_secs(60));
        assert!(config.headless);
    }
}
