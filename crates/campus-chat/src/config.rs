use std::time::Duration;

use crate::error::{Error, Result};

/// How often the active chat is re-fetched.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Max distance between an optimistic send time and the server timestamp for
/// the two to count as the same message.
pub const DEFAULT_MATCH_WINDOW: Duration = Duration::from_secs(30);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Backend root, e.g. `http://localhost:3000`. No trailing slash needed.
    pub base_url: String,
    pub poll_interval: Duration,
    pub match_window: Duration,
    pub request_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            match_window: DEFAULT_MATCH_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ChatConfig {
    /// Read overrides from the environment (and `.env`, if present).
    ///
    /// - `CAMPUS_API_URL`
    /// - `CAMPUS_POLL_INTERVAL_MS`
    /// - `CAMPUS_MATCH_WINDOW_SECS`
    /// - `CAMPUS_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("CAMPUS_API_URL") {
            config.base_url = url;
        }
        if let Some(ms) = parse_var(&lookup, "CAMPUS_POLL_INTERVAL_MS")? {
            if ms == 0 {
                return Err(Error::Validation("CAMPUS_POLL_INTERVAL_MS must be positive".into()));
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var(&lookup, "CAMPUS_MATCH_WINDOW_SECS")? {
            let window = Duration::from_secs(secs);
            // Timestamps are compared as chrono durations.
            if chrono::Duration::from_std(window).is_err() {
                return Err(Error::Validation(format!(
                    "CAMPUS_MATCH_WINDOW_SECS={} is out of range",
                    secs
                )));
            }
            config.match_window = window;
        }
        if let Some(secs) = parse_var(&lookup, "CAMPUS_REQUEST_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(Error::Validation("CAMPUS_REQUEST_TIMEOUT_SECS must be positive".into()));
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Validation(format!("{}='{}': {}", key, raw, e))),
    }
}
