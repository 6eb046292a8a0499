//! Server configuration, read from the environment (and `.env` if present).

use std::time::Duration;

use anyhow::Context;

use crate::{judge::DEFAULT_GEMINI_MODEL, rooms::debounce::DEFAULT_QUIET_WINDOW};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// No key means verdicts come from the canned judge.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub debounce: Duration,
    pub session_ttl: time::Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let debounce = match var("DEBOUNCE_MS") {
            Some(ms) => Duration::from_millis(
                ms.trim()
                    .parse()
                    .with_context(|| format!("DEBOUNCE_MS must be a number of milliseconds, got {ms:?}"))?,
            ),
            None => DEFAULT_QUIET_WINDOW,
        };

        let session_ttl = match var("SESSION_TTL_MINUTES") {
            Some(minutes) => time::Duration::minutes(
                minutes
                    .trim()
                    .parse()
                    .with_context(|| format!("SESSION_TTL_MINUTES must be a number, got {minutes:?}"))?,
            ),
            None => time::Duration::minutes(60),
        };

        Ok(Config {
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite://catcourt.db".to_owned()),
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_owned()),
            debounce,
            session_ttl,
        })
    }
}
