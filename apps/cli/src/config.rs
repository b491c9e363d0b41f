use std::{collections::HashMap, fs, time::Duration};

use anyhow::{bail, Context, Result};
use url::Url;

#[derive(Debug, Clone)]
pub struct Settings {
    pub generator_url: String,
    pub ledger_url: String,
    pub database_url: String,
    pub resolve_timeout_ms: u64,
    pub generation_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            generator_url: "http://127.0.0.1:8787".into(),
            ledger_url: "http://127.0.0.1:8787".into(),
            database_url: "sqlite://./data/session.db".into(),
            resolve_timeout_ms: 3000,
            generation_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("assistant.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("generator_url") {
                settings.generator_url = v.clone();
            }
            if let Some(v) = file_cfg.get("ledger_url") {
                settings.ledger_url = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("resolve_timeout_ms") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.resolve_timeout_ms = parsed;
                }
            }
            if let Some(v) = file_cfg.get("generation_timeout_secs") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.generation_timeout_secs = parsed;
                }
            }
        }
    }

    if let Ok(v) = std::env::var("APP__GENERATOR_URL") {
        settings.generator_url = v;
    }
    if let Ok(v) = std::env::var("APP__LEDGER_URL") {
        settings.ledger_url = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__RESOLVE_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.resolve_timeout_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__GENERATION_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.generation_timeout_secs = parsed;
        }
    }

    settings
}

/// Rejects malformed or non-HTTP service URLs before any request is
/// built from them, and strips a trailing slash so path joins stay
/// predictable.
pub fn validate_service_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw).with_context(|| format!("invalid service url '{raw}'"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        bail!("service url '{raw}' must use http or https");
    }
    Ok(raw.trim_end_matches('/').to_string())
}
