//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HamaSettings::default()`]
//! 2. If `~/.hama/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::HamaSettings;

/// Resolve the path to the settings file (`~/.hama/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".hama").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HamaSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<HamaSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    validate(&settings)?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file_layer(path: &Path) -> Result<HamaSettings> {
    let defaults = serde_json::to_value(HamaSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `HAMA_*` overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and fall back to the
/// file/default value.
pub fn apply_env_overrides(settings: &mut HamaSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("HAMA_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("HAMA_PORT") {
        match parse_u16_range(&v, 0, 65535) {
            Some(port) => settings.server.port = port,
            None => warn_invalid("HAMA_PORT", &v),
        }
    }
    if let Some(v) = read("HAMA_PATH") {
        settings.server.path = if v.starts_with('/') { v } else { format!("/{v}") };
    }
    if let Some(v) = read("HAMA_PEER_NAME") {
        settings.server.peer_name = v;
    }
    if let Some(v) = read("HAMA_KEEPALIVE_INTERVAL") {
        match parse_u64_range(&v, 1, 3600) {
            Some(secs) => settings.server.keepalive_interval_secs = secs,
            None => warn_invalid("HAMA_KEEPALIVE_INTERVAL", &v),
        }
    }
    if let Some(v) = read("HAMA_MAX_SEND_QUEUE") {
        match parse_usize_range(&v, 1, 1_000_000) {
            Some(n) => settings.server.max_send_queue = n,
            None => warn_invalid("HAMA_MAX_SEND_QUEUE", &v),
        }
    }

    // ── Client ──────────────────────────────────────────────────────
    if let Some(v) = read("HAMA_CLIENT_URL") {
        settings.client.url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("HAMA_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("HAMA_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn_invalid("HAMA_LOG_JSON", &v),
        }
    }
}

fn warn_invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "invalid env var, ignoring");
}

/// Reject combinations that cannot run.
fn validate(settings: &HamaSettings) -> Result<()> {
    if settings.server.keepalive_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "server.keepaliveIntervalSecs must be positive".into(),
        ));
    }
    if settings.server.max_send_queue == 0 {
        return Err(SettingsError::InvalidValue(
            "server.maxSendQueue must be positive".into(),
        ));
    }
    let path = settings.server.path.trim_end_matches('/');
    if path.is_empty() || path == "/health" {
        return Err(SettingsError::InvalidValue(format!(
            "server.path '{}' collides with a built-in route",
            settings.server.path
        )));
    }
    if settings.client.connect_timeout_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "client.connectTimeoutSecs must be positive".into(),
        ));
    }
    if !settings.server.capabilities.is_object() {
        return Err(SettingsError::InvalidValue(
            "server.capabilities must be an object".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
