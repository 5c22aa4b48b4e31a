// src/config/validate.rs

use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    CacheSettings, ConfigFile, EngineSettings, PoolSettings, RawConfigFile, SecuritySettings,
};
use crate::errors::{Result, ShodeError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ShodeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;

        let timeout = raw
            .engine
            .timeout
            .as_deref()
            .map(|t| parse_field_duration("[engine].timeout", t))
            .transpose()?;

        Ok(ConfigFile {
            engine: EngineSettings {
                max_while_iterations: raw.engine.max_while_iterations,
                timeout,
            },
            cache: CacheSettings {
                enabled: raw.cache.enabled,
                capacity: raw.cache.capacity,
                ttl: parse_field_duration("[cache].ttl", &raw.cache.ttl)?,
            },
            pool: PoolSettings {
                max_slots: raw.pool.max_slots,
                idle_timeout: parse_field_duration("[pool].idle_timeout", &raw.pool.idle_timeout)?,
            },
            security: SecuritySettings {
                enabled: raw.security.enabled,
                extra_dangerous: raw.security.extra_dangerous,
                allow: raw.security.allow,
                deny_patterns: compile_patterns(&raw.security.deny_patterns)?,
            },
        })
    }
}

/// Check the numeric invariants of a raw config. Durations and patterns are
/// checked while converting to [`ConfigFile`].
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.max_while_iterations == 0 {
        return Err(ShodeError::ConfigError(
            "[engine].max_while_iterations must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.pool.max_slots == 0 {
        return Err(ShodeError::ConfigError(
            "[pool].max_slots must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.cache.enabled && cfg.cache.capacity == 0 {
        return Err(ShodeError::ConfigError(
            "[cache].capacity must be >= 1 when the cache is enabled".to_string(),
        ));
    }

    Ok(())
}

fn parse_field_duration(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .ok_or_else(|| ShodeError::ConfigError(format!("{field}: invalid duration '{value}'")))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                ShodeError::ConfigError(format!("[security].deny_patterns: invalid regex '{p}': {e}"))
            })
        })
        .collect()
}

/// Parse durations like `"500ms"`, `"3s"`, `"2m"`, `"1h"`. A bare number is
/// taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s")
    };

    let value: u64 = num_str.trim().parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}
