// src/config/model.rs

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

pub const DEFAULT_MAX_WHILE_ITERATIONS: usize = 10_000;
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_POOL_MAX_SLOTS: usize = 10;
pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration exactly as written in `Shode.toml`.
///
/// ```toml
/// [engine]
/// max_while_iterations = 10000
/// timeout = "5m"
///
/// [cache]
/// enabled = true
/// capacity = 1000
/// ttl = "60s"
///
/// [pool]
/// max_slots = 10
/// idle_timeout = "30s"
///
/// [security]
/// enabled = true
/// extra_dangerous = ["custom-dangerous"]
/// allow = ["rm"]
/// deny_patterns = ["--force-all"]
/// ```
///
/// Every section is optional. Durations and regexes stay as strings here;
/// they are parsed when converting into [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub pool: PoolSection,

    #[serde(default)]
    pub security: SecuritySection,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Ceiling on while-condition evaluations per loop.
    #[serde(default = "default_max_while_iterations")]
    pub max_while_iterations: usize,

    /// Whole-run deadline, e.g. `"5m"`. No deadline when absent.
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_max_while_iterations() -> usize {
    DEFAULT_MAX_WHILE_ITERATIONS
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_while_iterations: default_max_while_iterations(),
            timeout: None,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    #[serde(default = "default_cache_ttl")]
    pub ttl: String,
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_cache_ttl() -> String {
    "60s".to_string()
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            ttl: default_cache_ttl(),
        }
    }
}

/// `[pool]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSection {
    #[serde(default = "default_max_slots")]
    pub max_slots: usize,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: String,
}

fn default_max_slots() -> usize {
    DEFAULT_POOL_MAX_SLOTS
}

fn default_idle_timeout() -> String {
    "30s".to_string()
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_slots: default_max_slots(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

/// `[security]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SecuritySection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Commands blocked on top of the built-in list.
    #[serde(default)]
    pub extra_dangerous: Vec<String>,

    /// Commands removed from the built-in dangerous/network lists.
    #[serde(default)]
    pub allow: Vec<String>,

    /// Regexes matched against the full command line.
    #[serde(default)]
    pub deny_patterns: Vec<String>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_dangerous: Vec::new(),
            allow: Vec::new(),
            deny_patterns: Vec::new(),
        }
    }
}

/// Validated configuration with durations and patterns parsed.
///
/// Only obtainable through `TryFrom<RawConfigFile>` or `Default`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSettings,
    pub cache: CacheSettings,
    pub pool: PoolSettings,
    pub security: SecuritySettings,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_while_iterations: usize,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_slots: usize,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub enabled: bool,
    pub extra_dangerous: Vec<String>,
    pub allow: Vec<String>,
    pub deny_patterns: Vec<Regex>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            engine: EngineSettings {
                max_while_iterations: DEFAULT_MAX_WHILE_ITERATIONS,
                timeout: None,
            },
            cache: CacheSettings {
                enabled: true,
                capacity: DEFAULT_CACHE_CAPACITY,
                ttl: DEFAULT_CACHE_TTL,
            },
            pool: PoolSettings {
                max_slots: DEFAULT_POOL_MAX_SLOTS,
                idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            },
            security: SecuritySettings {
                enabled: true,
                extra_dangerous: Vec::new(),
                allow: Vec::new(),
                deny_patterns: Vec::new(),
            },
        }
    }
}
