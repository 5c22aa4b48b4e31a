// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML data model (raw) and its validated form.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: invariants and duration/regex parsing.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    CacheSettings, ConfigFile, EngineSettings, PoolSettings, RawConfigFile, SecuritySettings,
};
pub use validate::{parse_duration, validate_config};
