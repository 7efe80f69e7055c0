//! Shared types, error model, and configuration for HealthNav.
//!
//! This crate is the foundation depended on by all other HealthNav crates.
//! It provides:
//! - [`HealthNavError`]: the unified error type
//! - Domain types ([`Action`], [`Hospital`], [`FieldOutcome`], [`ChatMessage`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChatConfig, LlmConfig, MapsConfig, PipelineConfig, PlannerMode, SearchConfig,
    ServerConfig, WeatherConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_api_key, validate_api_key,
};
pub use error::{HealthNavError, Result};
pub use types::{
    Action, ChatMessage, DISCLAIMER, FieldOutcome, Hospital, LOCATION_UNKNOWN, Role,
    is_known_location,
};
