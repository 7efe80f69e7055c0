//! Application configuration for HealthNav.
//!
//! User config lives at `~/.healthnav/healthnav.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; each service section names the
//! environment variable that holds its key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HealthNavError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "healthnav.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".healthnav";

// ---------------------------------------------------------------------------
// Config structs (matching healthnav.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Language model (OpenAI-compatible chat completions).
    #[serde(default)]
    pub llm: LlmConfig,

    /// Geocoding and nearby-places lookup.
    #[serde(default)]
    pub maps: MapsConfig,

    /// Web search for public-health advisories.
    #[serde(default)]
    pub search: SearchConfig,

    /// Current weather lookup.
    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP API binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".into()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Base URL of the chat-completions API.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".into()
}
fn default_llm_timeout() -> u64 {
    60
}

/// `[maps]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapsConfig {
    #[serde(default = "default_maps_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_maps_base_url")]
    pub base_url: String,

    /// Search radius around the geocoded location, in metres.
    #[serde(default = "default_radius_m")]
    pub radius_m: u32,

    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_maps_key_env(),
            base_url: default_maps_base_url(),
            radius_m: default_radius_m(),
            timeout_secs: default_service_timeout(),
        }
    }
}

fn default_maps_key_env() -> String {
    "GOOGLE_MAPS_API_KEY".into()
}
fn default_maps_base_url() -> String {
    "https://maps.googleapis.com/maps/api".into()
}
fn default_radius_m() -> u32 {
    10_000
}
fn default_service_timeout() -> u64 {
    15
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Maximum number of results concatenated into the advisories field.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            max_results: default_max_results(),
            timeout_secs: default_service_timeout(),
        }
    }
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> u32 {
    3
}

/// `[weather]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_weather_key_env(),
            base_url: default_weather_base_url(),
            timeout_secs: default_service_timeout(),
        }
    }
}

fn default_weather_key_env() -> String {
    "OPENWEATHER_API_KEY".into()
}
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".into()
}

/// Who decides which actions a query needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerMode {
    /// The language model decides under a stated policy.
    #[default]
    Model,
    /// The policy is applied in code; no model call.
    Policy,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub planner: PlannerMode,

    /// Run the selected adapters concurrently instead of one after another.
    #[serde(default)]
    pub concurrent_execute: bool,
}

/// `[chat]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// How many recent user messages are replayed into a follow-up prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
        }
    }
}

fn default_history_window() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.healthnav/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HealthNavError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.healthnav/healthnav.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HealthNavError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        HealthNavError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HealthNavError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HealthNavError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HealthNavError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the named environment variable, if set and non-empty.
pub fn resolve_api_key(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}

/// Check that the language-model API key env var is set and non-empty.
///
/// The other services degrade per call when their key is missing, but
/// without a language model no stage can run.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.llm.api_key_env;
    match resolve_api_key(var_name) {
        Some(_) => Ok(()),
        None => Err(HealthNavError::config(format!(
            "language model API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("bind"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("OPENWEATHER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.maps.radius_m, 10_000);
        assert_eq!(parsed.search.max_results, 3);
        assert_eq!(parsed.chat.history_window, 5);
        assert_eq!(parsed.pipeline.planner, PlannerMode::Model);
        assert!(!parsed.pipeline.concurrent_execute);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[llm]
model = "gpt-4o"

[pipeline]
planner = "policy"
concurrent_execute = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pipeline.planner, PlannerMode::Policy);
        assert!(config.pipeline.concurrent_execute);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn unknown_planner_is_rejected() {
        let toml_str = "[pipeline]\nplanner = \"oracle\"\n";
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "HN_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/healthnav.toml")).unwrap_err();
        assert!(matches!(err, HealthNavError::Io { .. }));
    }
}
