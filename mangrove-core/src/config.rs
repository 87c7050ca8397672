//! Configuration system for Mangrove.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/mangrove/config.toml` and/or `.mangrove/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Minimum length of a plausible Cohere API key.
const MIN_API_KEY_LEN: usize = 32;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MangroveConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Remote service configuration (embed, rerank and chat share one provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key; takes precedence over `api_key_env` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL of the API.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Embedding model.
    pub embed_model: String,
    /// Reranking model.
    pub rerank_model: String,
    /// Chat model.
    pub chat_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key_env: "COHERE_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.cohere.ai".to_string(),
            timeout_secs: 60,
            embed_model: "embed-multilingual-v3.0".to_string(),
            rerank_model: "rerank-multilingual-v2.0".to_string(),
            chat_model: "command".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key, preferring the explicit value over the environment.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.api_key
            && !key.trim().is_empty()
        {
            return Ok(key.trim().to_string());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.api_key_env.clone(),
            })
    }
}

/// Candidate selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates kept after cosine similarity.
    pub top_k: usize,
    /// Documents kept after reranking.
    pub rerank_top_n: usize,
    /// Texts sent per embedding request.
    pub embed_batch_size: usize,
    /// Most recent conversation turns rendered into the prompt.
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            rerank_top_n: 3,
            embed_batch_size: 96,
            history_turns: 5,
        }
    }
}

/// Chat generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// Retry policy applied to every remote call.
///
/// The delay before retry `n` (0-based) is `initial_backoff_ms * backoff_multiplier^n`,
/// capped at `max_backoff_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 4_000,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Document loading and chunking settings used by the hosting application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory holding the corpus files.
    pub documents_dir: PathBuf,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("data/documents"),
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl MangroveConfig {
    /// Validate this config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Warnings are human-readable
    /// and never fatal; see [`MangroveConfig::check`] for hard errors.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Ok(key) = self.provider.resolve_api_key()
            && key.len() < MIN_API_KEY_LEN
        {
            warnings.push(format!(
                "API key from '{}' looks malformed (shorter than {} characters)",
                self.provider.api_key_env, MIN_API_KEY_LEN
            ));
        }
        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0–2.0",
                self.generation.temperature
            ));
        }
        if self.retrieval.rerank_top_n > self.retrieval.top_k {
            warnings.push(format!(
                "rerank_top_n ({}) exceeds top_k ({}); at most {} documents will be used",
                self.retrieval.rerank_top_n, self.retrieval.top_k, self.retrieval.top_k
            ));
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            warnings.push(format!(
                "chunk_overlap ({}) >= chunk_size ({}); chunks will repeat heavily",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            ));
        }
        warnings
    }

    /// Reject values the pipeline cannot operate with.
    pub fn check(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            message: message.to_string(),
        };
        if self.retrieval.embed_batch_size == 0 {
            return Err(invalid("retrieval.embed_batch_size must be at least 1"));
        }
        if self.retrieval.top_k == 0 {
            return Err(invalid("retrieval.top_k must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if self.ingest.chunk_size == 0 {
            return Err(invalid("ingest.chunk_size must be at least 1"));
        }
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `MANGROVE_`)
/// 3. Workspace-local config (`.mangrove/config.toml`)
/// 4. User config (`~/.config/mangrove/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&MangroveConfig>,
) -> Result<MangroveConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(MangroveConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "mangrove", "mangrove") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".mangrove").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (MANGROVE_RETRIEVAL__TOP_K, MANGROVE_PROVIDER__CHAT_MODEL, etc.)
    figment = figment.merge(Env::prefixed("MANGROVE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from one explicit file layered over the defaults and environment.
pub fn load_config_file(path: &Path) -> Result<MangroveConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Figment::from(Serialized::defaults(MangroveConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MANGROVE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::from(Box::new(e)))
}

/// Check whether any Mangrove configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "mangrove", "mangrove")
        && config_dir.config_dir().join("config.toml").exists()
    {
        return true;
    }

    if let Some(ws) = workspace
        && ws.join(".mangrove").join("config.toml").exists()
    {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = MangroveConfig::default();
        assert_eq!(config.provider.embed_model, "embed-multilingual-v3.0");
        assert_eq!(config.provider.rerank_model, "rerank-multilingual-v2.0");
        assert_eq!(config.provider.chat_model, "command");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.rerank_top_n, 3);
        assert_eq!(config.retrieval.embed_batch_size, 96);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff_ms, 4_000);
        assert_eq!(config.retry.max_backoff_ms, 10_000);
        assert_eq!(config.ingest.chunk_size, 1000);
        assert_eq!(config.ingest.chunk_overlap, 200);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = MangroveConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: MangroveConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.provider.chat_model, config.provider.chat_model);
        assert_eq!(deserialized.retrieval.top_k, config.retrieval.top_k);
        assert_eq!(deserialized.ingest.documents_dir, config.ingest.documents_dir);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = MangroveConfig::default();
        overrides.provider.chat_model = "command-r".to_string();
        overrides.retrieval.top_k = 8;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.provider.chat_model, "command-r");
        assert_eq!(config.retrieval.top_k, 8);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let mangrove_dir = dir.path().join(".mangrove");
        std::fs::create_dir_all(&mangrove_dir).unwrap();
        std::fs::write(
            mangrove_dir.join("config.toml"),
            r#"
[retrieval]
top_k = 10
rerank_top_n = 4
embed_batch_size = 48
history_turns = 5

[generation]
temperature = 0.2
max_tokens = 300
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.embed_batch_size, 48);
        assert_eq!(config.generation.max_tokens, 300);
        // Untouched sections keep their defaults
        assert_eq!(config.provider.chat_model, "command");
        assert!(config_exists(Some(dir.path())));
    }

    #[test]
    fn test_load_config_file_missing() {
        let result = load_config_file(Path::new("/nonexistent/mangrove.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_config_file_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[ingest]
documents_dir = "corpus"
chunk_size = 500
chunk_overlap = 50
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.ingest.documents_dir, PathBuf::from("corpus"));
        assert_eq!(config.ingest.chunk_size, 500);
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit_value() {
        let mut provider = ProviderConfig::default();
        provider.api_key_env = "MANGROVE_TEST_UNSET_KEY_VAR".to_string();
        provider.api_key = Some("explicit-key".to_string());
        assert_eq!(provider.resolve_api_key().unwrap(), "explicit-key");
    }

    #[test]
    fn test_resolve_api_key_missing() {
        let mut provider = ProviderConfig::default();
        provider.api_key_env = "MANGROVE_TEST_DEFINITELY_UNSET".to_string();
        match provider.resolve_api_key() {
            Err(ConfigError::EnvVarMissing { var }) => {
                assert_eq!(var, "MANGROVE_TEST_DEFINITELY_UNSET")
            }
            other => panic!("Expected EnvVarMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_flags_short_key_and_bad_ranges() {
        let mut config = MangroveConfig::default();
        config.provider.api_key = Some("short".to_string());
        config.generation.temperature = 3.5;
        config.retrieval.rerank_top_n = 9;
        config.ingest.chunk_overlap = 1000;

        let warnings = config.validate();
        assert_eq!(warnings.len(), 4);
        assert!(warnings[0].contains("malformed"));
        assert!(warnings[1].contains("temperature"));
        assert!(warnings[2].contains("rerank_top_n"));
        assert!(warnings[3].contains("chunk_overlap"));
    }

    #[test]
    fn test_validate_clean_config() {
        let mut config = MangroveConfig::default();
        config.provider.api_key = Some("k".repeat(40));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_check_rejects_zero_batch_size() {
        let mut config = MangroveConfig::default();
        config.retrieval.embed_batch_size = 0;
        assert!(matches!(config.check(), Err(ConfigError::Invalid { .. })));
        assert!(MangroveConfig::default().check().is_ok());
    }
}
