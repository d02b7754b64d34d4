// Gateway configuration, sourced from environment variables at startup.

use serde::{Deserialize, Serialize};

/// A single OpenAI-compatible backend (vLLM or similar).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL without the `/v1` suffix, e.g. `http://localhost:8000`.
    pub url: String,
    /// API key forwarded as `Authorization: Bearer` to the backend.
    pub api_key: Option<String>,
    /// Model served by this backend. Empty or `"auto"` means the gateway
    /// discovers it from the backend's `/v1/models` listing.
    pub model: String,
}

impl BackendConfig {
    /// Whether the configured model must be resolved via discovery.
    pub fn needs_discovery(&self) -> bool {
        self.model.is_empty() || self.model == "auto"
    }
}

/// Full gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub host: String,
    pub port: u16,
    /// API key clients must present. Empty disables auth.
    pub api_key: String,
    /// Default text backend.
    pub backend: BackendConfig,
    /// Optional vision-capable backend for image-bearing requests.
    pub vision_backend: Option<BackendConfig>,
    /// Inject the web-search guidance prompt into every request.
    pub web_search_prompt: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3456,
            api_key: String::new(),
            backend: BackendConfig {
                url: "http://localhost:8000".to_string(),
                api_key: None,
                model: String::new(),
            },
            vision_backend: None,
            web_search_prompt: true,
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl RouterConfig {
    /// Load configuration from the environment.
    ///
    /// VISION_URL is what enables the vision backend; its key and model
    /// fall back to the defaults when unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backend = BackendConfig {
            url: env_nonempty("VLLM_URL").unwrap_or(defaults.backend.url),
            api_key: env_nonempty("VLLM_API_KEY"),
            model: env_nonempty("VLLM_MODEL").unwrap_or_default(),
        };

        let vision_backend = env_nonempty("VISION_URL").map(|url| BackendConfig {
            url,
            api_key: env_nonempty("VISION_API_KEY"),
            model: env_nonempty("VISION_MODEL").unwrap_or_else(|| "auto".to_string()),
        });

        Self {
            host: env_nonempty("HOST").unwrap_or(defaults.host),
            port: env_nonempty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            api_key: env_nonempty("API_KEY").unwrap_or_default(),
            backend,
            vision_backend,
            web_search_prompt: env_nonempty("WEB_SEARCH_PROMPT")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(defaults.web_search_prompt),
        }
    }

    pub fn auth_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}
