//! Chat-completions providers.
//!
//! All supported providers speak the same OpenAI-style wire format; they only
//! differ in endpoint, credentials and default model.

use crate::error::{ConfigError, ProviderError};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEEPSEEK_ENDPOINT: &str = "https://api.deepseek.com/chat/completions";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    DeepSeek,
    Ark,
    OpenAi,
}

impl ProviderKind {
    pub fn api_key_var(self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::Ark => "ARK_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn model_var(self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "DEEPSEEK_MODEL",
            ProviderKind::Ark => "ARK_MODEL",
            ProviderKind::OpenAi => "OPENAI_MODEL",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::Ark => "doubao-seed-1-6-lite-251015",
            ProviderKind::OpenAi => "gpt-4o-mini",
        }
    }

    fn fallback_error(self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "DeepSeek request failed",
            ProviderKind::Ark => "Ark request failed",
            ProviderKind::OpenAi => "OpenAI request failed",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::DeepSeek => write!(f, "deepseek"),
            ProviderKind::Ark => write!(f, "ark"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "ark" | "volc" | "doubao" => Ok(ProviderKind::Ark),
            "openai" => Ok(ProviderKind::OpenAi),
            _ => Err(ConfigError::UnknownProvider(value.trim().to_string())),
        }
    }
}

/// Resolved provider settings. Credentials may be absent; requests then fail.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: String,
}

impl ProviderConfig {
    /// Reads settings through `lookup`, typically `std::env::var(..).ok()`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let kind = match read("TERMLIGHT_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::default(),
        };
        let endpoint = match kind {
            ProviderKind::DeepSeek => Some(DEEPSEEK_ENDPOINT.to_string()),
            ProviderKind::Ark => read("ARK_ENDPOINT").map(|value| resolve_ark_endpoint(&value)),
            ProviderKind::OpenAi => Some(resolve_openai_endpoint(
                read("OPENAI_BASE_URL").as_deref().unwrap_or(OPENAI_BASE_URL),
            )),
        };
        Ok(Self {
            kind,
            api_key: read(kind.api_key_var()),
            endpoint: endpoint.filter(|value| !value.is_empty()),
            model: read(kind.model_var()).unwrap_or_else(|| kind.default_model().to_string()),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Normalises an Ark endpoint so that it points at `/chat/completions`.
pub fn resolve_ark_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/api/v3") {
        return format!("{trimmed}{CHAT_COMPLETIONS_PATH}");
    }
    trimmed.to_string()
}

fn resolve_openai_endpoint(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_PATH) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{CHAT_COMPLETIONS_PATH}")
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Thin client for one configured provider. Cheap to clone.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl ChatClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Sends one system + user exchange and returns the upstream JSON verbatim.
    pub async fn complete(
        &self,
        system_prompt: &str,
        text: &str,
        model_override: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let kind = self.config.kind;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey(kind.api_key_var()))?;
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or(ProviderError::MissingEndpoint("ARK_ENDPOINT"))?;
        let model = model_override
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(self.config.model.as_str());

        let request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: TEMPERATURE,
        };
        debug!(provider = %kind, model, chars = text.chars().count(), "sending chat completion");

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = upstream_error_message(&body)
                .unwrap_or_else(|| kind.fallback_error().to_string());
            warn!(provider = %kind, status = status.as_u16(), %message, "provider rejected request");
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|err| ProviderError::Upstream {
            status: 502,
            message: format!("provider returned invalid JSON: {err}"),
        })
    }
}

/// Picks the most specific message out of an error body.
///
/// Looks at `error.message`, then `message`, then falls back to the raw body.
pub fn upstream_error_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let nested = value
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str);
        let flat = value.get("message").and_then(Value::as_str);
        if let Some(message) = nested.or(flat).filter(|m| !m.trim().is_empty()) {
            return Some(message.to_string());
        }
    }
    let raw = body.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_deepseek() {
        let config = ProviderConfig::from_lookup(lookup(&[("DEEPSEEK_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.kind, ProviderKind::DeepSeek);
        assert_eq!(config.endpoint.as_deref(), Some(DEEPSEEK_ENDPOINT));
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn ark_endpoint_is_normalised() {
        assert_eq!(
            resolve_ark_endpoint("https://ark.example.com/api/v3/"),
            "https://ark.example.com/api/v3/chat/completions"
        );
        assert_eq!(
            resolve_ark_endpoint("https://ark.example.com/api/v3/chat/completions"),
            "https://ark.example.com/api/v3/chat/completions"
        );
        assert_eq!(
            resolve_ark_endpoint("https://proxy.example.com/custom"),
            "https://proxy.example.com/custom"
        );
    }

    #[test]
    fn ark_reads_its_own_variables() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("TERMLIGHT_PROVIDER", "Ark"),
            ("ARK_API_KEY", "ark-key"),
            ("ARK_ENDPOINT", "https://ark.example.com/api/v3"),
            ("ARK_MODEL", "doubao-pro"),
            ("DEEPSEEK_API_KEY", "unused"),
        ]))
        .unwrap();
        assert_eq!(config.kind, ProviderKind::Ark);
        assert_eq!(config.api_key.as_deref(), Some("ark-key"));
        assert_eq!(config.model, "doubao-pro");
        assert_eq!(
            config.endpoint.as_deref(),
            Some("https://ark.example.com/api/v3/chat/completions")
        );
    }

    #[test]
    fn ark_without_endpoint_has_none() {
        let config = ProviderConfig::from_lookup(lookup(&[("TERMLIGHT_PROVIDER", "ark")])).unwrap();
        assert!(config.endpoint.is_none());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn openai_base_url_gets_completions_path() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("TERMLIGHT_PROVIDER", "openai"),
            ("OPENAI_BASE_URL", "http://localhost:9000/v1/"),
        ]))
        .unwrap();
        assert_eq!(
            config.endpoint.as_deref(),
            Some("http://localhost:9000/v1/chat/completions")
        );
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = ProviderConfig::from_lookup(lookup(&[("TERMLIGHT_PROVIDER", "gemini")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownProvider("gemini".to_string()));
        assert_eq!("volc".parse::<ProviderKind>(), Ok(ProviderKind::Ark));
    }

    #[test]
    fn error_message_prefers_nested_message() {
        assert_eq!(
            upstream_error_message(r#"{"error":{"message":"invalid key"},"message":"outer"}"#).as_deref(),
            Some("invalid key")
        );
        assert_eq!(
            upstream_error_message(r#"{"message":"rate limited"}"#).as_deref(),
            Some("rate limited")
        );
        assert_eq!(
            upstream_error_message("Service Unavailable").as_deref(),
            Some("Service Unavailable")
        );
        assert_eq!(upstream_error_message("  "), None);
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = ChatClient::new(ProviderConfig::from_lookup(lookup(&[])).unwrap());
        let err = client.complete("prompt", "text", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey("DEEPSEEK_API_KEY")));
        assert_eq!(err.status_code(), 500);
    }
}
