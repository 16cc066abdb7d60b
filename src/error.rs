use thiserror::Error;

#[derive(Debug, Error)]
pub enum SavedTermsError {
    #[error("saved terms are not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Invalid settings read from the environment.
#[cfg(feature = "web")]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown provider {0:?}; expected deepseek, ark or openai")]
    UnknownProvider(String),

    #[error("PORT must be a port number, got {0:?}")]
    InvalidPort(String),
}

/// Failures talking to a chat-completions provider.
#[cfg(feature = "web")]
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing {0} environment variable")]
    MissingApiKey(&'static str),

    #[error("missing {0} environment variable")]
    MissingEndpoint(&'static str),

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("upstream error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(feature = "web")]
impl ProviderError {
    /// HTTP status the analyze endpoint answers with for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::MissingApiKey(_) | ProviderError::MissingEndpoint(_) => 500,
            ProviderError::Upstream { status, .. } => *status,
            ProviderError::Transport(_) => 502,
        }
    }
}
