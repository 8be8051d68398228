use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemma-3-27b-it:free";
pub const DEFAULT_GMAIL_API_BASE_URL: &str = "https://gmail.googleapis.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "missing environment variables: {}\n\
         \n\
         💡 Solutions:\n\
         1. Create a .env file next to the binary:\n\
            OPENROUTER_API_KEY=sk-or-...\n\
         \n\
         2. Or export the variables manually:\n\
            export OPENROUTER_API_KEY=sk-or-...\n\
            export GMAIL_CREDENTIALS_PATH=/path/to/credentials.json\n\
            cargo run",
        .0.join(", ")
    )]
    MissingEnvVars(Vec<String>),

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },

    #[error("OPENROUTER_API_KEY is empty, set it in your .env file")]
    MissingApiKey,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub openrouter: OpenRouterConfig,
    pub gmail: GmailConfig,
    pub server: ServerConfig,
    pub sender: SenderDefaults,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub credentials_path: String,
    pub token_cache_path: String,
    /// Base64-encoded client secret JSON, written to `credentials_path` when that file is missing
    pub credentials_base64: Option<String>,
    pub api_base_url: String,
    pub sender_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// Values used to prefill the sender fields of the form
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SenderDefaults {
    pub name: String,
    pub position: String,
    pub contact: String,
}

impl Config {
    /// Load the configuration from the process environment
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as missing
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self::check_required_env_vars(&get)?;

        let string_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let max_upload_mb: usize = parse_or(&get, "MAX_UPLOAD_MB", 25)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::InvalidValue {
                var: "MAX_UPLOAD_MB".to_string(),
                value: max_upload_mb.to_string(),
            })?;

        Ok(Config {
            openrouter: OpenRouterConfig {
                api_key: get("OPENROUTER_API_KEY").unwrap_or_default(),
                endpoint: string_or("OPENROUTER_URL", DEFAULT_OPENROUTER_URL),
                model: string_or("OPENROUTER_MODEL", DEFAULT_MODEL),
                timeout_secs: parse_or(&get, "OPENROUTER_TIMEOUT_SECS", 60)?,
            },
            gmail: GmailConfig {
                credentials_path: string_or("GMAIL_CREDENTIALS_PATH", "credentials.json"),
                token_cache_path: string_or("GMAIL_TOKEN_CACHE_PATH", "token.json"),
                credentials_base64: get("GOOGLE_CREDENTIALS_BASE64"),
                api_base_url: string_or("GMAIL_API_BASE_URL", DEFAULT_GMAIL_API_BASE_URL),
                sender_address: string_or("GMAIL_SENDER_ADDRESS", "me@gmail.com"),
            },
            server: ServerConfig {
                host: string_or("SERVER_HOST", "127.0.0.1"),
                port: parse_or(&get, "SERVER_PORT", 7860)?,
                max_upload_bytes,
            },
            sender: SenderDefaults {
                name: get("SENDER_NAME").unwrap_or_default(),
                position: get("SENDER_POSITION").unwrap_or_default(),
                contact: get("SENDER_CONTACT").unwrap_or_default(),
            },
        })
    }

    fn check_required_env_vars<F>(get: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required_vars = ["OPENROUTER_API_KEY"];

        let missing_vars: Vec<String> = required_vars
            .iter()
            .filter(|var| get(var).is_none())
            .map(|var| var.to_string())
            .collect();

        if !missing_vars.is_empty() {
            return Err(ConfigError::MissingEnvVars(missing_vars));
        }

        Ok(())
    }

    /// API key with everything but the first characters hidden, for display
    pub fn masked_api_key(&self) -> String {
        let key = &self.openrouter.api_key;
        let visible: String = key.chars().take(6).collect();
        format!("{}{}", visible, "*".repeat(key.chars().count().saturating_sub(6).min(12)))
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
