use tracing::error;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_PORT: u16 = 10000;

/// Process-wide read-only configuration, built once at startup from the
/// environment and injected into the relay at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API key. Absence does not prevent startup; the relay rejects
    /// chat requests with a 500 until one is configured.
    pub api_key: Option<String>,
    pub api_base: String,
    pub default_model: String,
    pub port: u16,
    /// Optional cap on completion length, forwarded upstream as `max_tokens`.
    pub max_tokens: Option<u32>,
    /// CORS allow-list. `["*"]` means any origin.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            error!("OPENAI_API_KEY is not set; chat endpoints will return errors");
        }

        Self {
            api_key,
            api_base: std::env::var("OPENAI_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            default_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            port: parse_port(std::env::var("PORT").ok().as_deref()),
            max_tokens: std::env::var("MAX_TOKENS").ok().and_then(|v| v.parse().ok()),
            allowed_origins: parse_origins(std::env::var("ALLOWED_ORIGINS").ok().as_deref()),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|p| p.parse().ok()).unwrap_or(DEFAULT_PORT)
}

fn parse_origins(raw: Option<&str>) -> Vec<String> {
    let origins: Vec<String> = raw
        .unwrap_or("*")
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}
