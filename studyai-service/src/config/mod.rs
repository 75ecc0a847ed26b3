use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    pub generation: GenerationConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GenerationConfig {
    /// Attempts per request, counting the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("STUDYAI_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("STUDYAI_SERVICE_PORT")
            .unwrap_or_else(|_| "3006".to_string())
            .parse()?;

        let api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let api_base_url = env::var("OPENAI_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let max_attempts = env::var("GENERATION_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);
        let retry_delay_ms = env::var("GENERATION_RETRY_DELAY_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .unwrap_or(500);

        Ok(Self {
            server: ServerConfig { host, port },
            openai: OpenAiConfig {
                api_key: Secret::new(api_key),
                model,
                api_base_url,
            },
            generation: GenerationConfig {
                max_attempts,
                retry_delay_ms,
            },
            service_name: "studyai-service".to_string(),
        })
    }
}
