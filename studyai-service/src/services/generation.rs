//! Structured generation with a bounded retry loop.

use crate::services::providers::{GenerationParams, ProviderError, TextProvider};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;

/// Drives a `TextProvider` until it produces JSON that parses into the
/// requested type, or the attempt budget runs out.
///
/// Malformed output and rate limiting are retried after a fixed delay;
/// any other provider error is fatal.
pub struct GenerationEngine {
    provider: Arc<dyn TextProvider>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl GenerationEngine {
    pub fn new(provider: Arc<dyn TextProvider>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            provider,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub async fn generate<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<T, AppError> {
        let params = GenerationParams {
            temperature: Some(0.2),
            max_tokens: None,
            schema_name: Some(schema_name.to_string()),
            output_schema: Some(schema),
        };

        let mut last_failure = String::new();

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.provider.generate(prompt, &params).await {
                Ok(response) => {
                    let text = response.text.unwrap_or_default();
                    match serde_json::from_str::<T>(&text) {
                        Ok(parsed) => return Ok(parsed),
                        Err(e) => {
                            tracing::warn!(
                                schema = %schema_name,
                                attempt,
                                error = %e,
                                "Provider returned malformed JSON, retrying"
                            );
                            last_failure = format!("malformed output: {}", e);
                        }
                    }
                }
                Err(ProviderError::RateLimited) => {
                    tracing::warn!(schema = %schema_name, attempt, "Provider rate limited, retrying");
                    last_failure = "rate limited".to_string();
                }
                Err(e) => {
                    tracing::error!(schema = %schema_name, attempt, error = %e, "Provider call failed");
                    return Err(AppError::BadGateway(format!(
                        "AI provider is unavailable: {}",
                        e
                    )));
                }
            }
        }

        Err(AppError::BadGateway(format!(
            "AI provider did not produce a usable answer after {} attempts ({})",
            self.max_attempts,
            last_failure
        )))
    }
}
