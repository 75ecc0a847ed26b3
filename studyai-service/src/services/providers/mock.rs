//! Mock provider implementation for testing.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Scripted text provider: hand it the responses each successive call
/// should produce, in order. Runs out of script -> ApiError.
pub struct MockTextProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicU64,
}

impl MockTextProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<String, ProviderError>>,
    ) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn push(&self, response: Result<String, ProviderError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(ProviderResponse {
                input_tokens: 10,
                output_tokens: text.len() as i32 / 4,
                text: Some(text),
                finish_reason: FinishReason::Complete,
            }),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::ApiError(
                "Mock provider script exhausted".to_string(),
            )),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
