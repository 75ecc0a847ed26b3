pub mod generation;
pub mod metrics;
pub mod prompts;
pub mod providers;

pub use generation::GenerationEngine;
pub use metrics::{get_metrics, init_metrics, record_generation};
pub use providers::{
    GenerationParams, MockTextProvider, OpenAiTextProvider, ProviderError, ProviderResponse,
    TextProvider,
};
