//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, Message, Role};

use crate::config::AppConfig;

/// 根据配置与环境变量选择后端：有 Key 走 OpenAI 兼容端点，否则退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let api_key = std::env::var("OPENAI_API_KEY").ok();
    if cfg.llm.provider.to_lowercase() == "mock" || api_key.is_none() {
        tracing::warn!("No API key set or provider is mock, using Mock LLM");
        return Arc::new(MockLlmClient::default());
    }

    let model = cfg.llm.model.clone();
    let base = cfg.llm.base_url.as_deref();
    tracing::info!("Using OpenAI-compatible LLM ({})", model);
    Arc::new(
        OpenAiClient::new(base, &model, api_key.as_deref())
            .with_temperature(cfg.llm.temperature),
    )
}
