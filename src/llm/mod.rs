//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod json;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use json::extract_json_block;
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::LlmClient;

use crate::config::LlmSection;

/// 根据配置与环境变量选择 LLM 后端；没有任何 API Key 时返回 None（规划与分析走启发式）
///
/// `model` 为该用途的模型名（规划 / 分析可不同），为 None 时用 `[llm].model`。
pub fn create_llm_from_config(
    section: &LlmSection,
    model: Option<&str>,
) -> Option<Arc<dyn LlmClient>> {
    let provider = section.provider.to_lowercase();
    let deepseek_key = std::env::var("DEEPSEEK_API_KEY").ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();
    let model = model.unwrap_or(&section.model);

    // 有 DeepSeek Key，或配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点
    if let Some(key) = deepseek_key
        .clone()
        .or_else(|| (provider == "deepseek").then(|| openai_key.clone()).flatten())
    {
        tracing::info!(model, "Using DeepSeek LLM");
        return Some(Arc::new(create_deepseek_client(Some(model), &key)));
    }

    if let Some(key) = openai_key {
        tracing::info!(model, "Using OpenAI LLM");
        return Some(Arc::new(OpenAiClient::new(
            section.base_url.as_deref(),
            model,
            &key,
        )));
    }

    tracing::warn!("No LLM API key set, planning and analysis fall back to heuristics");
    None
}
