//! LLM 客户端抽象
//!
//! 规划与结果分析都只需要非流式完成：发送消息，取回首条回复文本。

use async_trait::async_trait;

use crate::llm::Message;

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 要求模型只输出 JSON 对象；不支持 JSON 模式的实现退回普通完成
    async fn complete_json(&self, messages: &[Message]) -> Result<String, String> {
        self.complete(messages).await
    }
}
