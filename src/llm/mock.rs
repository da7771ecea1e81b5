//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设回复；队列耗尽后返回错误。记录收到的每条 prompt（最后一条消息内容）。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    json_requests: Mutex<usize>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条成功回复
    pub fn respond(self, content: impl Into<String>) -> Self {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Ok(content.into()));
        }
        self
    }

    /// 追加一次失败
    pub fn fail(self, error: impl Into<String>) -> Self {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Err(error.into()));
        }
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// 通过 complete_json 发出的请求数
    pub fn json_requests(&self) -> usize {
        self.json_requests.lock().map(|n| *n).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let (Ok(mut prompts), Some(last)) = (self.prompts.lock(), messages.last()) {
            prompts.push(last.content.clone());
        }
        self.responses
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .unwrap_or_else(|| Err("mock: no scripted response".to_string()))
    }

    async fn complete_json(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut n) = self.json_requests.lock() {
            *n += 1;
        }
        self.complete(messages).await
    }
}
