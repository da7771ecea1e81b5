//! 错误类型
//!
//! 所有错误都在最小作用域内被捕获并降级（步骤失败 ⇒ 零结果，规划失败 ⇒ 启发式，分析失败 ⇒ 空分析），
//! 不会抛给 `execute_smart_search` / `quick_search` 的调用方。

use thiserror::Error;

/// 浏览器能力错误（选择器未命中、导航超时、脚本执行失败等）
#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    #[error("Browser unavailable: {0}")]
    Unavailable(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Browser operation failed: {0}")]
    Operation(String),
}

/// 网页搜索能力错误
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    #[error("Search not configured: {0}")]
    NotConfigured(String),

    #[error("Search request failed: {0}")]
    Request(String),

    #[error("Search API error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Search response decode failed: {0}")]
    Decode(String),
}

/// 编排过程中的错误（内部使用，最终都会被降级处理）
#[derive(Error, Debug)]
pub enum NavigatorError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM timeout after {0}s")]
    LlmTimeout(u64),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Capability not configured: {0}")]
    CapabilityMissing(&'static str),
}
