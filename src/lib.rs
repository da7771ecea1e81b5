//! Navigator - 自然语言搜索任务编排
//!
//! 把 "find a laptop under $250 near San Jose" 这样的任务拆成导航 / 搜索 / 抽取步骤，
//! 在浏览会话上执行，累积结果并实时推送进度。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 结果模型、任务登记、进度广播、Navigator 主控循环、构建与优雅关闭
//! - **plan**: 步骤描述、规划器（LLM / 启发式）、步骤执行器、结果分析
//! - **tools**: 外部能力抽象（浏览会话、网页搜索）及 Chrome / Google / Mock 实现
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **gateway**: WebSocket 进度订阅网关
//! - **observability**: 日志初始化

pub mod config;
pub mod core;
#[cfg(feature = "gateway")]
pub mod gateway;
pub mod llm;
pub mod observability;
pub mod plan;
pub mod tools;

pub use crate::core::{Navigator, NavigatorBuilder, SearchResult, TaskProgress, TaskStatus};
