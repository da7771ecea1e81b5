//! WebSocket 网关：客户端通过一个连接发起任务、订阅进度、执行快速搜索
//!
//! 进度快照以原始 TaskProgress JSON 推送，其余回复使用带 `type` 标签的 [`ServerMessage`]。

mod hub;
mod message;

pub use hub::{handle_client_message, Hub, HubConfig, Subscriptions};
pub use message::{ClientMessage, ServerMessage};
