//! 网关消息协议
//!
//! 客户端 → 网关：subscribe / unsubscribe / search / quick_search / ping
//! 网关 → 客户端：task_started / quick_results / error / pong；进度快照直接推送 TaskProgress JSON。

use serde::{Deserialize, Serialize};

use crate::core::SearchResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 订阅任务进度（已有快照会立即补发）
    Subscribe { task_id: String },

    Unsubscribe { task_id: String },

    /// 启动一次完整任务，连接自动订阅其进度
    Search { task: String },

    /// 不跟踪进度的直接搜索
    QuickSearch { query: String },

    Ping {
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    TaskStarted { task_id: String },

    QuickResults {
        query: String,
        results: Vec<SearchResult>,
    },

    Error { code: String, message: String },

    Pong { timestamp: i64 },
}

impl ServerMessage {
    pub fn error(code: &str, message: &str) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn pong(timestamp: Option<i64>) -> Self {
        ServerMessage::Pong {
            timestamp: timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
