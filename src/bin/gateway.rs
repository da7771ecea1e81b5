//! Navigator Gateway - WebSocket 进度订阅服务
//!
//! 运行方式：
//! ```bash
//! cargo run --bin navigator-gateway --features gateway
//! ```
//!
//! 客户端发送 `{"type":"search","task":"..."}` 启动任务并接收进度快照，
//! 或 `{"type":"subscribe","task_id":"..."}` 订阅已有任务。

use std::sync::Arc;

use navigator::config::load_config;
use navigator::core::{NavigatorCleanup, ShutdownCoordinator, ShutdownManager};
use navigator::gateway::{Hub, HubConfig};
use navigator::{observability, Navigator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });
    let navigator = Arc::new(Navigator::from_config(&cfg).await);

    let hub = Hub::new(HubConfig::from(&cfg.gateway), Arc::clone(&navigator));
    hub.start().await.map_err(anyhow::Error::msg)?;
    tracing::info!("Press Ctrl+C to stop");

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();
    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(NavigatorCleanup::new(navigator));

    shutdown.wait_for_shutdown().await;
    tracing::info!("Shutting down gateway...");
    hub.stop();
    coordinator.run_cleanup().await;

    Ok(())
}
