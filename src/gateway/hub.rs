//! WebSocket 进度网关
//!
//! 每个连接一个写任务（mpsc → ws sink），连接本身就是进度观察者：订阅时把同一个发送端注册到
//! ProgressBroadcaster，连接关闭时注销它的全部订阅。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::message::{ClientMessage, ServerMessage};
use crate::config::GatewaySection;
use crate::core::{Navigator, ObserverId, ObserverSender};

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub bind_addr: String,
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from(&GatewaySection::default())
    }
}

impl From<&GatewaySection> for HubConfig {
    fn from(section: &GatewaySection) -> Self {
        Self {
            bind_addr: section.bind_addr.clone(),
            max_connections: section.max_connections,
        }
    }
}

pub struct Hub {
    config: HubConfig,
    navigator: Arc<Navigator>,
    connections: Arc<AtomicUsize>,
    shutdown: watch::Sender<bool>,
}

impl Hub {
    pub fn new(config: HubConfig, navigator: Arc<Navigator>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            navigator,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown,
        }
    }

    /// 绑定并开始接受连接，返回实际监听地址
    pub async fn start(&self) -> Result<SocketAddr, String> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e| format!("Invalid bind address: {}", e))?;
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind: {}", e))?;
        let local = listener
            .local_addr()
            .map_err(|e| format!("Failed to read local address: {}", e))?;

        tracing::info!("Gateway listening on ws://{}", local);

        let mut shutdown_rx = self.shutdown.subscribe();
        let navigator = Arc::clone(&self.navigator);
        let connections = Arc::clone(&self.connections);
        let max_connections = self.config.max_connections;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    result = listener.accept() => {
                        let (stream, peer) = match result {
                            Ok(accepted) => accepted,
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                                continue;
                            }
                        };
                        if connections.load(Ordering::SeqCst) >= max_connections {
                            tracing::warn!(peer = %peer, max_connections, "connection limit reached, rejecting");
                            continue;
                        }
                        connections.fetch_add(1, Ordering::SeqCst);
                        let navigator = Arc::clone(&navigator);
                        let connections = Arc::clone(&connections);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, navigator).await {
                                tracing::error!("Connection error from {}: {}", peer, e);
                            }
                            connections.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                }
            }
            tracing::info!("Gateway stopped accepting connections");
        });

        Ok(local)
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// 一个连接的订阅集合
#[derive(Default)]
pub struct Subscriptions {
    observers: HashMap<String, ObserverId>,
}

impl Subscriptions {
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    async fn subscribe(&mut self, navigator: &Navigator, task_id: &str, tx: &ObserverSender) {
        if self.observers.contains_key(task_id) {
            return;
        }
        let id = navigator.subscribe(task_id, tx.clone()).await;
        self.observers.insert(task_id.to_string(), id);
    }

    async fn unsubscribe(&mut self, navigator: &Navigator, task_id: &str) {
        if let Some(id) = self.observers.remove(task_id) {
            navigator.unsubscribe(task_id, id).await;
        }
    }

    async fn clear(&mut self, navigator: &Navigator) {
        for (task_id, id) in self.observers.drain() {
            navigator.unsubscribe(&task_id, id).await;
        }
    }
}

/// 处理一条客户端消息；返回需要立即回复的消息
pub async fn handle_client_message(
    navigator: &Arc<Navigator>,
    message: ClientMessage,
    tx: &ObserverSender,
    subscriptions: &mut Subscriptions,
) -> Option<ServerMessage> {
    match message {
        ClientMessage::Subscribe { task_id } => {
            subscriptions.subscribe(navigator, &task_id, tx).await;
            None
        }
        ClientMessage::Unsubscribe { task_id } => {
            subscriptions.unsubscribe(navigator, &task_id).await;
            None
        }
        ClientMessage::Search { task } => {
            if task.trim().is_empty() {
                return Some(ServerMessage::error("invalid_task", "task must not be empty"));
            }
            let (task_id, _handle) = navigator.spawn_smart_search(task);
            // task_started 先于任何进度快照入队
            let _ = tx.send(
                ServerMessage::TaskStarted {
                    task_id: task_id.clone(),
                }
                .to_json(),
            );
            subscriptions.subscribe(navigator, &task_id, tx).await;
            None
        }
        ClientMessage::QuickSearch { query } => {
            let results = navigator.quick_search(&query).await;
            Some(ServerMessage::QuickResults { query, results })
        }
        ClientMessage::Ping { timestamp } => Some(ServerMessage::pong(timestamp)),
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    navigator: Arc<Navigator>,
) -> Result<(), String> {
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| format!("WebSocket handshake failed: {}", e))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut subscriptions = Subscriptions::default();

    tracing::info!("New WebSocket connection from {}", addr);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            WsMessage::Text(text) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => {
                        handle_client_message(&navigator, message, &tx, &mut subscriptions).await
                    }
                    Err(e) => Some(ServerMessage::error("parse_error", &e.to_string())),
                };
                if let Some(reply) = reply {
                    let _ = tx.send(reply.to_json());
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    subscriptions.clear(&navigator).await;
    drop(tx);
    writer.abort();
    tracing::info!("WebSocket connection closed: {}", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NavigatorBuilder, TaskProgress};
    use crate::tools::MockSearch;
    use std::time::Duration;

    fn navigator() -> Arc<Navigator> {
        Arc::new(
            NavigatorBuilder::new()
                .with_search(Arc::new(MockSearch::new("one\ntwo\nthree")))
                .politeness_delay(Duration::ZERO)
                .build(),
        )
    }

    #[tokio::test]
    async fn test_search_message_starts_and_streams() {
        let navigator = navigator();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = Subscriptions::default();

        let reply = handle_client_message(
            &navigator,
            ClientMessage::Search {
                task: "laptop deals".into(),
            },
            &tx,
            &mut subs,
        )
        .await;
        assert!(reply.is_none());
        assert_eq!(subs.len(), 1);

        let first: ServerMessage = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let ServerMessage::TaskStarted { task_id } = first else {
            panic!("expected task_started, got {:?}", first);
        };

        loop {
            let json = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            let snapshot: TaskProgress = serde_json::from_str(&json).unwrap();
            assert_eq!(snapshot.task_id, task_id);
            if snapshot.is_complete() {
                assert_eq!(snapshot.found_items.len(), 3);
                break;
            }
        }

        subs.clear(&navigator).await;
        assert_eq!(navigator.broadcaster().observer_count(&task_id).await, 0);
    }

    #[tokio::test]
    async fn test_quick_search_and_ping_replies() {
        let navigator = navigator();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut subs = Subscriptions::default();

        let reply = handle_client_message(
            &navigator,
            ClientMessage::QuickSearch {
                query: "laptop deals".into(),
            },
            &tx,
            &mut subs,
        )
        .await;
        match reply {
            Some(ServerMessage::QuickResults { results, .. }) => assert_eq!(results.len(), 3),
            other => panic!("unexpected reply: {:?}", other),
        }

        let pong = handle_client_message(
            &navigator,
            ClientMessage::Ping { timestamp: Some(42) },
            &tx,
            &mut subs,
        )
        .await;
        assert_eq!(pong, Some(ServerMessage::Pong { timestamp: 42 }));
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn test_websocket_round_trip() {
        let hub = Hub::new(
            HubConfig {
                bind_addr: "127.0.0.1:0".into(),
                max_connections: 4,
            },
            navigator(),
        );
        let addr = hub.start().await.unwrap();

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        ws.send(WsMessage::Text(r#"{"type":"ping","timestamp":1}"#.into()))
            .await
            .unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        assert_eq!(reply, WsMessage::Text(r#"{"type":"pong","timestamp":1}"#.into()));

        ws.send(WsMessage::Text("not json".into())).await.unwrap();
        let WsMessage::Text(err) = ws.next().await.unwrap().unwrap() else {
            panic!("expected text frame");
        };
        assert!(err.contains("parse_error"));
        hub.stop();
    }
}
