//! 进度广播：task_id → 观察者集合
//!
//! 注册表与观察者表由同一把锁保护：订阅时的「补发当前快照」与发布时的「推送新快照」
//! 不会交错，观察者看到的快照序列既不重复也不乱序。
//! 投递失败（接收端已断开）的观察者会被移除；观察者集合为空时删除该 task_id 条目。

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};

use super::registry::TaskRegistry;
use super::state::TaskProgress;

/// 观察者句柄 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(uuid::Uuid);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 观察者接收序列化后的快照（JSON 文本）
pub type ObserverSender = mpsc::UnboundedSender<String>;

struct Observer {
    id: ObserverId,
    tx: ObserverSender,
}

#[derive(Default)]
struct Inner {
    tasks: TaskRegistry,
    observers: HashMap<String, Vec<Observer>>,
}

#[derive(Default)]
pub struct ProgressBroadcaster {
    inner: Mutex<Inner>,
}

fn serialize(snapshot: &TaskProgress) -> Option<String> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(task_id = %snapshot.task_id, error = %e, "snapshot serialize failed");
            None
        }
    }
}

impl ProgressBroadcaster {
    pub fn new(tasks: TaskRegistry) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks,
                observers: HashMap::new(),
            }),
        }
    }

    /// 订阅；若该任务已有快照，立即补发一次
    pub async fn subscribe(&self, task_id: &str, tx: ObserverSender) -> ObserverId {
        let id = ObserverId(uuid::Uuid::new_v4());
        let mut inner = self.inner.lock().await;

        if let Some(json) = inner.tasks.get(task_id).and_then(serialize) {
            if tx.send(json).is_err() {
                tracing::debug!(task_id, observer = %id, "observer closed before catch-up");
                return id;
            }
        }

        inner
            .observers
            .entry(task_id.to_string())
            .or_default()
            .push(Observer { id, tx });
        tracing::debug!(task_id, observer = %id, "observer subscribed");
        id
    }

    /// 取消订阅，返回是否存在该观察者
    pub async fn unsubscribe(&self, task_id: &str, id: ObserverId) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(list) = inner.observers.get_mut(task_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|o| o.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            inner.observers.remove(task_id);
        }
        removed
    }

    /// 记录最新快照并推送给该任务的所有观察者
    pub async fn publish(&self, snapshot: &TaskProgress) {
        let mut inner = self.inner.lock().await;
        inner.tasks.upsert(snapshot.clone());

        let task_id = snapshot.task_id.as_str();
        let Some(list) = inner.observers.get_mut(task_id) else {
            return;
        };
        let Some(json) = serialize(snapshot) else {
            return;
        };

        list.retain(|o| {
            let delivered = o.tx.send(json.clone()).is_ok();
            if !delivered {
                tracing::debug!(task_id, observer = %o.id, "observer disconnected, removing");
            }
            delivered
        });
        if list.is_empty() {
            inner.observers.remove(task_id);
        }
    }

    /// 任务的最新快照
    pub async fn snapshot(&self, task_id: &str) -> Option<TaskProgress> {
        self.inner.lock().await.tasks.get(task_id).cloned()
    }

    pub async fn observer_count(&self, task_id: &str) -> usize {
        self.inner
            .lock()
            .await
            .observers
            .get(task_id)
            .map_or(0, |l| l.len())
    }

    /// 有观察者的 task_id 数
    pub async fn watched_tasks(&self) -> usize {
        self.inner.lock().await.observers.len()
    }

    pub async fn task_count(&self) -> usize {
        self.inner.lock().await.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::TaskStatus;

    fn decode(json: &str) -> TaskProgress {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_terminal_snapshot_once() {
        let broadcaster = ProgressBroadcaster::default();
        let mut progress = TaskProgress::new("t1");
        broadcaster.publish(&progress).await;
        progress.advance(TaskStatus::Complete);
        broadcaster.publish(&progress).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.subscribe("t1", tx).await;

        let first = decode(&rx.try_recv().unwrap());
        assert_eq!(first.status, TaskStatus::Complete);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_before_task_exists() {
        let broadcaster = ProgressBroadcaster::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.subscribe("t1", tx).await;
        assert!(rx.try_recv().is_err());

        broadcaster.publish(&TaskProgress::new("t1")).await;
        assert_eq!(decode(&rx.try_recv().unwrap()).status, TaskStatus::Planning);
    }

    #[tokio::test]
    async fn test_dead_observer_removed_others_still_served() {
        let broadcaster = ProgressBroadcaster::default();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        broadcaster.subscribe("t1", dead_tx).await;
        broadcaster.subscribe("t1", live_tx).await;
        drop(dead_rx);

        broadcaster.publish(&TaskProgress::new("t1")).await;

        assert!(live_rx.try_recv().is_ok());
        assert_eq!(broadcaster.observer_count("t1").await, 1);
    }

    #[tokio::test]
    async fn test_empty_observer_set_pruned() {
        let broadcaster = ProgressBroadcaster::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = broadcaster.subscribe("t1", tx).await;
        assert_eq!(broadcaster.watched_tasks().await, 1);

        assert!(broadcaster.unsubscribe("t1", id).await);
        assert_eq!(broadcaster.watched_tasks().await, 0);
        assert!(!broadcaster.unsubscribe("t1", id).await);
    }

    #[tokio::test]
    async fn test_publish_updates_snapshot() {
        let broadcaster = ProgressBroadcaster::default();
        let mut progress = TaskProgress::new("t1");
        progress.advance(TaskStatus::Searching);
        broadcaster.publish(&progress).await;

        let snap = broadcaster.snapshot("t1").await.unwrap();
        assert_eq!(snap.status, TaskStatus::Searching);
        assert_eq!(broadcaster.task_count().await, 1);
    }
}
