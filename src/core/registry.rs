//! 任务注册表：task_id → 最新 TaskProgress
//!
//! 仅保存在内存中。已完成的任务按 TTL 与容量淘汰（容量超限时先淘汰最早更新的已完成任务），
//! 进行中的任务永不淘汰。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::state::TaskProgress;

struct Entry {
    progress: TaskProgress,
    touched: Instant,
}

pub struct TaskRegistry {
    tasks: HashMap<String, Entry>,
    /// 已完成任务的最大保留数
    capacity: usize,
    /// 已完成任务的最长保留时间
    ttl: Duration,
}

impl TaskRegistry {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            tasks: HashMap::new(),
            capacity,
            ttl,
        }
    }

    /// 写入最新快照；若为完成态则顺带执行淘汰，返回被淘汰的 task_id
    pub fn upsert(&mut self, progress: TaskProgress) -> Vec<String> {
        let complete = progress.is_complete();
        self.tasks.insert(
            progress.task_id.clone(),
            Entry {
                progress,
                touched: Instant::now(),
            },
        );
        if complete {
            self.evict()
        } else {
            Vec::new()
        }
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskProgress> {
        self.tasks.get(task_id).map(|e| &e.progress)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 淘汰过期与超出容量的已完成任务
    pub fn evict(&mut self) -> Vec<String> {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut evicted: Vec<String> = self
            .tasks
            .iter()
            .filter(|(_, e)| e.progress.is_complete() && now.duration_since(e.touched) > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &evicted {
            self.tasks.remove(id);
        }

        let mut completed: Vec<(Instant, String)> = self
            .tasks
            .iter()
            .filter(|(_, e)| e.progress.is_complete())
            .map(|(id, e)| (e.touched, id.clone()))
            .collect();
        if completed.len() > self.capacity {
            completed.sort();
            let overflow = completed.len() - self.capacity;
            for (_, id) in completed.into_iter().take(overflow) {
                self.tasks.remove(&id);
                evicted.push(id);
            }
        }

        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "evicted completed tasks from registry");
        }
        evicted
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(256, Duration::from_secs(3600))
    }
}
