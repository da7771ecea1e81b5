//! Navigator：任务编排主循环
//!
//! 一次运行：planning → searching →（analyzing）→ complete。没有错误状态：
//! 规划失败走启发式，步骤失败视为零结果，分析失败得到空映射。每次状态变更都把完整快照发布给观察者。
//!
//! 同一次运行内的步骤严格串行。多个运行共享同一个浏览会话时，`exclusive_runs = true` 会在整次运行期间
//! 持有浏览器锁（运行之间互不穿插）；为 false 时只按步骤加锁，并发运行的步骤会在同一页面上交错，
//! 导航状态可能被其他运行改写。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::core::broadcast::{ObserverId, ObserverSender, ProgressBroadcaster};
use crate::core::state::{new_task_id, SearchResult, TaskProgress, TaskStatus};
use crate::plan::{FilterCriteria, Planner, ResultAnalyzer, Step, StepExecutor};
use crate::tools::BrowserSession;

/// 当前可用的外部能力
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capabilities {
    pub browser: bool,
    pub web_search: bool,
    pub planning_model: bool,
    pub analysis_model: bool,
}

pub struct Navigator {
    pub(crate) planner: Planner,
    pub(crate) executor: StepExecutor,
    pub(crate) analyzer: ResultAnalyzer,
    pub(crate) broadcaster: Arc<ProgressBroadcaster>,
    pub(crate) browser: Option<Arc<dyn BrowserSession>>,
    pub(crate) browser_lock: Mutex<()>,
    pub(crate) exclusive_runs: bool,
    pub(crate) politeness_delay: Duration,
}

/// 收集计划中所有 filter 步骤的条件
fn collect_filter(steps: &[Step]) -> FilterCriteria {
    let mut criteria = FilterCriteria::default();
    for step in steps {
        if let Step::Filter { criteria: c } = step {
            criteria.merge(c);
        }
    }
    criteria
}

impl Navigator {
    /// 运行任务直至完成，返回最终快照
    pub async fn execute_smart_search(&self, task: &str) -> TaskProgress {
        self.run(new_task_id(), task).await
    }

    /// task_id 只来自 new_task_id，每次运行唯一
    async fn run(&self, task_id: String, task: &str) -> TaskProgress {
        let mut progress = TaskProgress::new(task_id);
        tracing::info!(task_id = %progress.task_id, task, "task started");
        self.broadcaster.publish(&progress).await;

        let steps = self.planner.plan(task).await;
        let filter = collect_filter(&steps);
        progress.set_total_steps(steps.len());
        progress.advance(TaskStatus::Searching);
        tracing::info!(
            task_id = %progress.task_id,
            steps = steps.len(),
            filter = !filter.is_empty(),
            "plan ready"
        );
        self.broadcaster.publish(&progress).await;

        let run_guard = if self.exclusive_runs && self.browser.is_some() {
            Some(self.browser_lock.lock().await)
        } else {
            None
        };

        for (i, step) in steps.iter().enumerate() {
            progress.begin_step(i + 1);
            self.broadcaster.publish(&progress).await;

            let report = {
                let _step_guard = if run_guard.is_none()
                    && self.browser.is_some()
                    && step.needs_browser()
                {
                    Some(self.browser_lock.lock().await)
                } else {
                    None
                };
                self.executor.execute(step, task).await
            };

            let produced = report.results.len();
            if produced > 0 {
                let kept: Vec<SearchResult> = report
                    .results
                    .into_iter()
                    .filter(|item| filter.accepts(item))
                    .collect();
                tracing::debug!(
                    task_id = %progress.task_id,
                    step = i + 1,
                    produced,
                    kept = kept.len(),
                    "step results"
                );
                progress.record_items(kept);
            }
            if let Some(site) = report.site {
                progress.record_visit(site);
            }
            self.broadcaster.publish(&progress).await;

            if i + 1 < steps.len() && !self.politeness_delay.is_zero() {
                tokio::time::sleep(self.politeness_delay).await;
            }
        }
        drop(run_guard);

        if !progress.found_items.is_empty() && self.analyzer.is_available() {
            progress.advance(TaskStatus::Analyzing);
            self.broadcaster.publish(&progress).await;
            let analysis = self.analyzer.analyze(&progress.found_items, task).await;
            progress.set_analysis(analysis);
        }

        progress.advance(TaskStatus::Complete);
        self.broadcaster.publish(&progress).await;
        tracing::info!(
            task_id = %progress.task_id,
            items = progress.found_items.len(),
            sites = progress.visited_sites.len(),
            "task complete"
        );
        progress
    }

    /// 在后台运行任务，立即返回 task_id
    pub fn spawn_smart_search(
        self: &Arc<Self>,
        task: impl Into<String>,
    ) -> (String, JoinHandle<TaskProgress>) {
        let task_id = new_task_id();
        let task = task.into();
        let navigator = Arc::clone(self);
        let id = task_id.clone();
        let handle = tokio::spawn(async move { navigator.run(id, &task).await });
        (task_id, handle)
    }

    /// 直接调用网页搜索，不登记任务、不广播进度；失败返回空
    pub async fn quick_search(&self, query: &str) -> Vec<SearchResult> {
        match self.executor.search_web(query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(query, error = %e, "quick search failed");
                Vec::new()
            }
        }
    }

    pub async fn subscribe(&self, task_id: &str, observer: ObserverSender) -> ObserverId {
        self.broadcaster.subscribe(task_id, observer).await
    }

    pub async fn unsubscribe(&self, task_id: &str, observer: ObserverId) -> bool {
        self.broadcaster.unsubscribe(task_id, observer).await
    }

    /// 任务最新快照
    pub async fn task(&self, task_id: &str) -> Option<TaskProgress> {
        self.broadcaster.snapshot(task_id).await
    }

    pub fn broadcaster(&self) -> Arc<ProgressBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            browser: self.executor.has_browser(),
            web_search: self.executor.has_search(),
            planning_model: self.planner.has_model(),
            analysis_model: self.analyzer.is_available(),
        }
    }

    /// 释放浏览会话；等待正在运行的任务让出浏览器
    pub async fn shutdown(&self) {
        let Some(browser) = &self.browser else {
            return;
        };
        let _guard = self.browser_lock.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "browser close failed");
        }
        tracing::info!("navigator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NavigatorBuilder;
    use crate::tools::{MockBrowser, MockListing, MockSearch};
    use tokio::sync::mpsc;

    #[test]
    fn test_collect_filter_merges() {
        let steps = vec![
            Step::Filter {
                criteria: FilterCriteria {
                    max_price: Some(300.0),
                    min_price: None,
                },
            },
            Step::Extract {
                selector: "div".into(),
            },
            Step::Filter {
                criteria: FilterCriteria {
                    max_price: Some(250.0),
                    min_price: None,
                },
            },
        ];
        assert_eq!(collect_filter(&steps).max_price, Some(250.0));
    }

    #[tokio::test]
    async fn test_no_capabilities_still_completes() {
        let navigator = NavigatorBuilder::new().politeness_delay(Duration::ZERO).build();
        let progress = navigator.execute_smart_search("laptop deals").await;
        assert!(progress.is_complete());
        assert_eq!(progress.total_steps, 2);
        assert_eq!(progress.current_step, 2);
        assert!(progress.found_items.is_empty());
        assert!(progress.ai_analysis.is_empty());
        assert_eq!(navigator.task(&progress.task_id).await, Some(progress));
    }

    #[tokio::test]
    async fn test_marketplace_run_filters_by_price() {
        let browser = Arc::new(MockBrowser::new(
            "about:blank",
            vec![
                MockListing::new("ThinkPad", "$200"),
                MockListing::new("MacBook", "$900"),
                MockListing::new("Chromebook", "Free"),
            ],
        ));
        let navigator = NavigatorBuilder::new()
            .with_browser(browser.clone())
            .politeness_delay(Duration::ZERO)
            .settle_delay(Duration::ZERO)
            .build();

        let progress = navigator
            .execute_smart_search("find laptop under $250 on facebook marketplace")
            .await;
        let titles: Vec<_> = progress.found_items.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["ThinkPad", "Chromebook"]);
        assert_eq!(browser.typed(), vec!["laptop"]);
        assert_eq!(
            progress.visited_sites,
            vec![
                "https://www.facebook.com/marketplace".to_string(),
                "https://www.facebook.com/marketplace".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_spawned_run_is_observable() {
        let search = Arc::new(MockSearch::new("one\ntwo"));
        let navigator = Arc::new(
            NavigatorBuilder::new()
                .with_search(search)
                .politeness_delay(Duration::ZERO)
                .build(),
        );
        let (task_id, handle) = navigator.spawn_smart_search("laptop deals");
        let (tx, mut rx) = mpsc::unbounded_channel();
        navigator.subscribe(&task_id, tx).await;

        let progress = handle.await.unwrap();
        assert_eq!(progress.task_id, task_id);
        assert_eq!(progress.found_items.len(), 2);

        let mut last = None;
        while let Ok(json) = rx.try_recv() {
            last = Some(json);
        }
        let last: TaskProgress = serde_json::from_str(&last.unwrap()).unwrap();
        assert!(last.is_complete());
    }

    #[tokio::test]
    async fn test_spawned_runs_get_fresh_ids_and_monotonic_status() {
        let navigator = Arc::new(
            NavigatorBuilder::new()
                .with_search(Arc::new(MockSearch::new("one")))
                .politeness_delay(Duration::ZERO)
                .build(),
        );
        let mut runs = Vec::new();
        for _ in 0..3 {
            let (task_id, handle) = navigator.spawn_smart_search("laptop deals");
            let (tx, rx) = mpsc::unbounded_channel();
            navigator.subscribe(&task_id, tx).await;
            runs.push((task_id, handle, rx));
        }
        let mut ids: Vec<_> = runs.iter().map(|(id, _, _)| id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        for (task_id, handle, mut rx) in runs {
            handle.await.unwrap();
            let mut statuses = Vec::new();
            while let Ok(json) = rx.try_recv() {
                let snapshot: TaskProgress = serde_json::from_str(&json).unwrap();
                assert_eq!(snapshot.task_id, task_id);
                statuses.push(snapshot.status);
            }
            assert!(statuses.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(statuses.last(), Some(&TaskStatus::Complete));
        }
    }

    #[tokio::test]
    async fn test_quick_search_without_backend_is_empty() {
        let navigator = NavigatorBuilder::new().build();
        assert!(navigator.quick_search("anything").await.is_empty());
        assert!(!navigator.capabilities().web_search);
    }
}
