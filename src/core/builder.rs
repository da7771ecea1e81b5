//! Navigator 构建器
//!
//! 显式组装：浏览会话、网页搜索、规划 / 分析模型都由调用方注入，缺失的能力按降级路径运行。
//! `from_config` 按配置获取这些能力（启动 Chrome、创建 LLM 客户端），任何一项失败都只记录警告。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::core::broadcast::ProgressBroadcaster;
use crate::core::orchestrator::Navigator;
use crate::core::registry::TaskRegistry;
use crate::llm::{create_llm_from_config, LlmClient};
use crate::plan::{ExecutorSettings, Planner, ResultAnalyzer, StepExecutor};
use crate::tools::{BrowserSession, GoogleSearch, WebSearch};

pub struct NavigatorBuilder {
    llm: Option<Arc<dyn LlmClient>>,
    analysis_llm: Option<Arc<dyn LlmClient>>,
    search: Option<Arc<dyn WebSearch>>,
    browser: Option<Arc<dyn BrowserSession>>,
    registry: TaskRegistry,
    settings: ExecutorSettings,
    politeness_delay: Duration,
    exclusive_runs: bool,
    llm_timeout: Duration,
}

impl Default for NavigatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigatorBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            analysis_llm: None,
            search: None,
            browser: None,
            registry: TaskRegistry::default(),
            settings: ExecutorSettings::default(),
            politeness_delay: Duration::from_secs(1),
            exclusive_runs: true,
            llm_timeout: Duration::from_secs(60),
        }
    }

    /// 规划模型；未单独设置分析模型时也用于分析
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_analysis_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.analysis_llm = Some(llm);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserSession>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// 步骤之间的固定间隔
    pub fn politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    /// search 提交后的等待
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settings.settle_delay = delay;
        self
    }

    /// 共享浏览会话时是否让整次运行独占浏览器
    pub fn exclusive_runs(mut self, exclusive: bool) -> Self {
        self.exclusive_runs = exclusive;
        self
    }

    pub fn registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn max_extract_items(mut self, max: usize) -> Self {
        self.settings.max_extract_items = max;
        self
    }

    pub fn max_search_results(mut self, max: usize) -> Self {
        self.settings.max_search_results = max;
        self
    }

    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    /// 按配置获取外部能力
    pub async fn from_config(config: &AppConfig) -> Self {
        let mut builder = Self::new()
            .politeness_delay(Duration::from_millis(config.orchestrator.politeness_delay_ms))
            .settle_delay(Duration::from_millis(config.browser.settle_ms))
            .exclusive_runs(config.browser.exclusive_runs)
            .registry(TaskRegistry::new(
                config.registry.capacity,
                config.registry.ttl(),
            ))
            .max_extract_items(config.orchestrator.max_extract_items)
            .max_search_results(config.orchestrator.max_search_results)
            .llm_timeout(Duration::from_secs(config.llm.request_timeout_secs));

        if let Some(llm) = create_llm_from_config(&config.llm, config.llm.planning_model.as_deref())
        {
            builder = builder.with_llm(llm);
        }
        if let Some(model) = config.llm.analysis_model.as_deref() {
            if let Some(llm) = create_llm_from_config(&config.llm, Some(model)) {
                builder = builder.with_analysis_llm(llm);
            }
        }

        let search = GoogleSearch::new(&config.search);
        if search.is_configured() {
            builder = builder.with_search(Arc::new(search));
        } else {
            tracing::warn!("Google search not configured (GOOGLE_SEARCH_API_KEY / GOOGLE_SEARCH_ENGINE_ID), web search disabled");
        }

        if config.browser.enabled {
            builder = builder.launch_browser(config).await;
        }
        builder
    }

    #[cfg(feature = "browser")]
    async fn launch_browser(self, config: &AppConfig) -> Self {
        let timeout = Duration::from_secs(config.browser.timeout_secs);
        match crate::tools::ChromeSession::launch(config.browser.headless, timeout).await {
            Ok(session) => self.with_browser(Arc::new(session)),
            Err(e) => {
                tracing::warn!(error = %e, "browser unavailable, page steps will be skipped");
                self
            }
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn launch_browser(self, _config: &AppConfig) -> Self {
        tracing::warn!("built without the `browser` feature, page steps will be skipped");
        self
    }

    pub fn build(self) -> Navigator {
        let analysis_llm = self.analysis_llm.or_else(|| self.llm.clone());
        Navigator {
            planner: Planner::new(self.llm).with_timeout(self.llm_timeout),
            executor: StepExecutor::new(self.browser.clone(), self.search, self.settings),
            analyzer: ResultAnalyzer::new(analysis_llm).with_timeout(self.llm_timeout),
            broadcaster: Arc::new(ProgressBroadcaster::new(self.registry)),
            browser: self.browser,
            browser_lock: Mutex::new(()),
            exclusive_runs: self.exclusive_runs,
            politeness_delay: self.politeness_delay,
        }
    }
}

impl Navigator {
    /// 按配置构建（显式启动：获取浏览会话与模型客户端）
    pub async fn from_config(config: &AppConfig) -> Navigator {
        NavigatorBuilder::from_config(config).await.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::{MockBrowser, MockSearch};

    #[test]
    fn test_capabilities_reflect_injected_parts() {
        let navigator = NavigatorBuilder::new()
            .with_browser(Arc::new(MockBrowser::new("about:blank", vec![])))
            .with_search(Arc::new(MockSearch::new("")))
            .with_llm(Arc::new(MockLlmClient::new()))
            .build();
        let caps = navigator.capabilities();
        assert!(caps.browser && caps.web_search && caps.planning_model && caps.analysis_model);

        let bare = NavigatorBuilder::new().build().capabilities();
        assert!(!bare.browser && !bare.web_search && !bare.planning_model && !bare.analysis_model);
    }

    #[test]
    fn test_analysis_model_alone() {
        let navigator = NavigatorBuilder::new()
            .with_analysis_llm(Arc::new(MockLlmClient::new()))
            .build();
        let caps = navigator.capabilities();
        assert!(!caps.planning_model);
        assert!(caps.analysis_model);
    }
}
