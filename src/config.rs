//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NAVIGATOR__*` 覆盖（双下划线表示嵌套，如 `NAVIGATOR__LLM__PROVIDER=openai`）。
//! API Key 不写入配置文件：LLM 使用 `DEEPSEEK_API_KEY` / `OPENAI_API_KEY`，搜索使用 `GOOGLE_SEARCH_API_KEY` / `GOOGLE_SEARCH_ENGINE_ID`。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub search: SearchSection,
    pub browser: BrowserSection,
    pub orchestrator: OrchestratorSection,
    pub registry: RegistrySection,
    pub gateway: GatewaySection,
    pub web: WebSection,
}

/// [llm] 段：后端选择、规划/分析模型与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai；无对应 API Key 时不启用 LLM（走启发式规划）
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 规划用模型，未设置时用 model
    pub planning_model: Option<String>,
    /// 结果分析用模型（可用更便宜的模型），未设置时用 model
    pub analysis_model: Option<String>,
    /// 单次 LLM 请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            planning_model: None,
            analysis_model: None,
            request_timeout_secs: 60,
        }
    }
}

/// [search] 段：Google Custom Search JSON API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    /// 每次请求的结果条数
    pub num_results: u32,
    /// 时间范围限制（如 m1 = 最近一个月），为空则不限制
    pub date_restrict: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key: None,
            engine_id: None,
            num_results: 3,
            date_restrict: Some("m1".to_string()),
            timeout_secs: 15,
        }
    }
}

impl SearchSection {
    /// 配置值优先，其次环境变量 GOOGLE_SEARCH_API_KEY
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GOOGLE_SEARCH_API_KEY").ok())
    }

    /// 配置值优先，其次环境变量 GOOGLE_SEARCH_ENGINE_ID
    pub fn resolved_engine_id(&self) -> Option<String> {
        self.engine_id
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GOOGLE_SEARCH_ENGINE_ID").ok())
    }
}

/// [browser] 段：是否启动 Headless Chrome、会话串行策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub enabled: bool,
    pub headless: bool,
    /// true：一次运行独占浏览器会话直到所有步骤结束；false：仅按步骤加锁（并发任务会交错操作同一页面）
    pub exclusive_runs: bool,
    /// search 步骤提交后的等待时间（毫秒）
    pub settle_ms: u64,
    pub timeout_secs: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            exclusive_runs: true,
            settle_ms: 2000,
            timeout_secs: 30,
        }
    }
}

/// [orchestrator] 段：步骤间礼貌延迟与抽取上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub politeness_delay_ms: u64,
    pub max_extract_items: usize,
    pub max_search_results: usize,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            politeness_delay_ms: 1000,
            max_extract_items: 10,
            max_search_results: 5,
        }
    }
}

/// [registry] 段：已完成任务的保留数量与时长
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_secs: 3600,
        }
    }
}

impl RegistrySection {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// [gateway] 段：WebSocket 监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub bind_addr: String,
    pub max_connections: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".to_string(),
            max_connections: 1000,
        }
    }
}

/// [web] 段：HTTP API 监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub bind_addr: String,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 NAVIGATOR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NAVIGATOR__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NAVIGATOR")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.orchestrator.politeness_delay_ms, 1000);
        assert_eq!(cfg.orchestrator.max_extract_items, 10);
        assert_eq!(cfg.orchestrator.max_search_results, 5);
        assert!(cfg.browser.exclusive_runs);
        assert_eq!(cfg.search.num_results, 3);
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navigator.toml");
        std::fs::write(
            &path,
            r#"
[orchestrator]
politeness_delay_ms = 0

[registry]
capacity = 8

[browser]
enabled = false
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.orchestrator.politeness_delay_ms, 0);
        assert_eq!(cfg.orchestrator.max_extract_items, 10);
        assert_eq!(cfg.registry.capacity, 8);
        assert!(!cfg.browser.enabled);
    }

    #[test]
    fn test_search_key_from_config_wins() {
        let section = SearchSection {
            api_key: Some("cfg-key".to_string()),
            ..SearchSection::default()
        };
        assert_eq!(section.resolved_api_key().as_deref(), Some("cfg-key"));
    }
}
