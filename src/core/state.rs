//! 结果模型：单条搜索结果与任务进度快照
//!
//! TaskProgress 是对外可见的运行状态；观察者收到的是其完整快照（非增量）。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 标题最大字符数
pub const MAX_TITLE_CHARS: usize = 200;

static PRICE_NUMBER: OnceLock<Regex> = OnceLock::new();

fn price_number() -> &'static Regex {
    PRICE_NUMBER.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("Invalid price regex"))
}

/// 按字符（非字节）截断
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// 当前时间（ISO-8601）
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// 生成任务 ID：创建时间戳 + 随机后缀（同一毫秒内并发创建也不冲突）
pub fn new_task_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "task_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

fn default_relevance() -> f32 {
    0.5
}

/// 一条搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    /// 绝对 URL，或空
    pub link: String,
    /// 来源（页面 URL 或搜索后端名）
    pub source: String,
    /// 原始价格文本（未归一化）
    pub price: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    /// 预留给排序使用，默认 0.5
    #[serde(default = "default_relevance")]
    pub relevance: f32,
    pub extracted_at: String,
}

impl SearchResult {
    pub fn new(title: &str, snippet: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: truncate_chars(title, MAX_TITLE_CHARS),
            snippet: snippet.into(),
            link: String::new(),
            source: source.into(),
            price: None,
            location: None,
            image_url: None,
            relevance: default_relevance(),
            extracted_at: now_iso(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_price(mut self, price: Option<String>) -> Self {
        self.price = price.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|u| !u.trim().is_empty());
        self
    }

    /// 标题或价格至少有一个非空
    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty() || self.price.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    /// 从价格文本中解析数值（"$1,299.99" → 1299.99），解析不出则 None
    pub fn price_value(&self) -> Option<f64> {
        let text = self.price.as_deref()?;
        let m = price_number().find(text)?;
        m.as_str().replace(',', "").parse().ok()
    }
}

/// 任务状态：只能向前推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Planning,
    Searching,
    Analyzing,
    Complete,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Planning => write!(f, "planning"),
            TaskStatus::Searching => write!(f, "searching"),
            TaskStatus::Analyzing => write!(f, "analyzing"),
            TaskStatus::Complete => write!(f, "complete"),
        }
    }
}

/// 一次编排运行的对外可见状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub task_id: String,
    pub status: TaskStatus,
    /// 从 1 开始；规划完成后恒有 current_step <= total_steps
    pub current_step: usize,
    pub total_steps: usize,
    /// 访问过的站点（只追加）
    pub visited_sites: Vec<String>,
    /// 累积结果（运行内只追加）
    pub found_items: Vec<SearchResult>,
    /// ResultAnalyzer 的输出，analyzing/complete 之前为空
    pub ai_analysis: Map<String, Value>,
    pub last_update: String,
}

impl TaskProgress {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Planning,
            current_step: 0,
            total_steps: 0,
            visited_sites: Vec::new(),
            found_items: Vec::new(),
            ai_analysis: Map::new(),
            last_update: now_iso(),
        }
    }

    /// 推进状态；目标状态不在当前状态之后时忽略并返回 false
    pub fn advance(&mut self, next: TaskStatus) -> bool {
        if next <= self.status {
            return false;
        }
        self.status = next;
        self.touch();
        true
    }

    pub fn set_total_steps(&mut self, total: usize) {
        self.total_steps = total;
        self.current_step = self.current_step.min(total);
        self.touch();
    }

    /// 进入第 step 步（1-based），不会超过 total_steps
    pub fn begin_step(&mut self, step: usize) {
        self.current_step = step.min(self.total_steps);
        self.touch();
    }

    pub fn record_visit(&mut self, site: impl Into<String>) {
        self.visited_sites.push(site.into());
        self.touch();
    }

    pub fn record_items(&mut self, items: impl IntoIterator<Item = SearchResult>) {
        self.found_items.extend(items);
        self.touch();
    }

    pub fn set_analysis(&mut self, analysis: Map<String, Value>) {
        self.ai_analysis = analysis;
        self.touch();
    }

    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Complete
    }

    fn touch(&mut self) {
        self.last_update = now_iso();
    }
}
