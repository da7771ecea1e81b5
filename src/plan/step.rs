//! 步骤描述：规划产出、执行器只读消费
//!
//! 动作词表是封闭的（navigate / search / search_google / extract / filter），
//! 无法识别的动作保留为 [`Step::Unrecognized`]，执行时不做任何事、不产出结果。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::SearchResult;

/// search 步骤未指定选择器时使用
pub const DEFAULT_SEARCH_SELECTOR: &str = "input[type='text']";
/// extract 步骤未指定选择器时使用
pub const DEFAULT_EXTRACT_SELECTOR: &str = "div";

/// 客户端过滤条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterCriteria {
    /// 最高价格（含）
    #[serde(default)]
    pub max_price: Option<f64>,
    /// 最低价格（含）
    #[serde(default)]
    pub min_price: Option<f64>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.max_price.is_none() && self.min_price.is_none()
    }

    /// 价格解析不出的条目保留
    pub fn accepts(&self, item: &SearchResult) -> bool {
        let Some(price) = item.price_value() else {
            return true;
        };
        self.max_price.map_or(true, |max| price <= max)
            && self.min_price.map_or(true, |min| price >= min)
    }

    /// 合并多个 filter 步骤：取更严格的约束
    pub fn merge(&mut self, other: &FilterCriteria) {
        self.max_price = match (self.max_price, other.max_price) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.min_price = match (self.min_price, other.min_price) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// 一个规划好的步骤
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// 加载 URL
    Navigate { url: String },
    /// 在页面输入框中搜索；query 为空时用原始任务文本
    Search {
        selector: String,
        query: Option<String>,
    },
    /// 调用网页搜索能力；query 为空时用原始任务文本
    SearchGoogle { query: Option<String> },
    /// 从当前页面抽取条目
    Extract { selector: String },
    /// 声明式过滤，由编排器在累积结果时应用
    Filter { criteria: FilterCriteria },
    /// 无法识别的动作
    Unrecognized { action: String },
}

impl Step {
    pub fn action_name(&self) -> &str {
        match self {
            Step::Navigate { .. } => "navigate",
            Step::Search { .. } => "search",
            Step::SearchGoogle { .. } => "search_google",
            Step::Extract { .. } => "extract",
            Step::Filter { .. } => "filter",
            Step::Unrecognized { action } => action,
        }
    }

    /// 是否会操作浏览会话
    pub fn needs_browser(&self) -> bool {
        matches!(
            self,
            Step::Navigate { .. } | Step::Search { .. } | Step::Extract { .. }
        )
    }

    /// 能产出或定位结果的步骤；filter 与未识别动作不算
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Step::Filter { .. } | Step::Unrecognized { .. })
    }

    /// 从 LLM 输出的宽松格式转换；缺少必需字段（如 navigate 无 url）时返回 None
    pub fn from_raw(raw: RawStep) -> Option<Step> {
        let action = raw.action.trim().to_lowercase();
        let text = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let step = match action.as_str() {
            "navigate" | "goto" | "open" => Step::Navigate {
                url: text(raw.url).or(text(raw.target))?,
            },
            "search" => {
                let selector = text(raw.selector);
                let on_web = raw
                    .platform
                    .as_deref()
                    .map(|p| matches!(p.to_lowercase().as_str(), "google" | "web"))
                    .unwrap_or(false);
                if on_web && selector.is_none() {
                    Step::SearchGoogle {
                        query: text(raw.query),
                    }
                } else {
                    Step::Search {
                        selector: selector.unwrap_or_else(|| DEFAULT_SEARCH_SELECTOR.to_string()),
                        query: text(raw.query),
                    }
                }
            }
            "search_google" | "google" | "web_search" => Step::SearchGoogle {
                query: text(raw.query).or(text(raw.target)),
            },
            "extract" => Step::Extract {
                selector: text(raw.selector)
                    .or(text(raw.target))
                    .unwrap_or_else(|| DEFAULT_EXTRACT_SELECTOR.to_string()),
            },
            "filter" => {
                let mut criteria = raw.criteria.unwrap_or_default();
                let on_price = raw
                    .field
                    .as_deref()
                    .map_or(true, |f| f.eq_ignore_ascii_case("price"));
                if on_price {
                    criteria.max_price = criteria.max_price.or(raw.max);
                    criteria.min_price = criteria.min_price.or(raw.min);
                }
                Step::Filter { criteria }
            }
            _ => Step::Unrecognized { action },
        };
        Some(step)
    }
}

/// LLM 输出的原始步骤（所有字段可选，宽松解析）
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RawStep {
    /// navigate | search | search_google | extract | filter
    pub action: String,
    /// navigate 的目标 URL
    pub url: Option<String>,
    /// search 的输入框 / extract 的条目 CSS 选择器
    pub selector: Option<String>,
    /// 搜索关键词
    pub query: Option<String>,
    /// 平台提示：google / facebook / amazon / craigslist ...
    pub platform: Option<String>,
    /// 通用目标（url / selector / query 的别名）
    pub target: Option<String>,
    /// filter 作用字段（目前只支持 price）
    pub field: Option<String>,
    /// filter 上限
    pub max: Option<f64>,
    /// filter 下限
    pub min: Option<f64>,
    /// filter 条件
    pub criteria: Option<FilterCriteria>,
}
