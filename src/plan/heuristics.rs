//! 启发式规划：无 LLM 或 LLM 失败时的确定性兜底
//!
//! 按任务文本中的平台关键词选择固定模板，保证至少有一个可执行步骤。

use std::sync::OnceLock;

use regex::Regex;

use crate::plan::step::{FilterCriteria, Step};

pub const MARKETPLACE_URL: &str = "https://www.facebook.com/marketplace";
pub const MARKETPLACE_SEARCH_SELECTOR: &str = "input[aria-label*='Search']";
pub const MARKETPLACE_ITEM_SELECTOR: &str = "[data-testid*='marketplace_feed_item']";

pub const AMAZON_URL: &str = "https://www.amazon.com";
pub const AMAZON_SEARCH_SELECTOR: &str = "#twotabsearchtextbox";
pub const AMAZON_ITEM_SELECTOR: &str = "[data-component-type='s-search-result']";

/// 网页搜索结果容器
pub const WEB_RESULT_SELECTOR: &str = "div.g";

/// 按长度降序，避免短词先匹配破坏长短语
const FILLER_PHRASES: &[&str] = &[
    "on facebook marketplace",
    "facebook marketplace",
    "on marketplace",
    "on facebook",
    "on amazon",
    "search for",
    "less than $",
    "look for",
    "marketplace",
    "facebook",
    "under $",
    "get me",
    "amazon",
    "cheap",
    "find",
    "best",
];

static PRICE_CLAUSE: OnceLock<Regex> = OnceLock::new();
static PRICE: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

/// "under $250" / "less than $1,200"，连同数字一起从查询中去掉
fn price_clause() -> &'static Regex {
    PRICE_CLAUSE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:under|less than)\s*\$\s*\d[\d,]*(?:\.\d+)?")
            .expect("Invalid price clause regex")
    })
}

fn price() -> &'static Regex {
    PRICE.get_or_init(|| Regex::new(r"\$(\d[\d,]*(?:\.\d+)?)").expect("Invalid price regex"))
}

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("Invalid whitespace regex"))
}

/// 从任务文本中去掉填充短语得到裸查询；结果为空时返回原任务文本
pub fn extract_query(task: &str) -> String {
    let mut query = price_clause().replace_all(&task.to_lowercase(), " ").into_owned();
    for phrase in FILLER_PHRASES {
        query = query.replace(phrase, " ");
    }
    let query = whitespace().replace_all(query.trim(), " ").into_owned();
    if query.is_empty() {
        task.trim().to_string()
    } else {
        query
    }
}

/// 第一个 `$<数字>` 作为价格上限
pub fn extract_price(task: &str) -> Option<f64> {
    price()
        .captures(task)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// 根据平台关键词生成固定步骤模板
pub fn heuristic_plan(task: &str) -> Vec<Step> {
    let lower = task.to_lowercase();

    if lower.contains("facebook") || lower.contains("marketplace") {
        vec![
            Step::Navigate {
                url: MARKETPLACE_URL.to_string(),
            },
            Step::Search {
                selector: MARKETPLACE_SEARCH_SELECTOR.to_string(),
                query: Some(extract_query(task)),
            },
            Step::Extract {
                selector: MARKETPLACE_ITEM_SELECTOR.to_string(),
            },
            Step::Filter {
                criteria: FilterCriteria {
                    max_price: extract_price(task),
                    min_price: None,
                },
            },
        ]
    } else if lower.contains("amazon") {
        vec![
            Step::Navigate {
                url: AMAZON_URL.to_string(),
            },
            Step::Search {
                selector: AMAZON_SEARCH_SELECTOR.to_string(),
                query: Some(extract_query(task)),
            },
            Step::Extract {
                selector: AMAZON_ITEM_SELECTOR.to_string(),
            },
        ]
    } else {
        vec![
            Step::SearchGoogle {
                query: Some(task.to_string()),
            },
            Step::Extract {
                selector: WEB_RESULT_SELECTOR.to_string(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK: &str = "find best laptop under $250 on Facebook Marketplace in San Jose";

    #[test]
    fn test_marketplace_plan() {
        let plan = heuristic_plan(TASK);
        assert_eq!(plan.len(), 4);
        assert_eq!(
            plan[0],
            Step::Navigate {
                url: MARKETPLACE_URL.to_string()
            }
        );
        assert_eq!(
            plan[3],
            Step::Filter {
                criteria: FilterCriteria {
                    max_price: Some(250.0),
                    min_price: None
                }
            }
        );
    }

    #[test]
    fn test_marketplace_keyword_alone() {
        assert_eq!(heuristic_plan("used bikes on MARKETPLACE").len(), 4);
    }

    #[test]
    fn test_amazon_plan() {
        let plan = heuristic_plan("Cheap headphones on Amazon");
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].action_name(), "navigate");
        assert_eq!(
            plan[1],
            Step::Search {
                selector: AMAZON_SEARCH_SELECTOR.to_string(),
                query: Some("headphones".to_string())
            }
        );
    }

    #[test]
    fn test_generic_plan() {
        let plan = heuristic_plan("apartments for rent in NYC");
        let actions: Vec<_> = plan.iter().map(|s| s.action_name()).collect();
        assert_eq!(actions, vec!["search_google", "extract"]);
    }

    #[test]
    fn test_extract_query_strips_fillers() {
        assert_eq!(extract_query(TASK), "laptop in san jose");
        assert_eq!(extract_query("camera less than $1,200.50 in austin"), "camera in austin");
    }

    #[test]
    fn test_extract_query_falls_back_to_task() {
        assert_eq!(extract_query("Find the best"), "the");
        assert_eq!(extract_query("find best"), "find best");
    }

    #[test]
    fn test_extract_price() {
        assert_eq!(extract_price(TASK), Some(250.0));
        assert_eq!(extract_price("between $1,200 and $1,500"), Some(1200.0));
        assert_eq!(extract_price("under $99.50"), Some(99.5));
        assert_eq!(extract_price("no budget"), None);
    }
}
