//! 网页搜索能力：Google Custom Search JSON API
//!
//! 返回人类可读的文本块（而非结构化数据），调用方按行启发式解析：
//!
//! ```text
//! 🔍 **Search Results for 'laptop deals'** (Found 1200 results)
//!
//! 1. **Title**
//!    📍 example.com
//!    📝 snippet
//!
//! 📅 *Results limited to last month*
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SearchSection;
use crate::core::SearchError;

/// 网页搜索能力：query → 文本块
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, SearchError>;
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
    #[serde(rename = "searchInformation", default)]
    search_information: Option<CseInfo>,
}

#[derive(Debug, Deserialize)]
struct CseInfo {
    #[serde(rename = "totalResults", default)]
    total_results: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    #[serde(rename = "displayLink")]
    display_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CseErrorBody {
    error: Option<CseErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct CseErrorDetail {
    message: Option<String>,
}

/// 把 API 结果渲染成文本块
fn render_results(query: &str, total: &str, items: &[CseItem], date_restricted: bool) -> String {
    if items.is_empty() {
        return "🔍 No recent results found. Try a different search query.".to_string();
    }

    let entries: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let title = item.title.as_deref().unwrap_or("No title");
            let link = item.link.as_deref().unwrap_or("No link");
            let display = item.display_link.as_deref().unwrap_or(link);
            let snippet = item
                .snippet
                .as_deref()
                .unwrap_or("No description")
                .replace('\n', " ");
            format!("{}. **{}**\n   📍 {}\n   📝 {}\n", i + 1, title, display, snippet)
        })
        .collect();

    let mut out = format!(
        "🔍 **Search Results for '{}'** (Found {} results)\n\n{}",
        query,
        total,
        entries.join("\n")
    );
    if date_restricted {
        out.push_str("\n📅 *Results limited to last month*");
    }
    out
}

/// Google Custom Search 客户端；未配置 key 或 engine id 时返回 NotConfigured
pub struct GoogleSearch {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    engine_id: Option<String>,
    num_results: u32,
    date_restrict: Option<String>,
}

impl GoogleSearch {
    pub fn new(settings: &SearchSection) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.resolved_api_key(),
            engine_id: settings.resolved_engine_id(),
            num_results: settings.num_results,
            date_restrict: settings.date_restrict.clone().filter(|d| !d.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.engine_id.is_some()
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    async fn search(&self, query: &str) -> Result<String, SearchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SearchError::NotConfigured("missing Google Search API key".into()))?;
        let engine_id = self
            .engine_id
            .as_deref()
            .ok_or_else(|| SearchError::NotConfigured("missing Search Engine ID".into()))?;

        tracing::info!(query, "web search");

        let num = self.num_results.to_string();
        let mut params = vec![
            ("key", api_key),
            ("cx", engine_id),
            ("q", query),
            ("num", num.as_str()),
        ];
        if let Some(ref restrict) = self.date_restrict {
            params.push(("dateRestrict", restrict.as_str()));
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CseErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(SearchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let data: CseResponse = resp
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        let total = data
            .search_information
            .and_then(|i| i.total_results)
            .unwrap_or_else(|| "0".to_string());

        Ok(render_results(
            query,
            &total,
            &data.items,
            self.date_restrict.is_some(),
        ))
    }
}
