//! ResultAnalyzer：让 LLM 对结果做排序与总结
//!
//! 输出是模型给出的尽力而为的映射（best_option / price_range / recommendations / summary），
//! 调用方不能假设任何字段存在。失败时返回空映射。

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::core::{NavigatorError, SearchResult};
use crate::llm::{extract_json_block, LlmClient, Message};

/// 摘要中最多包含的结果数
pub const DIGEST_LIMIT: usize = 10;

pub struct ResultAnalyzer {
    llm: Option<Arc<dyn LlmClient>>,
    timeout: Duration,
}

impl ResultAnalyzer {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            llm,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn analyze(&self, results: &[SearchResult], task: &str) -> Map<String, Value> {
        let Some(llm) = &self.llm else {
            return Map::new();
        };
        if results.is_empty() {
            return Map::new();
        }

        match self.ask(llm.as_ref(), results, task).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(error = %e, "result analysis failed");
                Map::new()
            }
        }
    }

    async fn ask(
        &self,
        llm: &dyn LlmClient,
        results: &[SearchResult],
        task: &str,
    ) -> Result<Map<String, Value>, NavigatorError> {
        let prompt = format!(
            r#"Analyze these search results and provide recommendations.

Original Task: {task}

Results Found:
{digest}

Respond with JSON only, in this format:
{{
  "best_option": {{"index": 1, "reason": "why it's the best"}},
  "price_range": {{"min": 0, "max": 0}},
  "recommendations": ["rec1", "rec2"],
  "summary": "brief summary"
}}"#,
            task = task,
            digest = build_digest(results)
        );
        let output = tokio::time::timeout(self.timeout, llm.complete_json(&[Message::user(prompt)]))
            .await
            .map_err(|_| NavigatorError::LlmTimeout(self.timeout.as_secs()))?
            .map_err(NavigatorError::LlmError)?;
        parse_analysis(&output)
    }
}

/// 结果摘要：`i. title - price - location`，最多 DIGEST_LIMIT 行
pub fn build_digest(results: &[SearchResult]) -> String {
    results
        .iter()
        .take(DIGEST_LIMIT)
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. {} - {} - {}",
                i + 1,
                r.title,
                r.price.as_deref().unwrap_or("N/A"),
                r.location.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 只接受 JSON 对象
pub fn parse_analysis(output: &str) -> Result<Map<String, Value>, NavigatorError> {
    let json = extract_json_block(output)
        .ok_or_else(|| NavigatorError::JsonParseError(format!("no JSON in: {}", output)))?;
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(NavigatorError::JsonParseError(format!(
            "expected object, got: {}",
            other
        ))),
        Err(e) => Err(NavigatorError::JsonParseError(format!("{}: {}", e, json))),
    }
}
