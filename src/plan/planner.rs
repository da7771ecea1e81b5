//! Planner：任务文本 → 有序步骤
//!
//! 有 LLM 时让模型按 schema 输出 `{"steps": [...]}`；模型缺席、调用失败、超时或输出为空/畸形时
//! 一律退回 [`heuristic_plan`]。`plan` 本身从不返回错误。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::core::NavigatorError;
use crate::llm::{extract_json_block, LlmClient, Message};
use crate::plan::heuristics::heuristic_plan;
use crate::plan::schema::plan_schema_json;
use crate::plan::step::{RawStep, Step};

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are a web navigation planner. \
Break a shopping or search task into concrete browser steps. Respond with JSON only.";

pub struct Planner {
    llm: Option<Arc<dyn LlmClient>>,
    timeout: Duration,
}

impl Planner {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            llm,
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_model(&self) -> bool {
        self.llm.is_some()
    }

    /// 规划任务；保证返回至少一个步骤
    pub async fn plan(&self, task: &str) -> Vec<Step> {
        let Some(llm) = &self.llm else {
            tracing::debug!("no planning model, using heuristic plan");
            return heuristic_plan(task);
        };

        match self.plan_with_model(llm.as_ref(), task).await {
            Ok(steps) if steps.iter().any(Step::is_actionable) => {
                tracing::info!(steps = steps.len(), "model plan ready");
                steps
            }
            Ok(steps) => {
                tracing::warn!(
                    steps = steps.len(),
                    "model plan has no actionable step, using heuristic plan"
                );
                heuristic_plan(task)
            }
            Err(e) => {
                tracing::warn!(error = %e, "model planning failed, using heuristic plan");
                heuristic_plan(task)
            }
        }
    }

    async fn plan_with_model(
        &self,
        llm: &dyn LlmClient,
        task: &str,
    ) -> Result<Vec<Step>, NavigatorError> {
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(build_prompt(task)),
        ];
        let output = tokio::time::timeout(self.timeout, llm.complete_json(&messages))
            .await
            .map_err(|_| NavigatorError::LlmTimeout(self.timeout.as_secs()))?
            .map_err(NavigatorError::LlmError)?;
        parse_plan(&output)
    }
}

/// 规划 prompt：动作词表、平台提示与输出 schema
pub fn build_prompt(task: &str) -> String {
    format!(
        r##"Break this search task into specific web navigation steps.
Task: {task}

Allowed actions:
- navigate: open "url"
- search: type "query" into the input matching "selector" and press Enter; set "platform": "google" to use web search instead
- search_google: run a web search for "query"
- extract: collect listings matching "selector" from the current page
- filter: keep items within "criteria" (max_price / min_price)

Choose platforms based on the task (google, facebook marketplace, amazon, craigslist, etc.).

Return a JSON object matching this schema:
{schema}

Example:
{{"steps": [
  {{"action": "navigate", "url": "https://www.amazon.com"}},
  {{"action": "search", "selector": "#twotabsearchtextbox", "query": "laptop"}},
  {{"action": "extract", "selector": "[data-component-type='s-search-result']"}},
  {{"action": "filter", "criteria": {{"max_price": 250}}}}
]}}"##,
        task = task,
        schema = plan_schema_json()
    )
}

/// 解析模型输出：接受 `{"steps": [...]}` 或裸数组；单个无效步骤跳过
pub fn parse_plan(output: &str) -> Result<Vec<Step>, NavigatorError> {
    let json = extract_json_block(output)
        .ok_or_else(|| NavigatorError::JsonParseError(format!("no JSON in: {}", output)))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| NavigatorError::JsonParseError(format!("{}: {}", e, json)))?;

    let raw_steps = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("steps") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    Ok(raw_steps
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawStep>(item) {
            Ok(raw) => Step::from_raw(raw),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed step");
                None
            }
        })
        .collect())
}
