//! 规划输出的 JSON Schema（写入 prompt，约束 LLM 输出格式）

use schemars::JsonSchema;
use serde::Deserialize;

use crate::plan::step::RawStep;

/// LLM 规划输出：`{"steps": [...]}`
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PlanDocument {
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

/// PlanDocument 的 schema（pretty JSON）
pub fn plan_schema_json() -> String {
    let schema = schemars::schema_for!(PlanDocument);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
