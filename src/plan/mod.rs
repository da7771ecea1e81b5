//! 规划与执行：步骤描述、规划器（LLM / 启发式）、步骤执行器、结果分析

pub mod analyzer;
pub mod executor;
pub mod heuristics;
pub mod parse;
pub mod planner;
pub mod schema;
pub mod step;

pub use analyzer::ResultAnalyzer;
pub use executor::{ExecutorSettings, StepExecutor, StepReport};
pub use heuristics::{extract_price, extract_query, heuristic_plan};
pub use parse::{make_absolute_url, parse_search_text};
pub use planner::Planner;
pub use step::{FilterCriteria, RawStep, Step};
