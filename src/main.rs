//! Navigator 命令行
//!
//! ```text
//! navigator [--config <path>] [--quick] <task...>
//! ```
//!
//! 运行一次任务，进度写日志，最终快照（或 --quick 的结果列表）以 JSON 打印到 stdout。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use navigator::config::load_config;
use navigator::core::TaskProgress;
use navigator::{observability, Navigator};
use tokio::sync::mpsc;

const USAGE: &str = "usage: navigator [--config <path>] [--quick] <task...>";

struct CliArgs {
    config: Option<PathBuf>,
    quick: bool,
    task: String,
}

fn parse_args(args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut config = None;
    let mut quick = false;
    let mut words = Vec::new();
    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--quick" | "-q" => quick = true,
            "--config" | "-c" => {
                config = Some(PathBuf::from(args.next().context(USAGE)?));
            }
            "--help" | "-h" => anyhow::bail!(USAGE),
            _ => words.push(arg),
        }
    }
    let task = words.join(" ").trim().to_string();
    if task.is_empty() {
        anyhow::bail!(USAGE);
    }
    Ok(CliArgs {
        config,
        quick,
        task,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(args.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });

    let navigator = Arc::new(Navigator::from_config(&config).await);

    if args.quick {
        let results = navigator.quick_search(&args.task).await;
        println!("{}", serde_json::to_string_pretty(&results)?);
        navigator.shutdown().await;
        return Ok(());
    }

    let (task_id, handle) = navigator.spawn_smart_search(args.task.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    navigator.subscribe(&task_id, tx).await;

    let progress_log = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            let Ok(snapshot) = serde_json::from_str::<TaskProgress>(&json) else {
                continue;
            };
            tracing::info!(
                status = %snapshot.status,
                step = snapshot.current_step,
                total = snapshot.total_steps,
                items = snapshot.found_items.len(),
                "progress"
            );
            if snapshot.is_complete() {
                break;
            }
        }
    });

    let progress = handle.await.context("search task panicked")?;
    let _ = progress_log.await;
    println!("{}", serde_json::to_string_pretty(&progress)?);

    navigator.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_task_and_flags() {
        let cli = parse_args(args(&["--quick", "laptop", "deals", "-c", "my.toml"])).unwrap();
        assert!(cli.quick);
        assert_eq!(cli.task, "laptop deals");
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
    }

    #[test]
    fn test_parse_requires_task() {
        assert!(parse_args(args(&["--quick"])).is_err());
        assert!(parse_args(args(&["--config"])).is_err());
    }
}
