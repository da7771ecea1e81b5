//! Navigator 端到端测试（Mock 浏览器 / 搜索 / LLM）

use std::sync::Arc;
use std::time::Duration;

use navigator::core::{TaskProgress, TaskRegistry, TaskStatus};
use navigator::llm::MockLlmClient;
use navigator::plan::heuristics::MARKETPLACE_URL;
use navigator::tools::{MockBrowser, MockListing, MockSearch};
use navigator::NavigatorBuilder;
use tokio::sync::mpsc;

const TASK: &str = "find best laptop under $250 on Facebook Marketplace in San Jose";

fn marketplace_browser() -> Arc<MockBrowser> {
    Arc::new(MockBrowser::new(
        "about:blank",
        vec![
            MockListing::new("ThinkPad T480", "$220")
                .with_href("/marketplace/item/1")
                .with_location("San Jose, CA"),
            MockListing::new("MacBook Pro", "$1,100").with_href("/marketplace/item/2"),
            MockListing::new("", ""),
            MockListing::new("Dell Latitude", "$180").with_location("Santa Clara, CA"),
        ],
    ))
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<TaskProgress> {
    let mut snapshots = Vec::new();
    while let Ok(json) = rx.try_recv() {
        snapshots.push(serde_json::from_str(&json).unwrap());
    }
    snapshots
}

#[tokio::test]
async fn test_marketplace_run_end_to_end() {
    let browser = marketplace_browser();
    let llm = Arc::new(
        MockLlmClient::new()
            .fail("planner unavailable")
            .respond(r#"{"best_option": {"index": 2, "reason": "cheapest"}, "summary": "two laptops under budget"}"#),
    );
    let navigator = Arc::new(
        NavigatorBuilder::new()
            .with_browser(browser.clone())
            .with_llm(llm.clone())
            .politeness_delay(Duration::ZERO)
            .settle_delay(Duration::ZERO)
            .build(),
    );

    let (task_id, handle) = navigator.spawn_smart_search(TASK);
    let (tx, mut rx) = mpsc::unbounded_channel();
    navigator.subscribe(&task_id, tx).await;
    let progress = handle.await.unwrap();

    assert_eq!(progress.status, TaskStatus::Complete);
    assert_eq!(progress.total_steps, 4);
    assert_eq!(progress.current_step, 4);
    assert_eq!(browser.navigations(), vec![MARKETPLACE_URL]);
    assert_eq!(browser.typed(), vec!["laptop in san jose"]);

    let titles: Vec<_> = progress.found_items.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["ThinkPad T480", "Dell Latitude"]);
    assert_eq!(
        progress.found_items[0].link,
        "https://www.facebook.com/marketplace/item/1"
    );
    assert_eq!(
        progress.ai_analysis.get("summary"),
        Some(&serde_json::Value::from("two laptops under budget"))
    );
    assert!(llm.prompts()[1].contains("1. ThinkPad T480 - $220 - San Jose, CA"));

    let snapshots = drain(&mut rx);
    let mut statuses: Vec<TaskStatus> = snapshots.iter().map(|s| s.status).collect();
    assert!(statuses.windows(2).all(|w| w[0] <= w[1]));
    statuses.dedup();
    assert_eq!(
        statuses,
        vec![
            TaskStatus::Planning,
            TaskStatus::Searching,
            TaskStatus::Analyzing,
            TaskStatus::Complete
        ]
    );
    for snapshot in snapshots.iter().filter(|s| s.status >= TaskStatus::Searching) {
        assert!(snapshot.current_step <= snapshot.total_steps);
    }
    for pair in snapshots.windows(2) {
        assert!(pair[0].found_items.len() <= pair[1].found_items.len());
        assert!(pair[0].visited_sites.len() <= pair[1].visited_sites.len());
    }
}

#[tokio::test]
async fn test_late_subscriber_gets_terminal_snapshot_once() {
    let navigator = NavigatorBuilder::new()
        .with_search(Arc::new(MockSearch::new("one\ntwo")))
        .politeness_delay(Duration::ZERO)
        .build();
    let progress = navigator.execute_smart_search("laptop deals").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    navigator.subscribe(&progress.task_id, tx).await;

    let snapshots = drain(&mut rx);
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0], progress);
}

#[tokio::test]
async fn test_quick_search_parses_three_lines() {
    let long_line = format!("Laptop deal {}", "x".repeat(150));
    let text = format!(
        "🔍 **Search Results for 'laptop deals'** (Found 3 results)\n\n{}\nRefurbished ThinkPad $199\nI found more below\nChromebook clearance\n",
        long_line
    );
    let search = Arc::new(MockSearch::new(text));
    let navigator = NavigatorBuilder::new().with_search(search.clone()).build();

    let results = navigator.quick_search("laptop deals").await;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.title.chars().count() <= 100));
    assert_eq!(results[0].title.chars().count(), 100);
    assert_eq!(search.queries(), vec!["laptop deals"]);
    assert!(navigator.task("laptop deals").await.is_none());
}

#[tokio::test]
async fn test_generic_task_uses_web_search() {
    let search = Arc::new(MockSearch::new("result a\nresult b\nresult c"));
    let navigator = NavigatorBuilder::new()
        .with_search(search.clone())
        .politeness_delay(Duration::ZERO)
        .build();

    let progress = navigator.execute_smart_search("apartments for rent in NYC").await;
    assert_eq!(progress.total_steps, 2);
    assert_eq!(progress.found_items.len(), 3);
    assert_eq!(progress.visited_sites, vec!["google".to_string()]);
    assert!(progress.ai_analysis.is_empty());
    assert_eq!(search.queries(), vec!["apartments for rent in NYC"]);
}

#[tokio::test]
async fn test_failing_capabilities_still_complete() {
    let browser = Arc::new(
        MockBrowser::new("about:blank", vec![]).fail_navigation_to("https://www.amazon.com"),
    );
    let navigator = NavigatorBuilder::new()
        .with_browser(browser)
        .with_search(Arc::new(MockSearch::failing("quota exceeded")))
        .with_llm(Arc::new(MockLlmClient::new().respond("not a plan")))
        .politeness_delay(Duration::ZERO)
        .settle_delay(Duration::ZERO)
        .build();

    let progress = navigator.execute_smart_search("headphones on amazon").await;
    assert!(progress.is_complete());
    assert_eq!(progress.total_steps, 3);
    assert!(progress.found_items.is_empty());
    assert!(progress.visited_sites.is_empty());

    assert!(navigator.quick_search("headphones").await.is_empty());
}

fn navigate_event() -> String {
    format!("navigate:{}", MARKETPLACE_URL)
}

#[tokio::test]
async fn test_concurrent_runs_share_browser() {
    let browser = marketplace_browser();
    let navigator = Arc::new(
        NavigatorBuilder::new()
            .with_browser(browser.clone())
            .politeness_delay(Duration::from_millis(5))
            .settle_delay(Duration::ZERO)
            .build(),
    );
    let (id_a, a) = navigator.spawn_smart_search("laptop on marketplace");
    let (id_b, b) = navigator.spawn_smart_search("bike on marketplace");
    assert_ne!(id_a, id_b);

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a.is_complete() && b.is_complete());
    assert_eq!(a.found_items.len(), 3);
    assert_eq!(b.found_items.len(), 3);

    // 整次运行持锁：每次导航之后紧跟同一运行的输入
    let events = browser.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], navigate_event());
    assert_eq!(events[2], navigate_event());
    let mut typed = vec![events[1].clone(), events[3].clone()];
    typed.sort();
    assert_eq!(typed, vec!["type:bike", "type:laptop"]);
}

#[tokio::test]
async fn test_per_step_locking_interleaves_runs() {
    let browser = marketplace_browser();
    let navigator = Arc::new(
        NavigatorBuilder::new()
            .with_browser(browser.clone())
            .exclusive_runs(false)
            .politeness_delay(Duration::from_millis(5))
            .settle_delay(Duration::ZERO)
            .build(),
    );
    let (_, a) = navigator.spawn_smart_search("laptop on marketplace");
    let (_, b) = navigator.spawn_smart_search("bike on marketplace");

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a.is_complete() && b.is_complete());
    assert_eq!(a.found_items.len(), 3);
    assert_eq!(b.found_items.len(), 3);

    let events = browser.events();
    assert_eq!(events.len(), 4);
    assert_eq!(&events[..2], &[navigate_event(), navigate_event()]);
    let mut typed = browser.typed();
    typed.sort();
    assert_eq!(typed, vec!["bike", "laptop"]);
}

#[tokio::test]
async fn test_missing_search_input_still_extracts() {
    let browser = Arc::new(
        MockBrowser::new("about:blank", vec![MockListing::new("Road bike", "$150")])
            .without_search_input(),
    );
    let navigator = NavigatorBuilder::new()
        .with_browser(browser.clone())
        .politeness_delay(Duration::ZERO)
        .settle_delay(Duration::ZERO)
        .build();

    let progress = navigator.execute_smart_search("bike on marketplace").await;
    assert!(progress.is_complete());
    assert!(browser.typed().is_empty());
    assert_eq!(progress.found_items.len(), 1);
    assert_eq!(progress.found_items[0].title, "Road bike");
}

#[tokio::test]
async fn test_registry_evicts_completed_tasks() {
    let navigator = NavigatorBuilder::new()
        .registry(TaskRegistry::new(1, Duration::from_secs(3600)))
        .politeness_delay(Duration::ZERO)
        .build();

    let first = navigator.execute_smart_search("first task").await;
    let second = navigator.execute_smart_search("second task").await;

    assert!(navigator.task(&first.task_id).await.is_none());
    assert_eq!(navigator.task(&second.task_id).await, Some(second));
}
