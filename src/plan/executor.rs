//! StepExecutor：把一个步骤作用于浏览会话 / 网页搜索
//!
//! `execute` 从不返回错误：任何失败都在此捕获、记录日志并视为零结果，坏步骤不会中断整次运行。
//! 单个元素的抽取失败只影响该元素。

use std::sync::Arc;
use std::time::Duration;

use crate::core::{BrowserError, NavigatorError, SearchResult};
use crate::plan::parse::{make_absolute_url, parse_search_text};
use crate::plan::step::Step;
use crate::tools::{BrowserSession, ElementRef, WebSearch};

const TITLE_PROBE: &str = "h1, h2, h3, [class*='title'], [class*='name']";
const PRICE_PROBE: &str = "[class*='price'], .price, span[class*='currency']";
const LOCATION_PROBE: &str = "[class*='location'], [class*='address']";

/// 一个步骤的执行结果
#[derive(Debug, Default)]
pub struct StepReport {
    pub results: Vec<SearchResult>,
    /// 步骤触及的站点（导航成功的 URL、抽取时的页面 URL 或 "google"）
    pub site: Option<String>,
}

impl StepReport {
    fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// search 提交后等待页面稳定
    pub settle_delay: Duration,
    pub max_extract_items: usize,
    pub max_search_results: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            max_extract_items: 10,
            max_search_results: 5,
        }
    }
}

pub struct StepExecutor {
    browser: Option<Arc<dyn BrowserSession>>,
    search: Option<Arc<dyn WebSearch>>,
    settings: ExecutorSettings,
}

impl StepExecutor {
    pub fn new(
        browser: Option<Arc<dyn BrowserSession>>,
        search: Option<Arc<dyn WebSearch>>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            browser,
            search,
            settings,
        }
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    /// 执行一个步骤；失败视为零结果
    pub async fn execute(&self, step: &Step, original_task: &str) -> StepReport {
        match self.try_execute(step, original_task).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(action = step.action_name(), error = %e, "step failed, skipping");
                StepReport::empty()
            }
        }
    }

    async fn try_execute(
        &self,
        step: &Step,
        original_task: &str,
    ) -> Result<StepReport, NavigatorError> {
        match step {
            Step::Navigate { url } => {
                let browser = self.browser()?;
                browser.navigate(url).await?;
                Ok(StepReport {
                    results: Vec::new(),
                    site: Some(url.clone()),
                })
            }
            Step::Search { selector, query } => {
                let browser = self.browser()?;
                let query = query.as_deref().unwrap_or(original_task);
                match browser.query_selector(selector).await? {
                    Some(input) => {
                        browser.type_text(&input, query).await?;
                        browser.press(&input, "Enter").await?;
                        tokio::time::sleep(self.settings.settle_delay).await;
                    }
                    None => tracing::debug!(selector = %selector, "search input not found"),
                }
                Ok(StepReport::empty())
            }
            Step::SearchGoogle { query } => {
                let query = query.as_deref().unwrap_or(original_task);
                let results = self.search_web(query).await?;
                let site = (!results.is_empty()).then(|| "google".to_string());
                Ok(StepReport { results, site })
            }
            Step::Extract { selector } => {
                let browser = self.browser()?;
                let page_url = browser.current_url().await.unwrap_or_default();
                let results = self.extract(browser, selector, &page_url).await?;
                let site = (!results.is_empty()).then(|| page_url);
                Ok(StepReport { results, site })
            }
            Step::Filter { .. } => Ok(StepReport::empty()),
            Step::Unrecognized { action } => {
                tracing::debug!(action = %action, "unrecognized action, no-op");
                Ok(StepReport::empty())
            }
        }
    }

    /// 调用网页搜索能力并解析文本结果
    pub async fn search_web(&self, query: &str) -> Result<Vec<SearchResult>, NavigatorError> {
        let search = self
            .search
            .as_ref()
            .ok_or(NavigatorError::CapabilityMissing("web search"))?;
        let text = search.search(query).await?;
        Ok(parse_search_text(&text, self.settings.max_search_results))
    }

    fn browser(&self) -> Result<&dyn BrowserSession, NavigatorError> {
        self.browser
            .as_deref()
            .ok_or(NavigatorError::CapabilityMissing("browser"))
    }

    async fn extract(
        &self,
        browser: &dyn BrowserSession,
        selector: &str,
        page_url: &str,
    ) -> Result<Vec<SearchResult>, NavigatorError> {
        let elements = browser.query_selector_all(selector).await?;
        let source = if page_url.is_empty() { "web" } else { page_url };

        let mut results = Vec::new();
        for element in elements.iter().take(self.settings.max_extract_items) {
            match extract_item(browser, element, source, page_url).await {
                Ok(Some(item)) => results.push(item),
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "item extraction failed"),
            }
        }
        tracing::debug!(selector, found = elements.len(), kept = results.len(), "extract");
        Ok(results)
    }
}

async fn child_text(
    browser: &dyn BrowserSession,
    parent: &ElementRef,
    selector: &str,
) -> Result<Option<String>, BrowserError> {
    match browser.query_within(parent, selector).await? {
        Some(el) => Ok(Some(browser.inner_text(&el).await?.trim().to_string())),
        None => Ok(None),
    }
}

async fn child_attr(
    browser: &dyn BrowserSession,
    parent: &ElementRef,
    selector: &str,
    name: &str,
) -> Result<Option<String>, BrowserError> {
    match browser.query_within(parent, selector).await? {
        Some(el) => browser.get_attribute(&el, name).await,
        None => Ok(None),
    }
}

/// 单个元素 → 结果；既无标题也无价格时返回 None
async fn extract_item(
    browser: &dyn BrowserSession,
    element: &ElementRef,
    source: &str,
    page_url: &str,
) -> Result<Option<SearchResult>, BrowserError> {
    let title = child_text(browser, element, TITLE_PROBE)
        .await?
        .unwrap_or_default();
    let price = child_text(browser, element, PRICE_PROBE)
        .await?
        .filter(|p| !p.is_empty());
    if title.is_empty() && price.is_none() {
        return Ok(None);
    }

    let location = child_text(browser, element, LOCATION_PROBE).await?;
    let link = child_attr(browser, element, "a", "href")
        .await?
        .map(|href| make_absolute_url(&href, page_url))
        .unwrap_or_default();
    let image = child_attr(browser, element, "img", "src").await?;

    let item = SearchResult::new(&title, price.clone().unwrap_or_default(), source)
        .with_link(link)
        .with_price(price)
        .with_location(location)
        .with_image_url(image);
    Ok(item.has_content().then_some(item))
}
