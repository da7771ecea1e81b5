//! Mock 能力（用于测试，无需浏览器 / 搜索 API）
//!
//! MockBrowser 模拟一个固定的商品列表页：任意列表选择器都返回全部条目，
//! 子选择器按关键字映射到字段（price / location / title、a、img）。

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{BrowserError, SearchError};
use crate::tools::browser::{BrowserSession, ElementRef};
use crate::tools::search::WebSearch;

/// 列表页中的一个条目
#[derive(Debug, Clone, Default)]
pub struct MockListing {
    pub title: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub href: Option<String>,
    pub image: Option<String>,
}

impl MockListing {
    pub fn new(title: &str, price: &str) -> Self {
        Self {
            title: Some(title.to_string()).filter(|t| !t.is_empty()),
            price: Some(price.to_string()).filter(|p| !p.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct MockPage {
    url: String,
    listings: Vec<MockListing>,
    navigations: Vec<String>,
    typed: Vec<String>,
    pressed: Vec<String>,
    events: Vec<String>,
    failing_urls: HashSet<String>,
    has_search_input: bool,
}

/// 内存中的浏览会话
#[derive(Debug, Default)]
pub struct MockBrowser {
    page: Mutex<MockPage>,
}

fn field_for(selector: &str) -> Option<&'static str> {
    let s = selector.to_lowercase();
    if s.contains("price") {
        Some("price")
    } else if s.contains("location") {
        Some("location")
    } else if s.contains("title") || s.starts_with("h1") {
        Some("title")
    } else if s == "a" {
        Some("href")
    } else if s == "img" {
        Some("image")
    } else {
        None
    }
}

fn listing_index(locator: &str) -> Option<usize> {
    locator
        .strip_prefix("listing:")?
        .split('/')
        .next()?
        .parse()
        .ok()
}

impl MockBrowser {
    pub fn new(url: &str, listings: Vec<MockListing>) -> Self {
        Self {
            page: Mutex::new(MockPage {
                url: url.to_string(),
                listings,
                has_search_input: true,
                ..MockPage::default()
            }),
        }
    }

    /// 导航到该 URL 时返回错误
    pub fn fail_navigation_to(self, url: &str) -> Self {
        self.lock().failing_urls.insert(url.to_string());
        self
    }

    pub fn without_search_input(self) -> Self {
        self.lock().has_search_input = false;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.lock().typed.clone()
    }

    pub fn pressed(&self) -> Vec<String> {
        self.lock().pressed.clone()
    }

    /// 导航与输入按发生顺序的记录：`navigate:<url>` / `type:<text>`
    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockPage> {
        self.page.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn field(&self, element: &ElementRef) -> Result<Option<String>, BrowserError> {
        let page = self.lock();
        let locator = element.locator();
        let listing = listing_index(locator)
            .and_then(|i| page.listings.get(i))
            .ok_or_else(|| BrowserError::ElementNotFound(locator.to_string()))?;
        let value = match locator.rsplit('/').next() {
            Some("title") => listing.title.clone(),
            Some("price") => listing.price.clone(),
            Some("location") => listing.location.clone(),
            Some("href") => listing.href.clone(),
            Some("image") => listing.image.clone(),
            _ => None,
        };
        Ok(value)
    }
}

#[async_trait]
impl BrowserSession for MockBrowser {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut page = self.lock();
        if page.failing_urls.contains(url) {
            return Err(BrowserError::Navigation(format!("{}: timeout", url)));
        }
        page.navigations.push(url.to_string());
        page.events.push(format!("navigate:{}", url));
        page.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.lock().url.clone())
    }

    async fn query_selector(&self, _selector: &str) -> Result<Option<ElementRef>, BrowserError> {
        Ok(self
            .lock()
            .has_search_input
            .then(|| ElementRef::new("input")))
    }

    async fn query_selector_all(&self, _selector: &str) -> Result<Vec<ElementRef>, BrowserError> {
        let count = self.lock().listings.len();
        Ok((0..count)
            .map(|i| ElementRef::new(format!("listing:{}", i)))
            .collect())
    }

    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, BrowserError> {
        let Some(field) = field_for(selector) else {
            return Ok(None);
        };
        let candidate = ElementRef::new(format!("{}/{}", parent.locator(), field));
        Ok(self.field(&candidate)?.map(|_| candidate))
    }

    async fn inner_text(&self, element: &ElementRef) -> Result<String, BrowserError> {
        self.field(element)?
            .ok_or_else(|| BrowserError::ElementNotFound(element.locator().to_string()))
    }

    async fn get_attribute(
        &self,
        element: &ElementRef,
        _name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.field(element)
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), BrowserError> {
        if element.locator() != "input" {
            return Err(BrowserError::ElementNotFound(element.locator().to_string()));
        }
        let mut page = self.lock();
        page.typed.push(text.to_string());
        page.events.push(format!("type:{}", text));
        Ok(())
    }

    async fn press(&self, _element: &ElementRef, key: &str) -> Result<(), BrowserError> {
        self.lock().pressed.push(key.to_string());
        Ok(())
    }
}

/// 固定返回的搜索后端
#[derive(Debug)]
pub struct MockSearch {
    response: Result<String, String>,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WebSearch for MockSearch {
    async fn search(&self, query: &str) -> Result<String, SearchError> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        self.response.clone().map_err(SearchError::Request)
    }
}
