//! Headless Chrome 浏览会话
//!
//! 需启用 feature "browser" 且系统已安装 Chrome/Chromium。
//! headless_chrome 为阻塞 API，所有调用都放进 spawn_blocking；元素定位通过 JS 表达式完成，
//! 这样 ElementRef 不必持有带生命周期的 Element。

use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;

use crate::core::BrowserError;
use crate::tools::browser::{BrowserSession, ElementRef};

/// 转为 JS 字符串字面量
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// 启动浏览器并打开一个标签页
    pub async fn launch(headless: bool, timeout: Duration) -> Result<Self, BrowserError> {
        tokio::task::spawn_blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(headless)
                .sandbox(false)
                .idle_browser_timeout(Duration::from_secs(600))
                .args(vec![OsStr::new("--disable-dev-shm-usage")])
                .build()
                .map_err(|e| BrowserError::Unavailable(e.to_string()))?;
            let browser = Browser::new(options)
                .map_err(|e| BrowserError::Unavailable(format!("Chrome launch failed: {}", e)))?;
            let tab = browser
                .new_tab()
                .map_err(|e| BrowserError::Unavailable(format!("Browser tab failed: {}", e)))?;
            tab.set_default_timeout(timeout);
            tracing::info!(headless, "chrome session ready");
            Ok(Self {
                browser: Mutex::new(Some(browser)),
                tab,
            })
        })
        .await
        .map_err(|e| BrowserError::Operation(format!("Task join: {}", e)))?
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, BrowserError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| BrowserError::Operation(format!("Task join: {}", e)))?
    }

    async fn eval(&self, js: String) -> Result<Option<Value>, BrowserError> {
        self.blocking(move |tab| {
            tab.evaluate(&js, false)
                .map(|r| r.value)
                .map_err(|e| BrowserError::Operation(format!("Evaluate failed: {}", e)))
        })
        .await
    }

    async fn exists(&self, locator: &str) -> Result<bool, BrowserError> {
        let js = format!("(function() {{ return ({}) != null; }})()", locator);
        Ok(matches!(self.eval(js).await?, Some(Value::Bool(true))))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let url = url.to_string();
        tracing::info!(url = %url, "browser navigate");
        self.blocking(move |tab| {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| BrowserError::Navigation(format!("{}: {}", url, e)))
        })
        .await
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.tab.get_url())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, BrowserError> {
        let locator = format!("document.querySelector({})", js_string(selector));
        Ok(self.exists(&locator).await?.then(|| ElementRef::new(locator)))
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError> {
        let list = format!("document.querySelectorAll({})", js_string(selector));
        let count = self
            .eval(format!("{}.length", list))
            .await?
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        Ok((0..count)
            .map(|i| ElementRef::new(format!("{}[{}]", list, i)))
            .collect())
    }

    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, BrowserError> {
        let locator = format!(
            "(({}) || document.createElement('div')).querySelector({})",
            parent.locator(),
            js_string(selector)
        );
        Ok(self.exists(&locator).await?.then(|| ElementRef::new(locator)))
    }

    async fn inner_text(&self, element: &ElementRef) -> Result<String, BrowserError> {
        let js = format!(
            "(function() {{ const el = {}; return el ? el.innerText : null; }})()",
            element.locator()
        );
        match self.eval(js).await? {
            Some(Value::String(s)) => Ok(s),
            _ => Err(BrowserError::ElementNotFound(element.locator().to_string())),
        }
    }

    async fn get_attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let js = format!(
            "(function() {{ const el = {}; if (!el) return null; return el.getAttribute({}) || ''; }})()",
            element.locator(),
            js_string(name)
        );
        match self.eval(js).await? {
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            _ => Err(BrowserError::ElementNotFound(element.locator().to_string())),
        }
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), BrowserError> {
        let js = format!(
            r#"(function() {{
                const el = {};
                if (!el) return false;
                el.scrollIntoView({{ behavior: 'instant', block: 'center' }});
                el.focus();
                if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') {{
                    el.value = {};
                }} else {{
                    el.textContent = {};
                }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            element.locator(),
            js_string(text),
            js_string(text)
        );
        match self.eval(js).await? {
            Some(Value::Bool(true)) => Ok(()),
            _ => Err(BrowserError::ElementNotFound(element.locator().to_string())),
        }
    }

    async fn press(&self, element: &ElementRef, key: &str) -> Result<(), BrowserError> {
        let focus = format!(
            "(function() {{ const el = {}; if (!el) return false; el.focus(); return true; }})()",
            element.locator()
        );
        if !matches!(self.eval(focus).await?, Some(Value::Bool(true))) {
            return Err(BrowserError::ElementNotFound(element.locator().to_string()));
        }
        let key = key.to_string();
        self.blocking(move |tab| {
            tab.press_key(&key)
                .map(|_| ())
                .map_err(|e| BrowserError::Operation(format!("Press {} failed: {}", key, e)))
        })
        .await
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let browser = self
            .browser
            .lock()
            .map_err(|e| BrowserError::Operation(e.to_string()))?
            .take();
        if browser.is_some() {
            tracing::info!("chrome session closed");
        }
        Ok(())
    }
}
