//! 浏览器能力抽象
//!
//! StepExecutor 只依赖此 trait：导航、查询元素、读文本/属性、输入与按键。
//! 元素以不透明的 [`ElementRef`] 表示，由具体实现决定其含义（Chrome 实现中为一段可求值的 JS 定位表达式）。
//! 同一会话会被反复调用；错误以 [`BrowserError`] 返回，由调用方捕获。

use async_trait::async_trait;

use crate::core::BrowserError;

/// 页面元素引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn locator(&self) -> &str {
        &self.0
    }
}

/// 一个长期存活的浏览会话（单页面）
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// 当前页面 URL
    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, BrowserError>;

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError>;

    /// 在 parent 内部查询第一个匹配的子元素
    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, BrowserError>;

    async fn inner_text(&self, element: &ElementRef) -> Result<String, BrowserError>;

    async fn get_attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), BrowserError>;

    async fn press(&self, element: &ElementRef, key: &str) -> Result<(), BrowserError>;

    /// 释放会话（关闭浏览器进程等）
    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}
