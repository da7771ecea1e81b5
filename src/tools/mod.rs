//! 外部能力：浏览会话与网页搜索（以 trait 抽象，编排层只依赖 trait）

pub mod browser;
pub mod mock;
pub mod search;

#[cfg(feature = "browser")]
pub mod chrome;

pub use browser::{BrowserSession, ElementRef};
pub use mock::{MockBrowser, MockListing, MockSearch};
pub use search::{GoogleSearch, WebSearch};

#[cfg(feature = "browser")]
pub use chrome::ChromeSession;
