//! 核心编排层：结果模型、任务登记、进度广播、主控循环、构建与关闭

pub mod broadcast;
pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod shutdown;
pub mod state;

pub use broadcast::{ObserverId, ObserverSender, ProgressBroadcaster};
pub use builder::NavigatorBuilder;
pub use error::{BrowserError, NavigatorError, SearchError};
pub use orchestrator::{Capabilities, Navigator};
pub use registry::TaskRegistry;
pub use shutdown::{
    NavigatorCleanup, ShutdownCleanup, ShutdownCoordinator, ShutdownManager, ShutdownReason,
};
pub use state::{SearchResult, TaskProgress, TaskStatus};
