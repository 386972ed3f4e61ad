//! Client-side session handling: token and profile persistence plus
//! authenticated requests against the API.

pub mod session;
pub mod storage;

pub use session::{ClientError, Navigator, RequestOptions, SessionClient};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "INFO",
            NotificationLevel::Success => "SUCCESS",
            NotificationLevel::Warning => "WARNING",
            NotificationLevel::Error => "ERROR",
        }
    }
}

pub fn format_notification(message: &str, level: NotificationLevel) -> String {
    format!("[{}] {}", level.label(), message)
}

/// Display hook for user-facing messages. Only logs for now.
pub fn show_notification(message: &str, level: NotificationLevel) {
    let line = format_notification(message, level);
    match level {
        NotificationLevel::Info | NotificationLevel::Success => info!("{}", line),
        NotificationLevel::Warning => warn!("{}", line),
        NotificationLevel::Error => error!("{}", line),
    }
}
