use tracing::{error, info, warn};

use super::traits::Notifier;
use super::types::NotificationLevel;

/// Forwards notifications to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Info => info!(notification = message),
            NotificationLevel::Warning => warn!(notification = message),
            NotificationLevel::Error => error!(notification = message),
        }
    }
}

/// Prints notifications for the administrator running the CLI
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        let icon = match level {
            NotificationLevel::Info => "ℹ️ ",
            NotificationLevel::Warning => "⚠️ ",
            NotificationLevel::Error => "❌",
        };
        eprintln!("{icon} {message}");
    }
}
