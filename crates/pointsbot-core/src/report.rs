//! Operator-facing error reporting
//!
//! Faults that the bot swallows to keep serving (delivery failures, storage
//! errors in handlers, scheduler tick failures) are handed to an
//! `ErrorReporter`.

use crate::notify::MessageSender;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

/// Sink for faults that must reach an operator.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    /// Report a fault. `context` names the operation that failed.
    async fn report(&self, context: &str, error: &str);
}

/// Logs every report at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

#[async_trait]
impl ErrorReporter for TracingReporter {
    async fn report(&self, context: &str, error: &str) {
        error!(context, error, "Operational fault");
    }
}

/// Logs every report and forwards a short notice to an admin chat.
pub struct ChatReporter {
    sender: Arc<dyn MessageSender>,
    admin_chat_id: i64,
}

impl ChatReporter {
    /// Forward reports to `admin_chat_id` through `sender`.
    #[must_use]
    pub fn new(sender: Arc<dyn MessageSender>, admin_chat_id: i64) -> Self {
        Self {
            sender,
            admin_chat_id,
        }
    }
}

const MAX_REPORTED_ERROR_CHARS: usize = 500;

#[async_trait]
impl ErrorReporter for ChatReporter {
    async fn report(&self, context: &str, error: &str) {
        error!(context, error, "Operational fault");

        let error: String = error.chars().take(MAX_REPORTED_ERROR_CHARS).collect();
        let text = format!(
            "⚠️ <b>{}</b>\n<code>{}</code>",
            html_escape::encode_text(context),
            html_escape::encode_text(&error)
        );
        // Never report a failed report, that could loop.
        if let Err(e) = self.sender.send_html(self.admin_chat_id, text).await {
            warn!(error = %e, "Failed to forward report to admin chat");
        }
    }
}
