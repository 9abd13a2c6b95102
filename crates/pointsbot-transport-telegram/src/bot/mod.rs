/// Slot booking callbacks from inline keyboards
pub mod callbacks;
/// Admission of updates through the chat guards
pub mod guards;
/// Command and message handlers
pub mod handlers;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// `MessageSender` implementation on top of the Bot API
pub mod sender;
/// View layer: message texts and keyboards
pub mod views;

pub use sender::TelegramSender;
