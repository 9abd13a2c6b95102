#![deny(missing_docs)]
//! Points bot core library.
//!
//! Consultation slots, reminders, notifications and the in-process guards
//! that keep chat handlers safe under redelivery and concurrent callbacks.

/// Booking orchestration (book, generate, cancel).
pub mod booking;
/// Platform-agnostic parsing of slot commands.
pub mod commands;
/// Configuration management.
pub mod config;
/// Duplicate suppression, rate limiting and per-chat locks.
pub mod guards;
/// Booking, reminder and cancellation messages.
pub mod notify;
/// Error reporting to operators.
pub mod report;
/// Slot model, generation planner and slot storage.
pub mod slots;
/// Storage pool, schema and errors.
pub mod storage;
/// Contact lookup for slot parties.
pub mod users;

#[cfg(test)]
pub mod testing;
