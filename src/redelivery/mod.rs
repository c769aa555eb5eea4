//! Redelivery of overdue messages
//!
//! The [`RedeliveryExecutor`] runs on its own periodic task, independent of
//! marker arrival. Each tick drains the overdue markers from the queue and,
//! for every one of them:
//!
//! 1. fetches the original message from the data log
//! 2. republishes an identical copy (key, value, headers)
//! 3. retires the marker from the store once the publish is acknowledged
//!
//! # Failure handling
//!
//! - Fetch or publish failure: the marker stays in the store and is
//!   re-queued with a fresh deadline
//! - Original no longer in the log: the marker is a poison marker; it is
//!   logged and retired without a republish
//! - Retirement failure: the marker is re-queued
//!
//! A failure on one marker never stops the rest of the batch or later ticks.

mod errors;
mod executor;

pub use errors::{RedeliveryError, RedeliveryResult};
pub use executor::{RedeliveryExecutor, RedeliveryHandle, TickReport};
