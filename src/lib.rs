//! redeliver - visibility-timeout redelivery for a partitioned log
//!
//! A processor consumes Start and Complete markers, keeps the in-flight
//! ones in a durable store, and republishes any message whose processing
//! did not complete within the visibility timeout.

pub mod cli;
pub mod clock;
pub mod config;
pub mod marker;
pub mod observability;
pub mod processor;
pub mod queue;
pub mod redelivery;
pub mod store;
pub mod transport;
