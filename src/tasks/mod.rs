//! Background Tasks Module
//!
//! # Tasks
//! - Expiry sweep: removes cache entries older than the TTL at a fixed interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
