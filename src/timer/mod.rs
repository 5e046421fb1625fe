//! Read-only model of the external countdown engine.
//!
//! The engine owns timer state and pushes a [`TimerTick`] per running timer
//! roughly once a second. This crate never starts, pauses, or mutates timers;
//! it only consumes the ticks and the metadata registered alongside each
//! timer.

mod state;

pub use state::{TimerInfo, TimerStatus, TimerTick};

/// Current unix time in whole seconds, matching the engine's `end_time_unix`.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
