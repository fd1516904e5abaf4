//! Session lifecycle management.
//!
//! Tracks each session's inputs and products with automatic reclaim of idle
//! sessions.

mod cleanup;
mod manager;
mod record;

pub use cleanup::ReclaimReport;
pub use manager::SessionManager;
pub use record::{SessionRecord, SessionState};

use std::time::Duration;

/// Start a background task that periodically reclaims expired sessions.
///
/// Returns `None` when `interval` is zero, which disables the sweep.
pub fn start_cleanup_task(
    manager: SessionManager,
    interval: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        tracing::warn!("Session cleanup interval is zero; expiry sweep disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            manager.reclaim_expired().await;
        }
    }))
}
