use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::session::SessionStore;

/// Drops sessions idle for longer than `max_idle`; returns how many went.
pub fn sweep_idle_sessions(sessions: &SessionStore, max_idle: Duration) -> usize {
    let start = Instant::now();
    debug!("Starting session sweep");

    let evicted = sessions.evict_idle(max_idle);
    if evicted > 0 {
        info!(
            evicted,
            remaining = sessions.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Idle sessions evicted"
        );
    }
    evicted
}
