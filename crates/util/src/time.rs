//! Timestamp helpers. The original tracks wall-clock seconds per session and
//! per game (`client->timestamp`, `game->timestamp`) purely to measure
//! elapsed time, never to display a date, so a monotonic clock is the
//! idiomatic Rust substitute — it cannot go backwards under an NTP step.

use std::time::{Duration, Instant};

/// A tick source. A trivial wrapper today, kept as a named type so the
/// reliability layer, session manager, and game engine all read "the
/// clock" through one seam instead of calling `Instant::now()` directly
/// everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock;

impl Clock {
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Whole seconds elapsed since `since`, saturating at zero.
    pub fn elapsed_secs(&self, since: Instant) -> u64 {
        self.now().saturating_duration_since(since).as_secs()
    }

    /// Seconds remaining until `since + budget`, saturating at zero once
    /// the budget has passed.
    pub fn remaining_secs(&self, since: Instant, budget: Duration) -> u64 {
        budget
            .saturating_sub(self.now().saturating_duration_since(since))
            .as_secs()
    }
}
