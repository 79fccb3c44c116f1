/// Auto-clearing highlight state.
///
/// A highlight stays visible for a fixed window (3 s by default). Showing a
/// new highlight replaces the old one and restarts the window, so an older
/// deadline can never hide a newer highlight early. Time is passed in
/// explicitly; callers use `Instant::now()`.
use std::time::{Duration, Instant};

use super::HighlightRect;

/// Default visibility window.
pub const DEFAULT_TTL: Duration = Duration::from_millis(3000);

#[derive(Debug)]
pub struct HighlightTimer {
    ttl: Duration,
    active: Option<(HighlightRect, Instant)>,
    generation: u64,
}

impl Default for HighlightTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl HighlightTimer {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            active: None,
            generation: 0,
        }
    }

    /// Show `highlight`, cancelling any pending clear. Returns the new
    /// generation number; a deferred clear for an older generation is a
    /// no-op (see [`clear_if`](Self::clear_if)).
    pub fn show(&mut self, highlight: HighlightRect, now: Instant) -> u64 {
        self.generation += 1;
        self.active = Some((highlight, now + self.ttl));
        self.generation
    }

    /// The visible highlight at `now`, clearing it once its window has passed.
    pub fn current(&mut self, now: Instant) -> Option<&HighlightRect> {
        if matches!(&self.active, Some((_, deadline)) if now >= *deadline) {
            self.active = None;
        }
        self.active.as_ref().map(|(h, _)| h)
    }

    /// Remaining visibility at `now`, if a highlight is showing.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let (_, deadline) = self.active.as_ref()?;
        let left = deadline.saturating_duration_since(now);
        (!left.is_zero()).then_some(left)
    }

    /// Clear only if `generation` is still the latest `show`.
    pub fn clear_if(&mut self, generation: u64) -> bool {
        if generation == self.generation && self.active.is_some() {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Clear unconditionally.
    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
