use std::time::Duration;

/// Shared per-frame tick. Everything time-based in the preview (blade
/// animation, auto-rotation) reads the same clock so that a frame observes a
/// single consistent `now`.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    elapsed: Duration,
    frame: u64,
}

/// Snapshot of the clock handed to per-frame consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    pub now: Duration,
    pub delta: Duration,
    pub frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.frame = 0;
    }

    pub fn now(&self) -> Duration {
        self.elapsed
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn advance(&mut self, delta: Duration) -> FrameTick {
        self.elapsed += delta;
        self.frame += 1;
        FrameTick {
            now: self.elapsed,
            delta,
            frame: self.frame,
        }
    }

    /// Moves the clock to an absolute time as reported by the display
    /// refresh. Time never runs backwards.
    pub fn advance_to(&mut self, now: Duration) -> FrameTick {
        let delta = now.saturating_sub(self.elapsed);
        self.advance(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let mut clock = FrameClock::new();
        clock.advance(Duration::from_millis(16));
        let tick = clock.advance_to(Duration::from_millis(10));

        assert_eq!(tick.delta, Duration::ZERO);
        assert_eq!(tick.now, Duration::from_millis(16));
        assert_eq!(tick.frame, 2);

        clock.reset();
        assert_eq!(clock.now(), Duration::ZERO);
    }
}
