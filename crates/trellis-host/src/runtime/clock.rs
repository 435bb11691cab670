use std::time::Instant;

/// Source of the per-frame timestamp handed to dispatch and UI update.
#[derive(Debug, Clone)]
pub enum FrameClock {
    /// Seconds since the clock was created.
    Wall { start: Instant },
    /// Advances by `step` seconds per frame; used headless and in tests.
    Fixed { step: f64, now: f64 },
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::wall()
    }
}

impl FrameClock {
    pub fn wall() -> Self {
        Self::Wall {
            start: Instant::now(),
        }
    }

    pub fn fixed(step: f64) -> Self {
        Self::Fixed { step, now: 0.0 }
    }

    /// Timestamp for the frame about to run.
    pub fn tick(&mut self) -> f64 {
        match self {
            Self::Wall { start } => start.elapsed().as_secs_f64(),
            Self::Fixed { step, now } => {
                let current = *now;
                *now += *step;
                current
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_starts_at_zero() {
        let mut clock = FrameClock::fixed(0.5);
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.tick(), 0.5);
        assert_eq!(clock.tick(), 1.0);
    }

    #[test]
    fn wall_clock_is_monotonic() {
        let mut clock = FrameClock::wall();
        let first = clock.tick();
        assert!(clock.tick() >= first);
    }
}
