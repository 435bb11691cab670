//! Optional per-stage timing around the frame step.

use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    Input,
    Transport,
    Maintain,
    Dispatch,
    Update,
    Geometry,
    Render,
    Swap,
}

impl FrameStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Transport => "transport",
            Self::Maintain => "maintain",
            Self::Dispatch => "dispatch",
            Self::Update => "update",
            Self::Geometry => "geometry",
            Self::Render => "render",
            Self::Swap => "swap",
        }
    }
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub trait FrameObserver {
    fn stage(&mut self, stage: FrameStage, elapsed: Duration);

    fn frame(&mut self, _frame: u64, _elapsed: Duration) {}
}

/// Emits stage timings under the `profiling` target.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl FrameObserver for TracingObserver {
    fn stage(&mut self, stage: FrameStage, elapsed: Duration) {
        tracing::trace!(target: "profiling", label = stage.label(), elapsed = ?elapsed);
    }

    fn frame(&mut self, frame: u64, elapsed: Duration) {
        tracing::trace!(target: "profiling", frame, elapsed = ?elapsed, "frame completed");
    }
}

/// Running stopwatch for one frame. Does nothing without an observer.
pub(crate) struct StageTimer {
    frame_start: Instant,
    stage_start: Instant,
}

impl StageTimer {
    pub(crate) fn start() -> Self {
        let now = Instant::now();
        Self {
            frame_start: now,
            stage_start: now,
        }
    }

    pub(crate) fn lap(
        &mut self,
        observer: Option<&mut (dyn FrameObserver + 'static)>,
        stage: FrameStage,
    ) {
        let now = Instant::now();
        if let Some(observer) = observer {
            observer.stage(stage, now - self.stage_start);
        }
        self.stage_start = now;
    }

    pub(crate) fn finish(self, observer: Option<&mut (dyn FrameObserver + 'static)>, frame: u64) {
        if let Some(observer) = observer {
            observer.frame(frame, self.frame_start.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Stages(Vec<FrameStage>);

    impl FrameObserver for Stages {
        fn stage(&mut self, stage: FrameStage, _: Duration) {
            self.0.push(stage);
        }
    }

    #[test]
    fn laps_report_in_order() {
        let mut observer = Stages::default();
        let mut timer = StageTimer::start();
        timer.lap(Some(&mut observer), FrameStage::Input);
        timer.lap(None, FrameStage::Transport);
        timer.lap(Some(&mut observer), FrameStage::Render);
        timer.finish(Some(&mut observer), 0);
        assert_eq!(observer.0, vec![FrameStage::Input, FrameStage::Render]);
        assert_eq!(FrameStage::Swap.to_string(), "swap");
    }
}
