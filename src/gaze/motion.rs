//! Low-level eye movements. Each primitive advances one frame per `step` and
//! reports whether it is still active.

use crate::core::coord::GazeCoordinate;
use crate::core::timebase::{Millis, elapsed_ms};
use crate::gaze::sink::PupilSink;

pub const DEFAULT_SACCADE_SPEED: f32 = 0.15;
pub const MIN_SACCADE_SPEED: f32 = 0.01;
pub const DEFAULT_PURSUIT_SMOOTHNESS: f32 = 0.1;

/// Hold a target for a fixed time.
#[derive(Debug, Clone)]
pub struct Fixation {
    target: GazeCoordinate,
    duration_ms: Millis,
    start_ms: Millis,
}

impl Fixation {
    pub fn new(target: GazeCoordinate, duration_ms: Millis, start_ms: Millis) -> Self {
        Self {
            target: target.sanitized(),
            duration_ms,
            start_ms,
        }
    }

    pub fn step(&mut self, now: Millis, sink: &mut PupilSink) -> bool {
        if elapsed_ms(now, self.start_ms) < self.duration_ms {
            sink.set_target(self.target);
            return true;
        }
        false
    }
}

/// Linear move between two targets at a fixed progress increment per frame.
#[derive(Debug, Clone)]
pub struct Saccade {
    start: GazeCoordinate,
    end: GazeCoordinate,
    speed: f32,
    total_steps: u32,
    steps: u32,
    progress: f32,
}

impl Saccade {
    pub fn new(start: GazeCoordinate, end: GazeCoordinate, speed: f32) -> Self {
        let speed = if speed.is_finite() {
            speed.max(MIN_SACCADE_SPEED)
        } else {
            DEFAULT_SACCADE_SPEED
        };
        let total_steps = (1.0 / speed).ceil().max(1.0) as u32;
        Self {
            start: start.sanitized(),
            end: end.sanitized(),
            speed,
            total_steps,
            steps: 0,
            progress: 0.0,
        }
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// The frame that completes the move lands exactly on `end` and already reports inactive.
    pub fn step(&mut self, sink: &mut PupilSink) -> bool {
        if self.steps < self.total_steps {
            self.steps += 1;
        }
        if self.steps >= self.total_steps {
            self.progress = 1.0;
            sink.set_target(self.end);
            return false;
        }
        self.progress = (self.steps as f32 * self.speed).min(1.0);
        sink.set_target(self.start.lerp(self.end, self.progress));
        true
    }
}

/// Exponential tracking of a (possibly moving) target. Never completes on its own.
#[derive(Debug, Clone)]
pub struct SmoothPursuit {
    target: GazeCoordinate,
    smoothness: f32,
}

impl SmoothPursuit {
    pub fn new(target: GazeCoordinate, smoothness: f32) -> Self {
        let smoothness = if smoothness.is_finite() && smoothness > 0.0 {
            smoothness.min(1.0)
        } else {
            DEFAULT_PURSUIT_SMOOTHNESS
        };
        Self {
            target: target.sanitized(),
            smoothness,
        }
    }

    pub fn smoothness(&self) -> f32 {
        self.smoothness
    }

    pub fn update_target(&mut self, target: GazeCoordinate) {
        self.target = target.sanitized();
    }

    pub fn step(&mut self, sink: &mut PupilSink) -> bool {
        let current = sink.current();
        sink.set_target(current.lerp(self.target, self.smoothness));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_at(x: f32, y: f32) -> PupilSink {
        let mut sink = PupilSink::default();
        sink.set_target(GazeCoordinate::new(x, y));
        sink
    }

    #[test]
    fn fixation_holds_until_duration_then_stops() {
        let mut sink = sink_at(0.5, 0.5);
        let target = GazeCoordinate::new(0.3, 0.6);
        let mut fix = Fixation::new(target, 300, 1_000);
        for now in [1_000, 1_100, 1_299] {
            assert!(fix.step(now, &mut sink));
            assert_eq!(sink.current(), target);
        }
        sink.set_target(GazeCoordinate::new(0.9, 0.4));
        for now in [1_300, 1_301, 5_000] {
            assert!(!fix.step(now, &mut sink));
            assert_eq!(sink.current(), GazeCoordinate::new(0.9, 0.4));
        }
    }

    #[test]
    fn zero_duration_fixation_is_inactive_immediately() {
        let mut sink = sink_at(0.5, 0.5);
        let mut fix = Fixation::new(GazeCoordinate::new(0.2, 0.3), 0, 10);
        assert!(!fix.step(10, &mut sink));
        assert_eq!(sink.current(), GazeCoordinate::CENTER);
    }

    #[test]
    fn saccade_reaches_end_within_step_bound() {
        let speeds = [0.15_f32, 0.1, 0.3, 0.5, 1.0, 2.0, 0.01, 0.0, -1.0, 0.07];
        let start = GazeCoordinate::new(0.2, 0.3);
        let end = GazeCoordinate::new(0.85, 0.7);
        for &speed in &speeds {
            let mut sink = sink_at(start.x, start.y);
            let mut saccade = Saccade::new(start, end, speed);
            let bound = (1.0 / speed.max(MIN_SACCADE_SPEED)).ceil() as u32;
            let mut steps = 0;
            while saccade.step(&mut sink) {
                steps += 1;
                assert!(steps < bound, "speed={speed} exceeded bound {bound}");
            }
            steps += 1;
            assert!(steps <= bound);
            assert_eq!(saccade.progress(), 1.0);
            assert_eq!(sink.current(), end, "speed={speed}");
        }
    }

    #[test]
    fn saccade_progress_is_monotonic() {
        let mut sink = sink_at(0.5, 0.5);
        let mut saccade = Saccade::new(sink.current(), GazeCoordinate::new(0.15, 0.5), 0.15);
        let mut last = 0.0;
        loop {
            let active = saccade.step(&mut sink);
            assert!(saccade.progress() > last);
            last = saccade.progress();
            if !active {
                break;
            }
        }
        assert!(!saccade.step(&mut sink));
        assert_eq!(sink.current(), GazeCoordinate::new(0.15, 0.5));
    }

    #[test]
    fn pursuit_strictly_approaches_target() {
        let mut sink = sink_at(0.9, 0.75);
        let target = GazeCoordinate::new(0.3, 0.35);
        let mut pursuit = SmoothPursuit::new(target, DEFAULT_PURSUIT_SMOOTHNESS);
        let mut dist = sink.current().distance(target);
        for _ in 0..40 {
            assert!(pursuit.step(&mut sink));
            let d = sink.current().distance(target);
            assert!(d < dist);
            dist = d;
        }
    }

    #[test]
    fn pursuit_rejects_bad_smoothness() {
        assert_eq!(
            SmoothPursuit::new(GazeCoordinate::CENTER, 0.0).smoothness(),
            DEFAULT_PURSUIT_SMOOTHNESS
        );
        assert_eq!(
            SmoothPursuit::new(GazeCoordinate::CENTER, f32::NAN).smoothness(),
            DEFAULT_PURSUIT_SMOOTHNESS
        );
        assert_eq!(SmoothPursuit::new(GazeCoordinate::CENTER, 3.0).smoothness(), 1.0);
    }
}
