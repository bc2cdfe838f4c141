use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::coord::GazeCoordinate;
use crate::core::timebase::Millis;
use crate::gaze::motion::Fixation;
use crate::gaze::sink::PupilSink;

const AVERSION_X_BOUNDS: (f32, f32) = (0.15, 0.85);
const AVERSION_Y_BOUNDS: (f32, f32) = (0.1, 0.9);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AversionParams {
    #[serde(default = "AversionParams::default_duration_ms")]
    pub duration_ms: Millis,
    #[serde(default = "AversionParams::default_interval_min_ms")]
    pub interval_min_ms: Millis,
    #[serde(default = "AversionParams::default_interval_max_ms")]
    pub interval_max_ms: Millis,
    /// Full width of the horizontal look-away jitter around center.
    #[serde(default = "AversionParams::default_spread_x")]
    pub spread_x: f32,
    /// Full height of the vertical look-away jitter around center.
    #[serde(default = "AversionParams::default_spread_y")]
    pub spread_y: f32,
}

impl AversionParams {
    fn default_duration_ms() -> Millis {
        300
    }
    fn default_interval_min_ms() -> Millis {
        1_000
    }
    fn default_interval_max_ms() -> Millis {
        3_000
    }
    fn default_spread_x() -> f32 {
        0.2
    }
    fn default_spread_y() -> f32 {
        0.7
    }

    fn interval_bounds(&self) -> (Millis, Millis) {
        let lo = self.interval_min_ms.min(self.interval_max_ms);
        let hi = self.interval_min_ms.max(self.interval_max_ms);
        (lo, hi)
    }
}

impl Default for AversionParams {
    fn default() -> Self {
        Self {
            duration_ms: Self::default_duration_ms(),
            interval_min_ms: Self::default_interval_min_ms(),
            interval_max_ms: Self::default_interval_max_ms(),
            spread_x: Self::default_spread_x(),
            spread_y: Self::default_spread_y(),
        }
    }
}

/// Brief look-aways interleaved into an owning behavior. While an aversion is
/// running it preempts the owner entirely.
#[derive(Debug, Clone)]
pub struct GazeAversion {
    params: AversionParams,
    next_at: Millis,
    active: Option<Fixation>,
}

impl GazeAversion {
    pub fn new<R: Rng + ?Sized>(params: AversionParams, now: Millis, rng: &mut R) -> Self {
        let mut aversion = Self {
            params,
            next_at: now,
            active: None,
        };
        aversion.schedule(now, rng);
        aversion
    }

    pub fn next_aversion_at(&self) -> Millis {
        self.next_at
    }

    pub fn is_averting(&self) -> bool {
        self.active.is_some()
    }

    fn schedule<R: Rng + ?Sized>(&mut self, now: Millis, rng: &mut R) {
        let (lo, hi) = self.params.interval_bounds();
        let interval = if hi > lo {
            rng.random_range(lo..=hi)
        } else {
            lo
        };
        self.next_at = now.saturating_add(interval);
    }

    fn pick_target<R: Rng + ?Sized>(&self, rng: &mut R) -> GazeCoordinate {
        let dx = (rng.random::<f32>() - 0.5) * self.params.spread_x;
        let dy = (rng.random::<f32>() - 0.5) * self.params.spread_y;
        GazeCoordinate::new(0.5 + dx, 0.5 + dy).clamped(AVERSION_X_BOUNDS, AVERSION_Y_BOUNDS)
    }

    /// Returns true when the aversion consumed this frame and the owner must not move the sink.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        now: Millis,
        sink: &mut PupilSink,
        rng: &mut R,
    ) -> bool {
        if let Some(fixation) = self.active.as_mut() {
            if fixation.step(now, sink) {
                return true;
            }
            self.active = None;
            self.schedule(now, rng);
            return false;
        }

        if now >= self.next_at {
            let target = self.pick_target(rng);
            trace!(
                "gaze aversion to ({:.3}, {:.3}) for {} ms",
                target.x, target.y, self.params.duration_ms
            );
            self.active = Some(Fixation::new(target, self.params.duration_ms, now));
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn schedules_within_interval_window() {
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..100 {
            let aversion = GazeAversion::new(AversionParams::default(), 10_000, &mut rng);
            let at = aversion.next_aversion_at();
            assert!((11_000..=13_000).contains(&at), "at={at}");
        }
    }

    #[test]
    fn aversion_preempts_then_reschedules() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut sink = PupilSink::default();
        let mut aversion = GazeAversion::new(AversionParams::default(), 0, &mut rng);
        let start = aversion.next_aversion_at();

        assert!(!aversion.update(start - 1, &mut sink, &mut rng));
        assert!(!aversion.is_averting());

        // Onset consumes the frame without moving the sink yet.
        assert!(aversion.update(start, &mut sink, &mut rng));
        assert!(aversion.is_averting());
        assert_eq!(sink.current(), GazeCoordinate::CENTER);

        assert!(aversion.update(start + 100, &mut sink, &mut rng));
        let held = sink.current();
        assert!((0.15..=0.85).contains(&held.x));
        assert!((0.2..=0.8).contains(&held.y));
        assert!((held.x - 0.5).abs() <= 0.1 + 1e-6);

        assert!(!aversion.update(start + 300, &mut sink, &mut rng));
        assert!(!aversion.is_averting());
        let next = aversion.next_aversion_at();
        assert!(next >= start + 300 + 1_000 && next <= start + 300 + 3_000);
    }

    #[test]
    fn degenerate_window_uses_fixed_interval() {
        let params = AversionParams {
            interval_min_ms: 500,
            interval_max_ms: 500,
            ..AversionParams::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let aversion = GazeAversion::new(params, 0, &mut rng);
        assert_eq!(aversion.next_aversion_at(), 500);
    }
}
