use rand::rngs::SmallRng;
use tracing::{debug, info};

use crate::core::timebase::{Clock, Millis, SystemClock};
use crate::gaze::aversion::AversionParams;
use crate::gaze::behavior::{
    Behavior, DynamicGaze, GazeDirection, GazeFrame, GazeParams, InitiatingJointAttention,
    MutualGaze, RespondingJointAttention,
};
use crate::gaze::condition::{Condition, EyeConfig};
use crate::gaze::perception::{HeadDirection, PerceptionSnapshot};
use crate::gaze::sink::PupilSink;

/// Owns the one active behavior and the sink it drives.
///
/// `tick` is called once per rendered frame; `trigger`, `respond` and
/// `start_dynamic` may be called between ticks and take effect on the next one.
#[derive(Debug)]
pub struct Orchestrator<C: Clock = SystemClock> {
    gaze: GazeParams,
    aversion: AversionParams,
    sink: PupilSink,
    active: Behavior,
    condition: Option<Condition>,
    clock: C,
    rng: SmallRng,
    last_head: HeadDirection,
    frames: u64,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(
        gaze: GazeParams,
        aversion: AversionParams,
        sink: PupilSink,
        clock: C,
        mut rng: SmallRng,
    ) -> Self {
        let now = clock.now_ms();
        let active = Behavior::MutualGaze(MutualGaze::new(&gaze, aversion, now, &mut rng));
        Self {
            gaze,
            aversion,
            sink,
            active,
            condition: None,
            clock,
            rng,
            last_head: HeadDirection::None,
            frames: 0,
        }
    }

    pub fn sink(&self) -> &PupilSink {
        &self.sink
    }

    pub fn behavior(&self) -> &Behavior {
        &self.active
    }

    pub fn behavior_name(&self) -> &'static str {
        self.active.name()
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn default_behavior(&mut self, now: Millis) -> Behavior {
        Behavior::MutualGaze(MutualGaze::new(&self.gaze, self.aversion, now, &mut self.rng))
    }

    /// A head that has just turned sideways interrupts mutual gaze. Holding
    /// the turn does not retrigger.
    fn follow_head_turn(&mut self, head: HeadDirection) {
        let turned = head != self.last_head;
        self.last_head = head;
        if !self.gaze.respond_to_head_turns || !turned {
            return;
        }
        let Some(direction) = head.as_gaze_direction() else {
            return;
        };
        if matches!(self.active, Behavior::MutualGaze(_)) {
            debug!("Head turned {direction}");
            self.respond(direction);
        }
    }

    /// Advance the active behavior by one frame. A finished behavior is
    /// replaced by mutual gaze before this returns.
    pub fn tick(&mut self, perception: &PerceptionSnapshot) {
        self.follow_head_turn(perception.head_direction);
        let now = self.clock.now_ms();
        let frame = GazeFrame { now, perception };
        self.active.step(&frame, &mut self.sink, &mut self.rng);
        if self.active.is_finished() {
            debug!("{} finished; back to MutualGaze", self.active.name());
            self.active = self.default_behavior(now);
        }
        self.frames += 1;
    }

    /// Start an initiating joint-attention cue and report the direction that
    /// will actually be shown. No frame has run yet when this returns.
    pub fn trigger(
        &mut self,
        direction: GazeDirection,
        condition: Option<&Condition>,
    ) -> GazeDirection {
        let behavior =
            InitiatingJointAttention::new(direction, condition, &self.gaze, &mut self.rng);
        let shown = behavior.actual_gaze_direction();
        info!(
            "Triggering InitiatingJointAttention. Correct: {}, Showing: {shown}",
            behavior.requested_direction()
        );
        self.active = Behavior::InitiatingJointAttention(behavior);
        shown
    }

    /// `trigger` with the condition last passed to `apply_condition`.
    pub fn trigger_with_current(&mut self, direction: GazeDirection) -> GazeDirection {
        let condition = self.condition.clone();
        self.trigger(direction, condition.as_ref())
    }

    pub fn respond(&mut self, direction: GazeDirection) {
        info!("Triggering RespondingJointAttention toward {direction}");
        let behavior = RespondingJointAttention::new(direction, &self.gaze);
        self.active = Behavior::RespondingJointAttention(behavior);
    }

    pub fn start_dynamic(&mut self) {
        let now = self.clock.now_ms();
        info!("Starting DynamicGaze");
        self.active = Behavior::DynamicGaze(DynamicGaze::new(&self.gaze, now));
    }

    pub fn update_dimensions(&mut self, eye: &EyeConfig) {
        self.sink.update_dimensions(eye);
    }

    /// Make `condition` current and apply its eye geometry, if it has one.
    pub fn apply_condition(&mut self, condition: Condition) {
        if let Some(eye) = condition.eye_config.as_ref() {
            self.sink.update_dimensions(eye);
        }
        info!("Condition \"{}\" applied", condition.condition_name);
        self.condition = Some(condition);
    }
}
