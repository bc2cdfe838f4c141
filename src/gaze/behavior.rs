//! High-level gaze behaviors composed from the motion primitives.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::coord::GazeCoordinate;
use crate::core::timebase::{Millis, elapsed_ms};
use crate::gaze::aversion::{AversionParams, GazeAversion};
use crate::gaze::condition::Condition;
use crate::gaze::motion::{
    DEFAULT_PURSUIT_SMOOTHNESS, DEFAULT_SACCADE_SPEED, Fixation, Saccade, SmoothPursuit,
};
use crate::gaze::perception::PerceptionSnapshot;
use crate::gaze::sink::PupilSink;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeParams {
    #[serde(default = "GazeParams::default_pursuit_smoothness")]
    pub pursuit_smoothness: f32,
    #[serde(default = "GazeParams::default_saccade_speed")]
    pub saccade_speed: f32,
    #[serde(default = "GazeParams::default_hold_ms")]
    pub hold_ms: Millis,
    #[serde(default = "GazeParams::default_dwell_ms")]
    pub dwell_ms: Millis,
    #[serde(default = "GazeParams::default_saccade_speed")]
    pub dynamic_saccade_speed: f32,
    #[serde(default = "GazeParams::default_side_left_x")]
    pub side_left_x: f32,
    #[serde(default = "GazeParams::default_side_right_x")]
    pub side_right_x: f32,
    #[serde(default = "GazeParams::default_side_y")]
    pub side_y: f32,
    /// Answer a sideways head turn with responding joint attention while in mutual gaze.
    #[serde(default)]
    pub respond_to_head_turns: bool,
}

impl GazeParams {
    fn default_pursuit_smoothness() -> f32 {
        DEFAULT_PURSUIT_SMOOTHNESS
    }
    fn default_saccade_speed() -> f32 {
        DEFAULT_SACCADE_SPEED
    }
    fn default_hold_ms() -> Millis {
        1_500
    }
    fn default_dwell_ms() -> Millis {
        2_000
    }
    fn default_side_left_x() -> f32 {
        0.15
    }
    fn default_side_right_x() -> f32 {
        0.85
    }
    fn default_side_y() -> f32 {
        0.5
    }

    pub fn side_target(&self, direction: GazeDirection) -> GazeCoordinate {
        let x = match direction {
            GazeDirection::Left => self.side_left_x,
            GazeDirection::Right => self.side_right_x,
        };
        GazeCoordinate::new(x, self.side_y).sanitized()
    }
}

impl Default for GazeParams {
    fn default() -> Self {
        Self {
            pursuit_smoothness: Self::default_pursuit_smoothness(),
            saccade_speed: Self::default_saccade_speed(),
            hold_ms: Self::default_hold_ms(),
            dwell_ms: Self::default_dwell_ms(),
            dynamic_saccade_speed: Self::default_saccade_speed(),
            side_left_x: Self::default_side_left_x(),
            side_right_x: Self::default_side_right_x(),
            side_y: Self::default_side_y(),
            respond_to_head_turns: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GazeDirection {
    Left,
    Right,
}

impl GazeDirection {
    pub fn flipped(self) -> Self {
        match self {
            GazeDirection::Left => GazeDirection::Right,
            GazeDirection::Right => GazeDirection::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GazeDirection::Left => "left",
            GazeDirection::Right => "right",
        }
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs for one control-loop frame.
#[derive(Debug, Clone, Copy)]
pub struct GazeFrame<'a> {
    pub now: Millis,
    pub perception: &'a PerceptionSnapshot,
}

/// Default behavior: pursue the user's face, with periodic aversions. Never finishes.
#[derive(Debug, Clone)]
pub struct MutualGaze {
    pursuit: SmoothPursuit,
    aversion: GazeAversion,
}

impl MutualGaze {
    pub fn new<R: Rng + ?Sized>(
        params: &GazeParams,
        aversion: AversionParams,
        now: Millis,
        rng: &mut R,
    ) -> Self {
        Self {
            pursuit: SmoothPursuit::new(GazeCoordinate::CENTER, params.pursuit_smoothness),
            aversion: GazeAversion::new(aversion, now, rng),
        }
    }

    pub fn aversion(&self) -> &GazeAversion {
        &self.aversion
    }

    pub fn step<R: Rng + ?Sized>(
        &mut self,
        frame: &GazeFrame<'_>,
        sink: &mut PupilSink,
        rng: &mut R,
    ) {
        if self.aversion.update(frame.now, sink, rng) {
            return;
        }
        self.pursuit.update_target(frame.perception.user_target());
        self.pursuit.step(sink);
    }
}

/// Observable stage of a joint-attention sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointAttentionStage {
    TransitionToSide,
    Hold,
    ReturnToUser,
    Done,
}

#[derive(Debug, Clone)]
enum JointAttentionPhase {
    TransitionToSide(Option<Saccade>),
    Hold(Option<Fixation>),
    ReturnToUser(Option<Saccade>),
    Done,
}

/// Look to a side, hold, then return to the user. Runs to completion once started.
#[derive(Debug, Clone)]
pub struct JointAttention {
    direction: GazeDirection,
    side_target: GazeCoordinate,
    hold_ms: Millis,
    saccade_speed: f32,
    phase: JointAttentionPhase,
}

impl JointAttention {
    pub fn new(direction: GazeDirection, params: &GazeParams) -> Self {
        Self {
            direction,
            side_target: params.side_target(direction),
            hold_ms: params.hold_ms,
            saccade_speed: params.saccade_speed,
            phase: JointAttentionPhase::TransitionToSide(None),
        }
    }

    pub fn direction(&self) -> GazeDirection {
        self.direction
    }

    pub fn side_target(&self) -> GazeCoordinate {
        self.side_target
    }

    pub fn stage(&self) -> JointAttentionStage {
        match self.phase {
            JointAttentionPhase::TransitionToSide(_) => JointAttentionStage::TransitionToSide,
            JointAttentionPhase::Hold(_) => JointAttentionStage::Hold,
            JointAttentionPhase::ReturnToUser(_) => JointAttentionStage::ReturnToUser,
            JointAttentionPhase::Done => JointAttentionStage::Done,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, JointAttentionPhase::Done)
    }

    pub fn step(&mut self, frame: &GazeFrame<'_>, sink: &mut PupilSink) {
        let side = self.side_target;
        let speed = self.saccade_speed;
        let hold_ms = self.hold_ms;
        match &mut self.phase {
            JointAttentionPhase::TransitionToSide(slot) => {
                let saccade = slot.get_or_insert_with(|| Saccade::new(sink.current(), side, speed));
                if !saccade.step(sink) {
                    self.phase = JointAttentionPhase::Hold(None);
                }
            }
            JointAttentionPhase::Hold(slot) => {
                let fixation = slot.get_or_insert_with(|| Fixation::new(side, hold_ms, frame.now));
                if !fixation.step(frame.now, sink) {
                    self.phase = JointAttentionPhase::ReturnToUser(None);
                }
            }
            JointAttentionPhase::ReturnToUser(slot) => {
                // The user target is sampled once, when the return starts.
                let saccade = slot.get_or_insert_with(|| {
                    Saccade::new(sink.current(), frame.perception.user_target(), speed)
                });
                if !saccade.step(sink) {
                    self.phase = JointAttentionPhase::Done;
                }
            }
            JointAttentionPhase::Done => {}
        }
    }
}

/// Decide which way an initiated cue actually points. With validity `p`, the
/// cue is flipped with probability `1 - p`; no validity means never flipped.
pub fn resolve_cue_direction<R: Rng + ?Sized>(
    correct: GazeDirection,
    validity: Option<f32>,
    rng: &mut R,
) -> GazeDirection {
    let Some(validity) = validity else {
        return correct;
    };
    let validity = if validity.is_finite() {
        validity.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let draw: f32 = rng.random();
    let shown = if draw >= validity {
        correct.flipped()
    } else {
        correct
    };
    info!(
        target: "gaze_validity",
        "{} gaze. Correct: {correct}, Showing: {shown}",
        if shown == correct { "Valid" } else { "Invalid" }
    );
    shown
}

#[derive(Debug, Clone)]
pub struct InitiatingJointAttention {
    requested: GazeDirection,
    inner: JointAttention,
}

impl InitiatingJointAttention {
    pub fn new<R: Rng + ?Sized>(
        correct: GazeDirection,
        condition: Option<&Condition>,
        params: &GazeParams,
        rng: &mut R,
    ) -> Self {
        let actual = resolve_cue_direction(correct, condition.and_then(|c| c.gaze_validity), rng);
        Self {
            requested: correct,
            inner: JointAttention::new(actual, params),
        }
    }

    pub fn requested_direction(&self) -> GazeDirection {
        self.requested
    }

    pub fn actual_gaze_direction(&self) -> GazeDirection {
        self.inner.direction()
    }

    pub fn joint_attention(&self) -> &JointAttention {
        &self.inner
    }
}

/// Follows an observed head turn; the direction is used as given.
#[derive(Debug, Clone)]
pub struct RespondingJointAttention {
    inner: JointAttention,
}

impl RespondingJointAttention {
    pub fn new(direction: GazeDirection, params: &GazeParams) -> Self {
        Self {
            inner: JointAttention::new(direction, params),
        }
    }

    pub fn joint_attention(&self) -> &JointAttention {
        &self.inner
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceSlot {
    First,
    Second,
}

impl FaceSlot {
    pub fn other(self) -> Self {
        match self {
            FaceSlot::First => FaceSlot::Second,
            FaceSlot::Second => FaceSlot::First,
        }
    }

    fn target(self, perception: &PerceptionSnapshot) -> Option<GazeCoordinate> {
        match self {
            FaceSlot::First => perception.face1,
            FaceSlot::Second => perception.face2,
        }
        .map(GazeCoordinate::mirrored)
    }
}

#[derive(Debug, Clone)]
enum DynamicState {
    Dwelling { since: Millis },
    Saccading(Saccade),
}

/// Alternate between two faces: dwell on one, saccade to the other, repeat.
/// Finishes as soon as no face is visible.
#[derive(Debug, Clone)]
pub struct DynamicGaze {
    dwell_ms: Millis,
    saccade_speed: f32,
    active_face: FaceSlot,
    state: DynamicState,
    finished: bool,
}

impl DynamicGaze {
    pub fn new(params: &GazeParams, now: Millis) -> Self {
        Self {
            dwell_ms: params.dwell_ms,
            saccade_speed: params.dynamic_saccade_speed,
            active_face: FaceSlot::First,
            state: DynamicState::Dwelling { since: now },
            finished: false,
        }
    }

    pub fn active_face(&self) -> FaceSlot {
        self.active_face
    }

    pub fn is_saccading(&self) -> bool {
        matches!(self.state, DynamicState::Saccading(_))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn step(&mut self, frame: &GazeFrame<'_>, sink: &mut PupilSink) {
        let perception = frame.perception;
        if perception.face1.is_none() && perception.face2.is_none() {
            SmoothPursuit::new(GazeCoordinate::CENTER, DEFAULT_PURSUIT_SMOOTHNESS).step(sink);
            self.finished = true;
            return;
        }

        match &mut self.state {
            DynamicState::Dwelling { since } => {
                let Some(target) = self.active_face.target(perception) else {
                    self.active_face = self.active_face.other();
                    *since = frame.now;
                    return;
                };
                sink.set_target(target);
                if elapsed_ms(frame.now, *since) >= self.dwell_ms {
                    if let Some(next) = self.active_face.other().target(perception) {
                        self.state = DynamicState::Saccading(Saccade::new(
                            sink.current(),
                            next,
                            self.saccade_speed,
                        ));
                    }
                }
            }
            DynamicState::Saccading(saccade) => {
                if !saccade.step(sink) {
                    self.active_face = self.active_face.other();
                    self.state = DynamicState::Dwelling { since: frame.now };
                }
            }
        }
    }
}

/// The single behavior driving the sink.
#[derive(Debug, Clone)]
pub enum Behavior {
    MutualGaze(MutualGaze),
    InitiatingJointAttention(InitiatingJointAttention),
    RespondingJointAttention(RespondingJointAttention),
    DynamicGaze(DynamicGaze),
}

impl Behavior {
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        frame: &GazeFrame<'_>,
        sink: &mut PupilSink,
        rng: &mut R,
    ) {
        match self {
            Behavior::MutualGaze(b) => b.step(frame, sink, rng),
            Behavior::InitiatingJointAttention(b) => b.inner.step(frame, sink),
            Behavior::RespondingJointAttention(b) => b.inner.step(frame, sink),
            Behavior::DynamicGaze(b) => b.step(frame, sink),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Behavior::MutualGaze(_) => false,
            Behavior::InitiatingJointAttention(b) => b.inner.is_finished(),
            Behavior::RespondingJointAttention(b) => b.inner.is_finished(),
            Behavior::DynamicGaze(b) => b.is_finished(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Behavior::MutualGaze(_) => "MutualGaze",
            Behavior::InitiatingJointAttention(_) => "InitiatingJointAttention",
            Behavior::RespondingJointAttention(_) => "RespondingJointAttention",
            Behavior::DynamicGaze(_) => "DynamicGaze",
        }
    }

    pub fn joint_attention(&self) -> Option<&JointAttention> {
        match self {
            Behavior::InitiatingJointAttention(b) => Some(&b.inner),
            Behavior::RespondingJointAttention(b) => Some(&b.inner),
            _ => None,
        }
    }

    pub fn actual_gaze_direction(&self) -> Option<GazeDirection> {
        self.joint_attention().map(JointAttention::direction)
    }
}
