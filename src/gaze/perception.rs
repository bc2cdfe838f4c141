use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Deserialize;

use crate::core::coord::GazeCoordinate;
use crate::error::Result;
use crate::gaze::behavior::GazeDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadDirection {
    #[default]
    None,
    Left,
    Right,
    Up,
    Down,
    Other,
}

impl From<&str> for HeadDirection {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => HeadDirection::None,
            "left" => HeadDirection::Left,
            "right" => HeadDirection::Right,
            "up" => HeadDirection::Up,
            "down" => HeadDirection::Down,
            _ => HeadDirection::Other,
        }
    }
}

impl HeadDirection {
    /// Sideways head turns map onto a joint-attention direction.
    pub fn as_gaze_direction(self) -> Option<GazeDirection> {
        match self {
            HeadDirection::Left => Some(GazeDirection::Left),
            HeadDirection::Right => Some(GazeDirection::Right),
            _ => None,
        }
    }
}

/// Latest perception estimate. Behaviors only ever read it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerceptionSnapshot {
    pub user_present: bool,
    pub face1: Option<GazeCoordinate>,
    pub face2: Option<GazeCoordinate>,
    pub head_direction: HeadDirection,
}

impl PerceptionSnapshot {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn with_face(x: f32, y: f32) -> Self {
        Self {
            user_present: true,
            face1: Some(GazeCoordinate::new(x, y)),
            ..Self::default()
        }
    }

    pub fn with_two_faces(first: (f32, f32), second: (f32, f32)) -> Self {
        Self {
            user_present: true,
            face1: Some(first.into()),
            face2: Some(second.into()),
            ..Self::default()
        }
    }

    /// Where the eyes should look to meet the primary user; center when nobody is there.
    pub fn user_target(&self) -> GazeCoordinate {
        match (self.user_present, self.face1) {
            (true, Some(face)) => face.mirrored(),
            _ => GazeCoordinate::CENTER,
        }
    }
}

/// `faceDetection` payload as pushed by the perception source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaceDetection {
    pub user_in_front: bool,
    pub face_x: Option<f32>,
    pub face_y: Option<f32>,
    pub second_face_x: Option<f32>,
    pub second_face_y: Option<f32>,
    pub head_direction: Option<String>,
}

fn face(x: Option<f32>, y: Option<f32>) -> Option<GazeCoordinate> {
    match (x, y) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
            Some(GazeCoordinate::new(x, y).sanitized())
        }
        _ => None,
    }
}

impl From<FaceDetection> for PerceptionSnapshot {
    fn from(msg: FaceDetection) -> Self {
        Self {
            user_present: msg.user_in_front,
            face1: face(msg.face_x, msg.face_y),
            face2: face(msg.second_face_x, msg.second_face_y),
            head_direction: msg
                .head_direction
                .as_deref()
                .map(HeadDirection::from)
                .unwrap_or_default(),
        }
    }
}

/// Everything the engine accepts on its input stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum InboundMessage {
    FaceDetection(FaceDetection),
    Trigger { direction: GazeDirection },
    Respond { direction: GazeDirection },
    Dynamic,
    NextCondition,
}

impl InboundMessage {
    pub fn decode(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

#[derive(Debug, Clone)]
pub struct PerceptionPublisher {
    tx: Sender<PerceptionSnapshot>,
}

impl PerceptionPublisher {
    /// Returns false once the feed has been dropped.
    pub fn publish(&self, snapshot: PerceptionSnapshot) -> bool {
        self.tx.send(snapshot).is_ok()
    }
}

/// Last-write-wins mailbox read once per frame by the control loop.
#[derive(Debug)]
pub struct PerceptionFeed {
    rx: Receiver<PerceptionSnapshot>,
    latest: PerceptionSnapshot,
}

pub fn perception_channel() -> (PerceptionPublisher, PerceptionFeed) {
    let (tx, rx) = unbounded();
    (
        PerceptionPublisher { tx },
        PerceptionFeed {
            rx,
            latest: PerceptionSnapshot::default(),
        },
    )
}

impl PerceptionFeed {
    /// Drain the backlog and keep only the newest snapshot.
    pub fn latest(&mut self) -> &PerceptionSnapshot {
        for snapshot in self.rx.try_iter() {
            self.latest = snapshot;
        }
        &self.latest
    }
}
