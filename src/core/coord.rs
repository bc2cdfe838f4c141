use serde::{Deserialize, Serialize};

/// Normalized 2D gaze target. (0.5, 0.5) is straight ahead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeCoordinate {
    pub x: f32,
    pub y: f32,
}

impl GazeCoordinate {
    pub const CENTER: Self = Self { x: 0.5, y: 0.5 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Non-finite components fall back to center, the rest are clamped into [0, 1].
    pub fn sanitized(self) -> Self {
        let fix = |v: f32| {
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                0.5
            }
        };
        Self {
            x: fix(self.x),
            y: fix(self.y),
        }
    }

    /// Camera space to actuator space: the face on the camera's left is on the eyes' right.
    pub fn mirrored(self) -> Self {
        Self {
            x: 1.0 - self.x,
            y: self.y,
        }
    }

    pub fn clamped(self, x_range: (f32, f32), y_range: (f32, f32)) -> Self {
        Self {
            x: self.x.clamp(x_range.0, x_range.1),
            y: self.y.clamp(y_range.0, y_range.1),
        }
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Default for GazeCoordinate {
    fn default() -> Self {
        Self::CENTER
    }
}

impl From<(f32, f32)> for GazeCoordinate {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}
