use std::io::Write;

use serde::Serialize;
use tracing::{info, warn};

use crate::core::coord::GazeCoordinate;
use crate::gaze::condition::EyeConfig;

/// Safe horizontal range of the rendered gaze.
pub const SAFE_X: (f32, f32) = (0.05, 0.95);
/// Safe vertical range of the rendered gaze.
pub const SAFE_Y: (f32, f32) = (0.2, 0.8);

/// Pixel translation applied to both pupils.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PupilOffset {
    pub dx: f32,
    pub dy: f32,
}

/// Maximum pupil travel from the eye center, per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PupilGeometry {
    pub max_horizontal: f32,
    pub max_vertical: f32,
}

impl PupilGeometry {
    pub fn from_eye_config(cfg: &EyeConfig) -> Self {
        Self {
            max_horizontal: cfg.eye_width.0 / 2.0 - cfg.pupil_width.0 / 2.0,
            max_vertical: cfg.eye_height.0 / 2.0 - cfg.pupil_height.0 / 2.0,
        }
    }

    pub fn offset_for(&self, gaze: GazeCoordinate) -> PupilOffset {
        PupilOffset {
            dx: (gaze.x - 0.5) * 2.0 * self.max_horizontal,
            dy: (gaze.y - 0.5) * 2.0 * self.max_vertical,
        }
    }
}

impl Default for PupilGeometry {
    fn default() -> Self {
        Self::from_eye_config(&EyeConfig::default())
    }
}

/// Rendering surface for the pupils.
pub trait PupilRenderer: Send {
    fn render(&mut self, gaze: GazeCoordinate, offset: PupilOffset);
}

#[derive(Debug, Default)]
pub struct NullRenderer;

impl PupilRenderer for NullRenderer {
    fn render(&mut self, _gaze: GazeCoordinate, _offset: PupilOffset) {}
}

#[derive(Serialize)]
struct RenderLine {
    seq: u64,
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
}

/// Writes one JSON object per rendered target.
#[derive(Debug)]
pub struct JsonLinesRenderer<W: Write> {
    out: W,
    seq: u64,
    failed: bool,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            seq: 0,
            failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> PupilRenderer for JsonLinesRenderer<W> {
    fn render(&mut self, gaze: GazeCoordinate, offset: PupilOffset) {
        let line = RenderLine {
            seq: self.seq,
            x: gaze.x,
            y: gaze.y,
            dx: offset.dx,
            dy: offset.dy,
        };
        self.seq += 1;
        let res = serde_json::to_writer(&mut self.out, &line)
            .map_err(std::io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"));
        if let Err(err) = res {
            // Only report the first failure; the renderer keeps accepting targets.
            if !self.failed {
                warn!("Pupil renderer unavailable: {err}");
                self.failed = true;
            }
        }
    }
}

/// Actuator output sink. Holds the authoritative current gaze that every
/// interpolating primitive starts from.
pub struct PupilSink {
    current: GazeCoordinate,
    geometry: PupilGeometry,
    last_offset: PupilOffset,
    renderer: Box<dyn PupilRenderer>,
}

impl std::fmt::Debug for PupilSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PupilSink")
            .field("current", &self.current)
            .field("geometry", &self.geometry)
            .field("last_offset", &self.last_offset)
            .finish_non_exhaustive()
    }
}

impl Default for PupilSink {
    fn default() -> Self {
        Self::new(Box::new(NullRenderer))
    }
}

impl PupilSink {
    pub fn new(renderer: Box<dyn PupilRenderer>) -> Self {
        Self {
            current: GazeCoordinate::CENTER,
            geometry: PupilGeometry::default(),
            last_offset: PupilOffset::default(),
            renderer,
        }
    }

    pub fn with_geometry(mut self, eye: &EyeConfig) -> Self {
        self.geometry = PupilGeometry::from_eye_config(eye);
        self
    }

    pub fn current(&self) -> GazeCoordinate {
        self.current
    }

    pub fn geometry(&self) -> PupilGeometry {
        self.geometry
    }

    pub fn last_offset(&self) -> PupilOffset {
        self.last_offset
    }

    /// Clamp into the safe range, remember it as the current gaze and render it.
    pub fn set_target(&mut self, target: GazeCoordinate) {
        let clamped = target.sanitized().clamped(SAFE_X, SAFE_Y);
        let offset = self.geometry.offset_for(clamped);
        self.current = clamped;
        self.last_offset = offset;
        self.renderer.render(clamped, offset);
    }

    /// Recompute the coordinate-to-offset scale. The current gaze is kept.
    pub fn update_dimensions(&mut self, eye: &EyeConfig) {
        self.geometry = PupilGeometry::from_eye_config(eye);
        info!(
            "Pupil dimensions updated: h_offset={:.1} v_offset={:.1}",
            self.geometry.max_horizontal, self.geometry.max_vertical
        );
    }
}
