use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::core::timebase::Millis;
use crate::error::{GazeError, Result};
use crate::gaze::aversion::AversionParams;
use crate::gaze::behavior::GazeParams;
use crate::gaze::condition::EyeConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "LoopConfig::default_frame_ms")]
    pub frame_ms: Millis,
    /// Fixed RNG seed; unset means fresh entropy on every run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<u64>,
}

impl LoopConfig {
    fn default_frame_ms() -> Millis {
        16
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_ms: Self::default_frame_ms(),
            seed: None,
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionsConfig {
    /// JSON array of condition records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gaze: GazeParams,
    #[serde(default)]
    pub aversion: AversionParams,
    #[serde(default)]
    pub sink: EyeConfig,
    #[serde(default)]
    pub control_loop: LoopConfig,
    #[serde(default)]
    pub conditions: ConditionsConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        toml::from_str(&text).map_err(|err| GazeError::Config(err.to_string()))
    }

    fn format_f32_compact(x: f32) -> String {
        let mut s = format!("{:.6}", x);
        while s.contains('.') && s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        if s.is_empty() { "0".to_string() } else { s }
    }

    /// `key = 0.10000000149011612` becomes `key = 0.1`; other lines are untouched.
    fn compact_float_line(line: &str) -> Option<String> {
        let (lhs, rhs) = line.split_once('=')?;
        let rhs = rhs.trim();
        let has_decimal = rhs.contains('.');
        if !(has_decimal || rhs.contains('e') || rhs.contains('E')) || rhs.contains('"') {
            return None;
        }
        let val = rhs.parse::<f32>().ok()?;
        let mut formatted = Self::format_f32_compact(val);
        if has_decimal && !formatted.contains('.') {
            formatted.push_str(".0");
        }
        Some(format!("{} = {}", lhs.trim(), formatted))
    }

    /// Defaults as TOML with every value commented out, section headers kept.
    pub fn commented_defaults() -> Result<String> {
        let text = toml::to_string_pretty(&Self::default())
            .map_err(|err| GazeError::Config(err.to_string()))?;
        let mut out = String::with_capacity(text.len() * 2);
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || (trimmed.starts_with('[') && trimmed.ends_with(']')) {
                out.push_str(line);
            } else {
                out.push_str("# ");
                match Self::compact_float_line(line) {
                    Some(compact) => out.push_str(&compact),
                    None => out.push_str(line),
                }
            }
            out.push('\n');
        }
        Ok(out)
    }

    /// Read `path`, falling back to defaults on any problem. A missing file is
    /// created with the defaults commented out.
    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            return match Self::load(path_obj) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to load config {path}: {err}. Using defaults.");
                    Self::default()
                }
            };
        }

        match Self::commented_defaults() {
            Ok(text) => {
                if let Err(err) = fs::write(path_obj, text) {
                    warn!("Failed to write default config to {path}: {err}");
                }
            }
            Err(err) => warn!("Failed to serialize default config: {err}"),
        }
        Self::default()
    }
}
