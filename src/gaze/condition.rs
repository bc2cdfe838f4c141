use std::fs;
use std::path::Path;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GazeError, Result};

/// A length in pixels. Accepts plain numbers or CSS-style strings such as `"104px"`;
/// anything unparsable reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "DimensionRepr", into = "f32")]
pub struct Dimension(pub f32);

#[derive(Deserialize)]
#[serde(untagged)]
enum DimensionRepr {
    Number(f32),
    Text(String),
}

impl From<DimensionRepr> for Dimension {
    fn from(repr: DimensionRepr) -> Self {
        match repr {
            DimensionRepr::Number(v) => Dimension::px(v),
            DimensionRepr::Text(s) => Dimension::parse_css(&s),
        }
    }
}

impl From<Dimension> for f32 {
    fn from(d: Dimension) -> Self {
        d.0
    }
}

impl Dimension {
    pub fn px(v: f32) -> Self {
        if v.is_finite() { Self(v) } else { Self(0.0) }
    }

    pub fn parse_css(s: &str) -> Self {
        let number = s
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%')
            .trim();
        Self::px(number.parse::<f32>().unwrap_or(0.0))
    }
}

/// Eye and pupil sizes of the rendered face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    pub eye_width: Dimension,
    pub eye_height: Dimension,
    pub pupil_width: Dimension,
    pub pupil_height: Dimension,
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            eye_width: Dimension(104.0),
            eye_height: Dimension(84.0),
            pupil_width: Dimension(36.0),
            pupil_height: Dimension(36.0),
        }
    }
}

/// One experimental condition. Read-only to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub condition_name: String,
    /// Probability that an initiated cue points the correct way. Absent means always valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaze_validity: Option<f32>,
    #[serde(default)]
    pub initiating_joint_attention: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_config: Option<EyeConfig>,
}

impl Condition {
    pub fn named(name: &str) -> Self {
        Self {
            condition_name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_validity(mut self, validity: f32) -> Self {
        self.gaze_validity = Some(validity);
        self
    }
}

/// Randomized selector that never hands out the same condition twice in a row.
#[derive(Debug, Clone, Default)]
pub struct ConditionSelector {
    conditions: Vec<Condition>,
    last_name: Option<String>,
}

impl ConditionSelector {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            last_name: None,
        }
    }

    /// Load a JSON array of condition records.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let conditions: Vec<Condition> = serde_json::from_str(&text)?;
        if conditions.is_empty() {
            return Err(GazeError::Condition(format!(
                "{} contains no conditions",
                path.display()
            )));
        }
        info!("Loaded {} conditions from {}", conditions.len(), path.display());
        Ok(Self::new(conditions))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&Condition> {
        match self.conditions.len() {
            0 => return None,
            1 => return self.conditions.first(),
            _ => {}
        }

        let last = self.last_name.as_deref();
        let mut pool: Vec<usize> = (0..self.conditions.len())
            .filter(|&i| Some(self.conditions[i].condition_name.as_str()) != last)
            .collect();
        if pool.is_empty() {
            // Every entry shares the last name.
            pool = (0..self.conditions.len()).collect();
        }
        let idx = *pool.choose(rng)?;
        let picked = &self.conditions[idx];
        self.last_name = Some(picked.condition_name.clone());
        debug!("Next condition is \"{}\"", picked.condition_name);
        Some(picked)
    }
}
