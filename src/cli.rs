use clap::Parser;

use crate::config::AppConfig;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML
    #[arg(long, default_value = "gaze.toml")]
    pub config: String,

    /// JSON file with experimental conditions (overrides config)
    #[arg(long)]
    pub conditions: Option<String>,

    /// Seed for every random decision (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Control-loop period in milliseconds (overrides config)
    #[arg(long)]
    pub frame_ms: Option<u64>,

    /// Stop after this many frames (overrides config)
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Start in dynamic gaze instead of mutual gaze
    #[arg(long, default_value_t = false)]
    pub dynamic: bool,
}

impl Args {
    pub fn apply_overrides(&self, cfg: &mut AppConfig) {
        if let Some(path) = &self.conditions {
            cfg.conditions.path = Some(path.clone());
        }
        if let Some(seed) = self.seed {
            cfg.control_loop.seed = Some(seed);
        }
        if let Some(frame_ms) = self.frame_ms {
            cfg.control_loop.frame_ms = frame_ms;
        }
        if let Some(max_frames) = self.max_frames {
            cfg.control_loop.max_frames = Some(max_frames);
        }
    }
}
