//! Headless control loop: JSON lines in (perception and commands), rendered
//! pupil targets out, one frame per period.

use std::io::{BufRead, ErrorKind, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{info, trace, warn};

use crate::config::AppConfig;
use crate::core::timebase::{Clock, Millis, SystemClock};
use crate::error::Result;
use crate::gaze::behavior::GazeDirection;
use crate::gaze::condition::ConditionSelector;
use crate::gaze::orchestrator::Orchestrator;
use crate::gaze::perception::{InboundMessage, PerceptionPublisher, perception_channel};
use crate::gaze::sink::{JsonLinesRenderer, PupilSink};

pub const MAX_FRAME_MS: Millis = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Trigger(GazeDirection),
    Respond(GazeDirection),
    Dynamic,
    NextCondition,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub start_dynamic: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub triggers: u64,
    /// Only known when the input reached EOF before the loop stopped.
    pub malformed_lines: Option<u64>,
}

/// Read JSON lines until EOF, routing face detections to the perception feed
/// and everything else to the command channel. Returns the number of lines
/// that could not be decoded.
pub fn spawn_input_reader<I>(
    mut input: I,
    perception: PerceptionPublisher,
    commands: Sender<ControlCommand>,
) -> Result<thread::JoinHandle<u64>>
where
    I: BufRead + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("perception-input".into())
        .spawn(move || {
            let mut malformed = 0;
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match input.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!("Perception input failed: {err}");
                        break;
                    }
                }
                let line = match std::str::from_utf8(&buf) {
                    Ok(line) => line.trim(),
                    Err(err) => {
                        malformed += 1;
                        warn!("Ignoring input line that is not UTF-8: {err}");
                        continue;
                    }
                };
                if line.is_empty() {
                    continue;
                }
                let cmd = match InboundMessage::decode(line) {
                    Ok(InboundMessage::FaceDetection(det)) => {
                        if !perception.publish(det.into()) {
                            break;
                        }
                        continue;
                    }
                    Ok(InboundMessage::Trigger { direction }) => ControlCommand::Trigger(direction),
                    Ok(InboundMessage::Respond { direction }) => ControlCommand::Respond(direction),
                    Ok(InboundMessage::Dynamic) => ControlCommand::Dynamic,
                    Ok(InboundMessage::NextCondition) => ControlCommand::NextCondition,
                    Err(err) => {
                        malformed += 1;
                        warn!("Ignoring malformed input line: {err}");
                        continue;
                    }
                };
                if commands.send(cmd).is_err() {
                    break;
                }
            }
            malformed
        })?;
    Ok(handle)
}

/// Loop period for `frame_ms`, kept within `[1, MAX_FRAME_MS]`.
pub fn frame_period(frame_ms: Millis) -> Duration {
    let clamped = frame_ms.clamp(1, MAX_FRAME_MS);
    if clamped != frame_ms {
        warn!("frame_ms={frame_ms} out of range; using {clamped}");
    }
    Duration::from_millis(clamped)
}

fn load_selector(cfg: &AppConfig) -> ConditionSelector {
    let Some(path) = cfg.conditions.path.as_deref() else {
        return ConditionSelector::default();
    };
    match ConditionSelector::load(path) {
        Ok(selector) => selector,
        Err(err) => {
            warn!("Failed to load conditions from {path}: {err}. Running without conditions.");
            ConditionSelector::default()
        }
    }
}

fn apply_command<C: Clock>(
    orch: &mut Orchestrator<C>,
    selector: &mut ConditionSelector,
    rng: &mut SmallRng,
    cmd: ControlCommand,
    summary: &mut RunSummary,
) {
    match cmd {
        ControlCommand::Trigger(direction) => {
            orch.trigger_with_current(direction);
            summary.triggers += 1;
        }
        ControlCommand::Respond(direction) => orch.respond(direction),
        ControlCommand::Dynamic => orch.start_dynamic(),
        ControlCommand::NextCondition => match selector.next(rng).cloned() {
            Some(condition) => orch.apply_condition(condition),
            None => warn!("nextCondition requested but no conditions are loaded"),
        },
    }
}

/// Drain pending commands. Returns false once the input side has hung up.
fn drain_commands<C: Clock>(
    rx: &Receiver<ControlCommand>,
    orch: &mut Orchestrator<C>,
    selector: &mut ConditionSelector,
    rng: &mut SmallRng,
    summary: &mut RunSummary,
) -> bool {
    loop {
        match rx.try_recv() {
            Ok(cmd) => apply_command(orch, selector, rng, cmd, summary),
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

/// Run until `stop` is raised, the frame limit is hit, or (without a frame
/// limit) the input reaches EOF.
pub fn run<I, W>(
    cfg: &AppConfig,
    options: RunOptions,
    input: I,
    output: W,
    stop: Arc<AtomicBool>,
) -> Result<RunSummary>
where
    I: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let mut rng = match cfg.control_loop.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_rng(&mut rand::rng()),
    };
    let engine_rng = SmallRng::seed_from_u64(rng.random());
    let mut selector = load_selector(cfg);

    let sink = PupilSink::new(Box::new(JsonLinesRenderer::new(output))).with_geometry(&cfg.sink);
    let mut orch = Orchestrator::new(cfg.gaze, cfg.aversion, sink, SystemClock::new(), engine_rng);
    if selector.is_empty() {
        info!("No conditions loaded; cues keep their nominal direction");
    } else if let Some(condition) = selector.next(&mut rng).cloned() {
        orch.apply_condition(condition);
    }
    if options.start_dynamic {
        orch.start_dynamic();
    }

    let (publisher, mut feed) = perception_channel();
    let (cmd_tx, cmd_rx) = unbounded::<ControlCommand>();
    let reader = spawn_input_reader(input, publisher, cmd_tx)?;

    let max_frames = cfg.control_loop.max_frames;
    let period = frame_period(cfg.control_loop.frame_ms);
    let mut summary = RunSummary::default();
    let mut input_open = true;
    let mut next_deadline = Instant::now();

    info!(
        "Gaze loop started: frame_ms={} max_frames={:?} conditions={}",
        period.as_millis(),
        max_frames,
        selector.len()
    );

    loop {
        if stop.load(Ordering::SeqCst) {
            info!("Stop requested");
            break;
        }
        if max_frames.is_some_and(|max| summary.frames >= max) {
            break;
        }
        next_deadline = next_deadline.checked_add(period).unwrap_or_else(Instant::now);

        if input_open {
            input_open = drain_commands(&cmd_rx, &mut orch, &mut selector, &mut rng, &mut summary);
        }
        let snapshot = *feed.latest();
        orch.tick(&snapshot);
        summary.frames += 1;

        if !input_open && max_frames.is_none() {
            info!("Input closed");
            break;
        }

        let now = Instant::now();
        if now < next_deadline {
            thread::sleep(next_deadline - now);
        } else {
            next_deadline = now;
            trace!("gaze loop overrun");
        }
    }

    // A reader still blocked on live input is left detached.
    if !input_open {
        summary.malformed_lines = reader.join().ok();
    }
    info!(
        "Gaze loop stopped after {} frames ({} triggers)",
        summary.frames, summary.triggers
    );
    Ok(summary)
}
