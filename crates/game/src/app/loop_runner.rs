use std::process::ExitCode;
use std::time::Duration;

use engine::{Area, Camera, DrawSink, InputAction, MoveMode, MusicCue};
use tracing::{debug, info, warn};

use super::bootstrap::AppWiring;

#[derive(Debug, Clone)]
pub(crate) struct LoopConfig {
    pub(crate) target_tps: u32,
    /// Simulated wall time between rendered frames.
    pub(crate) frame_delta: Duration,
    pub(crate) max_frame_delta: Duration,
    pub(crate) max_ticks_per_frame: u32,
    /// Hard stop when the input script never quits.
    pub(crate) max_frames: u32,
    pub(crate) metrics_log_interval_frames: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            frame_delta: Duration::from_millis(33),
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            max_frames: 1_800,
            metrics_log_interval_frames: 60,
        }
    }
}

/// One scripted key event, applied at the start of `frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScriptStep {
    pub(crate) frame: u32,
    pub(crate) action: InputAction,
    pub(crate) pressed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LoopStats {
    pub(crate) frames: u32,
    pub(crate) ticks: u64,
    pub(crate) turns: u32,
    pub(crate) frames_drawn: u32,
    pub(crate) draw_calls: u64,
    pub(crate) quit_requested: bool,
}

/// Draw sink for the headless host: counts calls and logs each frame.
#[derive(Debug, Default)]
pub(crate) struct LogSink {
    images: u64,
    rects: u64,
    frame_images: u32,
    frame_rects: u32,
}

impl LogSink {
    pub(crate) fn total_calls(&self) -> u64 {
        self.images + self.rects
    }

    fn finish_frame(&mut self, now_ms: u64) {
        debug!(
            now_ms,
            images = self.frame_images,
            rects = self.frame_rects,
            "frame_drawn"
        );
        self.frame_images = 0;
        self.frame_rects = 0;
    }
}

impl DrawSink for LogSink {
    fn draw_image(&mut self, _key: &str, _x: f64, _y: f64, _z: f64) {
        self.images += 1;
        self.frame_images += 1;
    }

    fn fill_rect(&mut self, _argb: u32, _x: f64, _y: f64, _width: f64, _height: f64) {
        self.rects += 1;
        self.frame_rects += 1;
    }
}

/// Music seam for the headless host: logs what would play.
#[derive(Debug)]
pub(crate) struct LogMusic {
    pub(crate) volume: u8,
    pub(crate) current: Option<String>,
}

impl MusicCue for LogMusic {
    fn play(&mut self, path: &str) {
        if self.current.as_deref() == Some(path) {
            return;
        }
        info!(path, volume = self.volume, "music_started");
        self.current = Some(path.to_string());
    }
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        conf,
        loop_config,
        mut area,
        mut camera,
        script,
    } = app;
    let mut music = LogMusic {
        volume: conf.audio.musicvolume,
        current: None,
    };
    let mut sink = LogSink::default();

    area.focus(&mut music);
    let stats = run_loop(
        &loop_config,
        conf.engine.move_mode,
        &mut area,
        &mut camera,
        &script,
        &mut sink,
    );
    info!(
        frames = stats.frames,
        ticks = stats.ticks,
        turns = stats.turns,
        frames_drawn = stats.frames_drawn,
        draw_calls = stats.draw_calls,
        quit_requested = stats.quit_requested,
        "loop_finished"
    );

    ExitCode::SUCCESS
}

/// Fixed-timestep frame loop. In `Turn` mode each key press completes one
/// player action, so the area takes one `turn()` per press.
pub(crate) fn run_loop(
    config: &LoopConfig,
    mode: MoveMode,
    area: &mut Area,
    camera: &mut Camera,
    script: &[ScriptStep],
    sink: &mut LogSink,
) -> LoopStats {
    let target_tps = config.target_tps.max(1);
    let fixed_dt = Duration::from_secs_f64(1.0 / f64::from(target_tps));
    let fixed_dt_ms = fixed_dt.as_millis() as u64;
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let frame_delta = clamp_frame_delta(config.frame_delta, config.max_frame_delta);

    let mut stats = LoopStats::default();
    let mut accumulator = Duration::ZERO;
    let mut now = Duration::ZERO;
    let mut next_step = 0usize;

    while stats.frames < config.max_frames {
        let frame = stats.frames;
        while let Some(step) = script.get(next_step).filter(|step| step.frame <= frame) {
            next_step += 1;
            if step.action == InputAction::Quit {
                if step.pressed {
                    info!(frame, "quit_requested");
                    stats.quit_requested = true;
                }
                continue;
            }
            if step.pressed {
                area.button_down(step.action);
                if mode == MoveMode::Turn {
                    area.turn(mode, camera);
                    stats.turns += 1;
                }
            } else {
                area.button_up(step.action);
            }
        }
        if stats.quit_requested {
            break;
        }

        now = now.saturating_add(frame_delta);
        accumulator = accumulator.saturating_add(frame_delta);
        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            area.tick(fixed_dt_ms, mode, camera);
            stats.ticks += 1;
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        let now_ms = now.as_millis() as u64;
        if area.needs_redraw(now_ms, camera) {
            area.draw(now_ms, camera, sink);
            sink.finish_frame(now_ms);
            stats.frames_drawn += 1;
        }
        stats.frames += 1;

        if config.metrics_log_interval_frames > 0
            && stats.frames % config.metrics_log_interval_frames == 0
        {
            let player = area.player().borrow();
            let tile = player.tile();
            info!(
                frames = stats.frames,
                ticks = stats.ticks,
                frames_drawn = stats.frames_drawn,
                characters = area.characters().len(),
                overlays = area.overlays().len(),
                player_x = tile.x,
                player_y = tile.y,
                "loop_metrics"
            );
        }
    }

    stats.draw_calls = sink.total_calls();
    stats
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}
