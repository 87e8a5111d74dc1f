use std::cell::RefCell;
use std::rc::Rc;

use engine::content::read_area_file;
use engine::world::VICoord;
use engine::{
    load_area, resolve_app_paths, Area, AreaLoadError, Camera, CameraBounds, CatalogError,
    Character, CharacterKind, ClientConf, ConfigError, EntityCatalog, InputAction, SpawnError,
    StartupError, Verbosity,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::loop_runner::{LoopConfig, ScriptStep};

const START_AREA_ENV_VAR: &str = "TESSERA_START_AREA";
const INPUT_SCRIPT_ENV_VAR: &str = "TESSERA_INPUT";
const DEFAULT_START_AREA: &str = "grove";
const DEFAULT_INPUT_SCRIPT: &str = "right,right,down,down,left,quit";
const PLAYER_DESCRIPTOR: &str = "hero";
const PLAYER_PHASE: &str = "down";
/// Frames between scripted key presses.
const SCRIPT_BEAT_FRAMES: u32 = 20;

#[derive(Debug, Error)]
pub(crate) enum HostError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    AreaLoad(#[from] AreaLoadError),
    #[error("failed to create player: {0}")]
    Player(#[source] SpawnError),
}

pub(crate) struct AppWiring {
    pub(crate) conf: ClientConf,
    pub(crate) loop_config: LoopConfig,
    pub(crate) area: Area,
    pub(crate) camera: Camera,
    pub(crate) script: Vec<ScriptStep>,
}

pub(crate) fn build_app() -> Result<AppWiring, HostError> {
    let settings = resolve_app_paths()
        .map_err(HostError::from)
        .and_then(|paths| {
            let conf = ClientConf::load_or_default(&paths.client_conf_path)?;
            Ok((paths, conf))
        });
    let verbosity = settings
        .as_ref()
        .map(|(_, conf)| conf.engine.verbosity)
        .unwrap_or_default();
    init_tracing(verbosity);
    let (paths, conf) = settings?;

    info!("=== Tessera Startup ===");
    info!(
        root = %paths.root.display(),
        move_mode = ?conf.engine.move_mode,
        width = conf.window.width,
        height = conf.window.height,
        fullscreen = conf.window.fullscreen,
        cache_ttl_s = conf.cache.ttl,
        "client_config_loaded"
    );

    let catalog = Rc::new(EntityCatalog::load(&paths.catalog_path)?);
    info!(entities = catalog.len(), "entity_catalog_loaded");

    let player = Character::from_catalog(
        CharacterKind::Player,
        &catalog,
        PLAYER_DESCRIPTOR,
        PLAYER_PHASE,
    )
    .map_err(HostError::Player)?;
    let player = Rc::new(RefCell::new(player));

    let start_area = std::env::var(START_AREA_ENV_VAR)
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_START_AREA.to_string());
    let area_file = read_area_file(&paths.areas_dir.join(format!("{start_area}.json")))?;
    let mut area = load_area(&area_file, player, catalog)?;

    let entry = match area_file.entry {
        Some(entry) => VICoord::new(entry.x, entry.y, entry.depth),
        None => VICoord::new(0, 0, area.index_depth(0)),
    };
    area.place_player(entry);

    let camera = build_camera(&area, &conf);
    let script = parse_input_script(
        &std::env::var(INPUT_SCRIPT_ENV_VAR).unwrap_or_else(|_| DEFAULT_INPUT_SCRIPT.to_string()),
        SCRIPT_BEAT_FRAMES,
    );

    Ok(AppWiring {
        conf,
        loop_config: LoopConfig::default(),
        area,
        camera,
        script,
    })
}

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn build_camera(area: &Area, conf: &ClientConf) -> Camera {
    let dim = area.dimensions();
    let tile = area.tile_dimensions();
    let mut camera = Camera::new((f64::from(conf.window.width), f64::from(conf.window.height)));
    camera.set_bounds(Some(CameraBounds {
        width_px: f64::from(dim.width) * f64::from(tile.x),
        height_px: f64::from(dim.height) * f64::from(tile.y),
        loop_x: area.loops_in_x(),
        loop_y: area.loops_in_y(),
    }));
    camera.follow(Rc::downgrade(area.player()));
    camera
}

/// Turns `"right,down,quit"` into press/release pairs, one action per beat.
/// Unknown entries are skipped with a warning.
pub(crate) fn parse_input_script(raw: &str, beat_frames: u32) -> Vec<ScriptStep> {
    let beat_frames = beat_frames.max(2);
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let action = parse_action(entry);
            if action.is_none() {
                warn!(entry, "unknown_input_action");
            }
            action
        })
        .enumerate()
        .flat_map(|(beat, action)| {
            let press = (beat as u32 + 1) * beat_frames;
            [
                ScriptStep {
                    frame: press,
                    action,
                    pressed: true,
                },
                ScriptStep {
                    frame: press + beat_frames / 2,
                    action,
                    pressed: false,
                },
            ]
        })
        .collect()
}

fn parse_action(raw: &str) -> Option<InputAction> {
    match raw.to_ascii_lowercase().as_str() {
        "up" => Some(InputAction::MoveUp),
        "down" => Some(InputAction::MoveDown),
        "left" => Some(InputAction::MoveLeft),
        "right" => Some(InputAction::MoveRight),
        "quit" | "escape" => Some(InputAction::Quit),
        _ => None,
    }
}
