use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::config::MoveMode;
use crate::content::{EntityCatalog, EntityDef};

use super::coords::{isometric_z_offset, Cuboid, ICoord, IVec2, RCoord};
use super::grid::TileGrid;
use super::render::DrawSink;
use super::tile::Animation;

/// Entities are shared between their area and whoever spawned them.
pub type Shared<T> = Rc<RefCell<T>>;

/// Identifies an area without keeping it alive. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaId(pub u64);

static NEXT_AREA_ID: AtomicU64 = AtomicU64::new(0);

impl AreaId {
    pub(crate) fn allocate() -> Self {
        Self(NEXT_AREA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("unknown entity descriptor '{descriptor}'")]
    UnknownDescriptor { descriptor: String },
    #[error("entity '{descriptor}' has no phase '{phase}'")]
    UnknownPhase { descriptor: String, phase: String },
}

/// State common to characters and overlays.
#[derive(Debug, Clone)]
pub struct EntityCore {
    def: Rc<EntityDef>,
    phase: String,
    animation: Animation,
    pixel: RCoord,
    area: Option<AreaId>,
    dead: bool,
    redraw: bool,
    last_drawn_ms: u64,
}

impl EntityCore {
    pub fn from_catalog(
        catalog: &EntityCatalog,
        descriptor: &str,
        phase: &str,
    ) -> Result<Self, SpawnError> {
        let (def, animation) = catalog.resolve(descriptor, phase)?;
        Ok(Self {
            def,
            phase: phase.to_string(),
            animation,
            pixel: RCoord::default(),
            area: None,
            dead: false,
            redraw: true,
            last_drawn_ms: 0,
        })
    }

    pub fn descriptor(&self) -> &str {
        &self.def.name
    }

    pub fn def(&self) -> &EntityDef {
        &self.def
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn set_phase(&mut self, phase: &str, now_ms: u64) -> Result<(), SpawnError> {
        if phase == self.phase {
            return Ok(());
        }
        let mut animation =
            self.def
                .phase(phase)
                .cloned()
                .ok_or_else(|| SpawnError::UnknownPhase {
                    descriptor: self.def.name.clone(),
                    phase: phase.to_string(),
                })?;
        animation.restart(now_ms);
        self.animation = animation;
        self.phase = phase.to_string();
        self.redraw = true;
        Ok(())
    }

    pub fn pixel(&self) -> RCoord {
        self.pixel
    }

    pub fn set_pixel(&mut self, pixel: RCoord) {
        if pixel != self.pixel {
            self.pixel = pixel;
            self.redraw = true;
        }
    }

    /// Area this entity currently belongs to, if any.
    pub fn area(&self) -> Option<AreaId> {
        self.area
    }

    pub fn set_area(&mut self, area: Option<AreaId>) {
        self.area = area;
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Marks the entity for removal at the end of its area's next update.
    pub fn destroy(&mut self) {
        self.dead = true;
        self.redraw = true;
    }

    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    /// Whether this entity changed since it was last drawn and overlaps the
    /// visible pixel box.
    pub fn needs_redraw(&self, visible_px: &Cuboid, now_ms: u64) -> bool {
        let size = self.def.size;
        let on_screen = visible_px.intersects_rect(
            self.pixel.x,
            self.pixel.y,
            f64::from(size.x),
            f64::from(size.y),
        );
        on_screen && (self.redraw || self.animation.needs_redraw(self.last_drawn_ms, now_ms))
    }

    pub fn draw(&mut self, sink: &mut dyn DrawSink, tile_height: i32, now_ms: u64) {
        if !self.dead {
            if let Some(frame) = self.animation.frame(now_ms) {
                let z = self.pixel.z + isometric_z_offset(self.pixel.y, tile_height);
                sink.draw_image(frame, self.pixel.x, self.pixel.y, z);
            }
        }
        self.redraw = false;
        self.last_drawn_ms = now_ms;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterKind {
    Player,
    Npc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    from: RCoord,
    to: RCoord,
    dest: ICoord,
    progress: f64,
}

/// A movable actor: the player or an NPC.
///
/// Held directions form a stack; the most recently pressed one drives
/// movement.
#[derive(Debug, Clone)]
pub struct Character {
    core: EntityCore,
    kind: CharacterKind,
    tile: ICoord,
    facing: IVec2,
    held: Vec<IVec2>,
    step: Option<Step>,
}

impl Character {
    pub fn from_catalog(
        kind: CharacterKind,
        catalog: &EntityCatalog,
        descriptor: &str,
        phase: &str,
    ) -> Result<Self, SpawnError> {
        Ok(Self {
            core: EntityCore::from_catalog(catalog, descriptor, phase)?,
            kind,
            tile: ICoord::default(),
            facing: IVec2::new(0, 1),
            held: Vec::new(),
            step: None,
        })
    }

    pub fn kind(&self) -> CharacterKind {
        self.kind
    }

    pub fn core(&self) -> &EntityCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    pub fn is_dead(&self) -> bool {
        self.core.is_dead()
    }

    pub fn tile(&self) -> ICoord {
        self.tile
    }

    pub fn facing(&self) -> IVec2 {
        self.facing
    }

    pub fn is_moving(&self) -> bool {
        self.step.is_some()
    }

    /// Puts the character on `tile`, cancelling any step in progress.
    pub fn place(&mut self, tile: ICoord, pixel: RCoord) {
        self.tile = tile;
        self.step = None;
        self.core.set_pixel(pixel);
        self.core.request_redraw();
    }

    pub fn start_movement(&mut self, direction: IVec2) {
        if !self.held.contains(&direction) {
            self.held.push(direction);
        }
    }

    pub fn stop_movement(&mut self, direction: IVec2) {
        self.held.retain(|held| *held != direction);
    }

    fn active_direction(&self) -> Option<IVec2> {
        self.held.last().copied()
    }

    /// Per-frame update. Turn-based areas never call this for characters,
    /// and it never moves anything in `MoveMode::Turn`.
    pub fn tick(&mut self, dt_ms: u64, mode: MoveMode, grid: &TileGrid) {
        match mode {
            MoveMode::Turn => {}
            MoveMode::Tile => self.tick_tile(dt_ms, grid),
            MoveMode::Notile => self.tick_free(dt_ms, grid),
        }
    }

    /// Moves exactly one tile in the active direction if the destination is
    /// in bounds.
    pub fn turn(&mut self, grid: &TileGrid) {
        let Some(direction) = self.active_direction() else {
            return;
        };
        self.facing = direction;
        let dest = self.tile.offset(direction);
        if !grid.in_bounds(dest) {
            return;
        }
        let dest = grid.wrap(dest);
        let pixel = self.tile_pixel(dest, grid);
        self.tile = dest;
        self.core.set_pixel(pixel);
    }

    fn tile_pixel(&self, tile: ICoord, grid: &TileGrid) -> RCoord {
        let tile_dim = grid.tile_dim();
        RCoord {
            x: f64::from(tile.x) * f64::from(tile_dim.x),
            y: f64::from(tile.y) * f64::from(tile_dim.y),
            z: self.core.pixel.z,
        }
    }

    fn try_begin_step(&mut self, grid: &TileGrid) -> bool {
        let Some(direction) = self.active_direction() else {
            return false;
        };
        self.facing = direction;
        let dest = self.tile.offset(direction);
        if !grid.in_bounds(dest) {
            return false;
        }
        self.step = Some(Step {
            from: self.core.pixel,
            to: self.tile_pixel(dest, grid),
            dest,
            progress: 0.0,
        });
        true
    }

    fn tick_tile(&mut self, dt_ms: u64, grid: &TileGrid) {
        let mut budget = self.core.def.speed_tiles_per_sec * dt_ms as f64 / 1000.0;
        loop {
            if self.step.is_none() && !self.try_begin_step(grid) {
                return;
            }
            let Some(mut step) = self.step else {
                return;
            };
            let remaining = 1.0 - step.progress;
            if budget >= remaining && remaining > 0.0 {
                budget -= remaining;
                let dest = grid.wrap(step.dest);
                let pixel = self.tile_pixel(dest, grid);
                self.tile = dest;
                self.step = None;
                self.core.set_pixel(pixel);
                continue;
            }
            step.progress += budget;
            self.step = Some(step);
            self.core.set_pixel(lerp(step.from, step.to, step.progress));
            return;
        }
    }

    fn tick_free(&mut self, dt_ms: u64, grid: &TileGrid) {
        let Some(direction) = self.active_direction() else {
            return;
        };
        self.facing = direction;
        let tile_dim = grid.tile_dim();
        let tiles = self.core.def.speed_tiles_per_sec * dt_ms as f64 / 1000.0;
        let pixel = self.core.pixel;
        let moved = RCoord {
            x: pixel.x + f64::from(direction.x) * tiles * f64::from(tile_dim.x),
            y: pixel.y + f64::from(direction.y) * tiles * f64::from(tile_dim.y),
            z: pixel.z,
        };
        let tile = ICoord {
            x: (moved.x / f64::from(tile_dim.x)).floor() as i32,
            y: (moved.y / f64::from(tile_dim.y)).floor() as i32,
            z: self.tile.z,
        };
        if !grid.in_bounds(tile) {
            return;
        }
        self.tile = grid.wrap(tile);
        self.core.set_pixel(grid.wrap_real(moved));
    }

    pub fn needs_redraw(&self, visible_px: &Cuboid, now_ms: u64) -> bool {
        self.core.needs_redraw(visible_px, now_ms)
    }

    pub fn draw(&mut self, sink: &mut dyn DrawSink, tile_height: i32, now_ms: u64) {
        self.core.draw(sink, tile_height, now_ms);
    }
}

fn lerp(from: RCoord, to: RCoord, t: f64) -> RCoord {
    RCoord {
        x: from.x + (to.x - from.x) * t,
        y: from.y + (to.y - from.y) * t,
        z: from.z,
    }
}

/// A transient decoration. Overlays may drift and may expire on their own.
#[derive(Debug, Clone)]
pub struct Overlay {
    core: EntityCore,
    ttl_ms: Option<u64>,
    velocity_px_per_sec: (f64, f64),
}

impl Overlay {
    pub fn from_catalog(
        catalog: &EntityCatalog,
        descriptor: &str,
        phase: &str,
    ) -> Result<Self, SpawnError> {
        Ok(Self {
            core: EntityCore::from_catalog(catalog, descriptor, phase)?,
            ttl_ms: None,
            velocity_px_per_sec: (0.0, 0.0),
        })
    }

    pub fn core(&self) -> &EntityCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    pub fn is_dead(&self) -> bool {
        self.core.is_dead()
    }

    pub fn teleport(&mut self, pixel: RCoord) {
        self.core.set_pixel(pixel);
    }

    /// `None` keeps the overlay alive until destroyed explicitly.
    pub fn set_lifetime(&mut self, ttl_ms: Option<u64>) {
        self.ttl_ms = ttl_ms;
    }

    pub fn set_velocity(&mut self, velocity_px_per_sec: (f64, f64)) {
        self.velocity_px_per_sec = velocity_px_per_sec;
    }

    pub fn tick(&mut self, dt_ms: u64) {
        let (vx, vy) = self.velocity_px_per_sec;
        if vx != 0.0 || vy != 0.0 {
            let secs = dt_ms as f64 / 1000.0;
            let pixel = self.core.pixel;
            self.core.set_pixel(RCoord {
                x: pixel.x + vx * secs,
                y: pixel.y + vy * secs,
                z: pixel.z,
            });
        }
        if let Some(ttl) = self.ttl_ms {
            let left = ttl.saturating_sub(dt_ms);
            self.ttl_ms = Some(left);
            if left == 0 {
                self.core.destroy();
            }
        }
    }

    pub fn needs_redraw(&self, visible_px: &Cuboid, now_ms: u64) -> bool {
        self.core.needs_redraw(visible_px, now_ms)
    }

    pub fn draw(&mut self, sink: &mut dyn DrawSink, tile_height: i32, now_ms: u64) {
        self.core.draw(sink, tile_height, now_ms);
    }
}
