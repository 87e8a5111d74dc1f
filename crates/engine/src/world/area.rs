use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use crate::config::MoveMode;
use crate::content::EntityCatalog;

use super::coords::{
    isometric_z_offset, real_to_virt, virt_to_real, CoordError, Cuboid, ICoord, IVec2, RCoord,
    VICoord,
};
use super::entity::{AreaId, Character, CharacterKind, Overlay, Shared};
use super::grid::{GridDim, TileGrid};
use super::input::InputAction;
use super::registry::EntityRegistry;
use super::render::DrawSink;
use super::tile::{Tile, TileSet, TileSets};
use super::viewport::Viewport;

/// Area-scoped script callbacks.
pub trait AreaHooks {
    /// Runs once, the first time the area is focused.
    fn on_load(&mut self) {}
    /// Runs every time the area is focused.
    fn on_focus(&mut self) {}
    fn tick(&mut self, _dt_ms: u64) {}
    fn turn(&mut self) {}
}

/// Music seam used when an area gains focus.
pub trait MusicCue {
    fn play(&mut self, path: &str);
}

/// One map of the world: a tile grid, the entities living on it, and the
/// player while the area is focused.
pub struct Area {
    id: AreaId,
    descriptor: String,
    grid: TileGrid,
    tile_sets: TileSets,
    registry: EntityRegistry,
    catalog: Rc<EntityCatalog>,
    player: Shared<Character>,
    hooks: Option<Box<dyn AreaHooks>>,
    music: Option<String>,
    color_overlay_argb: u32,
    been_focused: bool,
    redraw: bool,
    last_drawn_ms: u64,
}

impl fmt::Debug for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Area")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("dim", &self.grid.dim())
            .field("entities", &self.registry.len())
            .field("music", &self.music)
            .field("color_overlay_argb", &self.color_overlay_argb)
            .field("been_focused", &self.been_focused)
            .field("redraw", &self.redraw)
            .finish_non_exhaustive()
    }
}

impl Area {
    pub fn new(
        descriptor: impl Into<String>,
        grid: TileGrid,
        tile_sets: TileSets,
        player: Shared<Character>,
        catalog: Rc<EntityCatalog>,
    ) -> Self {
        Self {
            id: AreaId::allocate(),
            descriptor: descriptor.into(),
            grid,
            tile_sets,
            registry: EntityRegistry::default(),
            catalog,
            player,
            hooks: None,
            music: None,
            color_overlay_argb: 0,
            been_focused: false,
            redraw: true,
            last_drawn_ms: 0,
        }
    }

    pub fn set_music(&mut self, music: Option<String>) {
        self.music = music;
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn AreaHooks>) {
        self.hooks = Some(hooks);
    }

    pub fn id(&self) -> AreaId {
        self.id
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn player(&self) -> &Shared<Character> {
        &self.player
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn characters(&self) -> &[Shared<Character>] {
        self.registry.characters()
    }

    pub fn overlays(&self) -> &[Shared<Overlay>] {
        self.registry.overlays()
    }

    pub fn music(&self) -> Option<&str> {
        self.music.as_deref()
    }

    pub fn been_focused(&self) -> bool {
        self.been_focused
    }

    /// Makes this the active area. Load hooks run on the first visit only.
    pub fn focus(&mut self, music: &mut dyn MusicCue) {
        if !self.been_focused {
            self.been_focused = true;
            if let Some(hooks) = self.hooks.as_mut() {
                hooks.on_load();
            }
        }

        self.player.borrow_mut().core_mut().set_area(Some(self.id));

        if let Some(path) = self.music.as_deref() {
            music.play(path);
        }

        if let Some(hooks) = self.hooks.as_mut() {
            hooks.on_focus();
        }
        self.redraw = true;
        info!(area = %self.descriptor, "area_focused");
    }

    pub fn place_player(&mut self, coord: VICoord) {
        let tile = self.virt_to_phys(coord);
        let pixel = self.phys_to_real(tile);
        self.player.borrow_mut().place(tile, pixel);
    }

    pub fn button_down(&mut self, action: InputAction) {
        if let Some(direction) = action.direction() {
            self.player.borrow_mut().start_movement(direction);
        }
    }

    pub fn button_up(&mut self, action: InputAction) {
        if let Some(direction) = action.direction() {
            self.player.borrow_mut().stop_movement(direction);
        }
    }

    /// Per-frame update.
    ///
    /// | mode           | hooks | overlays | player / characters |
    /// |----------------|-------|----------|---------------------|
    /// | `Turn`         | yes   | yes      | no                  |
    /// | `Tile`/`Notile`| yes   | yes      | yes                 |
    pub fn tick(&mut self, dt_ms: u64, mode: MoveMode, viewport: &mut dyn Viewport) {
        if let Some(hooks) = self.hooks.as_mut() {
            hooks.tick(dt_ms);
        }

        self.registry.tick_overlays(dt_ms);

        if mode != MoveMode::Turn {
            self.player.borrow_mut().tick(dt_ms, mode, &self.grid);
            self.registry.tick_characters(dt_ms, mode, &self.grid);
            self.prune_characters();
        }

        let pruned = self.registry.prune_overlays();
        if pruned > 0 {
            debug!(area = %self.descriptor, pruned, "overlays_pruned");
            self.redraw = true;
        }

        viewport.tick(dt_ms);
    }

    /// Advances turn-based state after the player completes an action. Does
    /// nothing unless `mode` is `Turn`.
    pub fn turn(&mut self, mode: MoveMode, viewport: &mut dyn Viewport) {
        if mode != MoveMode::Turn {
            return;
        }
        if let Some(hooks) = self.hooks.as_mut() {
            hooks.turn();
        }

        self.player.borrow_mut().turn(&self.grid);
        self.registry.turn_characters(&self.grid);
        self.prune_characters();

        viewport.turn();
    }

    fn prune_characters(&mut self) {
        let pruned = self.registry.prune_characters();
        if pruned > 0 {
            debug!(area = %self.descriptor, pruned, "characters_pruned");
            self.redraw = true;
        }
    }

    pub fn draw(&mut self, now_ms: u64, viewport: &dyn Viewport, sink: &mut dyn DrawSink) {
        self.draw_tiles(now_ms, viewport, sink);
        self.draw_entities(now_ms, sink);
        self.draw_color_overlay(viewport, sink);
        self.redraw = false;
        self.last_drawn_ms = now_ms;
    }

    fn draw_tiles(&self, now_ms: u64, viewport: &dyn Viewport, sink: &mut dyn DrawSink) {
        let tiles = self.visible_tiles(viewport);
        let tile_dim = self.grid.tile_dim();
        for z in tiles.z1..tiles.z2 {
            let depth = self.index_depth(z);
            for y in tiles.y1..tiles.y2 {
                for x in tiles.x1..tiles.x2 {
                    let Some(tile_type) = self
                        .grid
                        .get_tile(ICoord { x, y, z })
                        .and_then(Tile::tile_type)
                    else {
                        continue;
                    };
                    let Some(frame) = tile_type.animation().frame(now_ms) else {
                        continue;
                    };
                    let px = f64::from(x) * f64::from(tile_dim.x);
                    let py = f64::from(y) * f64::from(tile_dim.y);
                    sink.draw_image(frame, px, py, depth + isometric_z_offset(py, tile_dim.y));
                }
            }
        }
    }

    fn draw_entities(&self, now_ms: u64, sink: &mut dyn DrawSink) {
        let tile_height = self.grid.tile_dim().y;
        for character in self.registry.characters() {
            character.borrow_mut().draw(sink, tile_height, now_ms);
        }
        for overlay in self.registry.overlays() {
            overlay.borrow_mut().draw(sink, tile_height, now_ms);
        }
        self.player.borrow_mut().draw(sink, tile_height, now_ms);
    }

    fn draw_color_overlay(&self, viewport: &dyn Viewport, sink: &mut dyn DrawSink) {
        if self.color_overlay_argb >> 24 == 0 {
            return;
        }
        let (x, y) = viewport.offset_px();
        let (width, height) = viewport.visible_size_px();
        sink.fill_rect(self.color_overlay_argb, x, y, width, height);
    }

    /// Whether anything on screen changed since the last `draw`.
    pub fn needs_redraw(&self, now_ms: u64, viewport: &dyn Viewport) -> bool {
        if self.redraw {
            return true;
        }

        let tiles = self.visible_tiles(viewport);
        let pixels = tiles.to_pixels(self.grid.tile_dim());

        if self.player.borrow().needs_redraw(&pixels, now_ms) {
            return true;
        }
        if self
            .registry
            .characters()
            .iter()
            .any(|character| character.borrow().needs_redraw(&pixels, now_ms))
        {
            return true;
        }
        if self
            .registry
            .overlays()
            .iter()
            .any(|overlay| overlay.borrow().needs_redraw(&pixels, now_ms))
        {
            return true;
        }

        let changed = tiles.iter().any(|phys| {
            self.grid
                .get_tile(phys)
                .and_then(Tile::tile_type)
                .is_some_and(|tile_type| tile_type.needs_redraw(self.last_drawn_ms, now_ms))
        });
        changed
    }

    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    pub fn color_overlay(&self) -> u32 {
        self.color_overlay_argb
    }

    pub fn set_color_overlay(&mut self, a: u8, r: u8, g: u8, b: u8) {
        self.color_overlay_argb =
            u32::from(a) << 24 | u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b);
        self.redraw = true;
    }

    pub fn get_tile(&self, phys: ICoord) -> Option<&Tile> {
        self.grid.get_tile(phys)
    }

    pub fn get_tile_virt(&self, virt: VICoord) -> Option<&Tile> {
        self.grid.get_tile(self.virt_to_phys(virt))
    }

    pub fn get_tile_real(&self, real: RCoord) -> Option<&Tile> {
        self.grid.get_tile(self.real_to_phys(real))
    }

    /// Mutable cell access. Marks the area dirty.
    pub fn get_tile_mut(&mut self, phys: ICoord) -> Option<&mut Tile> {
        self.redraw = true;
        self.grid.get_tile_mut(phys)
    }

    pub fn tile_set(&self, image: &str) -> Option<&TileSet> {
        self.tile_sets.get(image)
    }

    pub fn dimensions(&self) -> GridDim {
        self.grid.dim()
    }

    pub fn tile_dimensions(&self) -> IVec2 {
        self.grid.tile_dim()
    }

    pub fn loops_in_x(&self) -> bool {
        self.grid.loops_in_x()
    }

    pub fn loops_in_y(&self) -> bool {
        self.grid.loops_in_y()
    }

    pub fn visible_tile_bounds(&self, viewport: &dyn Viewport) -> Cuboid {
        self.grid
            .visible_tile_bounds(viewport.offset_px(), viewport.visible_size_px())
    }

    pub fn visible_tiles(&self, viewport: &dyn Viewport) -> Cuboid {
        self.grid
            .visible_tiles(viewport.offset_px(), viewport.visible_size_px())
    }

    pub fn in_bounds(&self, phys: ICoord) -> bool {
        self.grid.in_bounds(phys)
    }

    pub fn in_bounds_virt(&self, virt: VICoord) -> bool {
        self.grid.in_bounds(self.virt_to_phys(virt))
    }

    pub fn in_bounds_real(&self, real: RCoord) -> bool {
        self.grid.in_bounds(self.real_to_phys(real))
    }

    /// Creates an NPC from the catalog and adds it to the area. Returns
    /// `None`, logging the cause, when the descriptor or phase is unknown.
    pub fn spawn_npc(
        &mut self,
        descriptor: &str,
        coord: VICoord,
        phase: &str,
    ) -> Option<Shared<Character>> {
        let mut character = match Character::from_catalog(
            CharacterKind::Npc,
            &self.catalog,
            descriptor,
            phase,
        ) {
            Ok(character) => character,
            Err(error) => {
                warn!(area = %self.descriptor, descriptor, phase, error = %error, "spawn_failed");
                return None;
            }
        };
        let tile = self.virt_to_phys(coord);
        let pixel = self.phys_to_real(tile);
        character.core_mut().set_area(Some(self.id));
        character.place(tile, pixel);

        let character = Rc::new(RefCell::new(character));
        self.insert_character(Rc::clone(&character));
        debug!(area = %self.descriptor, descriptor, phase, "npc_spawned");
        Some(character)
    }

    /// Creates an overlay from the catalog and adds it to the area. Returns
    /// `None`, logging the cause, when the descriptor or phase is unknown.
    pub fn spawn_overlay(
        &mut self,
        descriptor: &str,
        coord: VICoord,
        phase: &str,
    ) -> Option<Shared<Overlay>> {
        let mut overlay = match Overlay::from_catalog(&self.catalog, descriptor, phase) {
            Ok(overlay) => overlay,
            Err(error) => {
                warn!(area = %self.descriptor, descriptor, phase, error = %error, "spawn_failed");
                return None;
            }
        };
        overlay.core_mut().set_area(Some(self.id));
        overlay.teleport(self.virt_to_real(coord));

        let overlay = Rc::new(RefCell::new(overlay));
        self.insert_overlay(Rc::clone(&overlay));
        debug!(area = %self.descriptor, descriptor, phase, "overlay_spawned");
        Some(overlay)
    }

    /// Registers `character` with this area. Returns `false` when it was
    /// already registered.
    pub fn insert_character(&mut self, character: Shared<Character>) -> bool {
        let inserted = self.registry.insert_character(character);
        self.redraw |= inserted;
        inserted
    }

    /// Registers `overlay` with this area. Returns `false` when it was already
    /// registered.
    pub fn insert_overlay(&mut self, overlay: Shared<Overlay>) -> bool {
        let inserted = self.registry.insert_overlay(overlay);
        self.redraw |= inserted;
        inserted
    }

    pub fn try_virt_to_phys(&self, virt: VICoord) -> Result<ICoord, CoordError> {
        self.grid.virt_to_phys(virt)
    }

    pub fn phys_to_virt(&self, phys: ICoord) -> VICoord {
        self.checked(self.grid.phys_to_virt(phys))
    }

    pub fn phys_to_real(&self, phys: ICoord) -> RCoord {
        self.checked(self.grid.phys_to_real(phys))
    }

    /// Resolves the depth value to a layer index.
    ///
    /// # Panics
    ///
    /// Panics after logging when the depth has no layer in this area: every
    /// later tile access would be meaningless.
    pub fn virt_to_phys(&self, virt: VICoord) -> ICoord {
        self.checked(self.grid.virt_to_phys(virt))
    }

    /// # Panics
    ///
    /// Same as [`Area::virt_to_phys`].
    pub fn real_to_phys(&self, real: RCoord) -> ICoord {
        self.checked(self.grid.real_to_phys(real))
    }

    pub fn virt_to_real(&self, virt: VICoord) -> RCoord {
        virt_to_real(virt, self.grid.tile_dim())
    }

    pub fn real_to_virt(&self, real: RCoord) -> VICoord {
        real_to_virt(real, self.grid.tile_dim())
    }

    pub fn depth_index(&self, depth: f64) -> i32 {
        self.checked(self.grid.depth_index(depth))
    }

    pub fn index_depth(&self, index: i32) -> f64 {
        self.checked(self.grid.index_depth(index))
    }

    fn checked<T>(&self, result: Result<T, CoordError>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => self.fatal(error),
        }
    }

    fn fatal(&self, error: CoordError) -> ! {
        error!(area = %self.descriptor, error = %error, "coordinate_outside_area");
        panic!("area '{}': {error}", self.descriptor);
    }
}

impl Drop for Area {
    fn drop(&mut self) {
        self.registry.clear();
        if let Ok(mut player) = self.player.try_borrow_mut() {
            if player.core().area() == Some(self.id) {
                player.core_mut().set_area(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::coords::DepthTable;
    use crate::world::entity::test_support::catalog;
    use crate::world::render::{DrawCall, RecordingSink};
    use crate::world::tile::{Animation, TileType};
    use crate::world::viewport::Camera;

    const WATER_GID: u32 = 2;

    fn camera(offset: (f64, f64), size: (f64, f64)) -> Camera {
        let mut camera = Camera::new(size);
        camera.offset = offset;
        camera
    }

    /// 4x4 area, two layers at depths 0.0 and 1.0. Layer 0 is grass
    /// everywhere, layer 1 has animated water at (1, 1) only.
    fn make_area() -> Area {
        let mut set = TileSet::new("tiles/grove", IVec2::new(16, 16));
        let grass = set.push(TileType::new(1, "tiles/grove", Animation::still("tiles/grass")));
        let water = set.push(TileType::new(
            WATER_GID,
            "tiles/grove",
            Animation::new(vec!["tiles/water_0".into(), "tiles/water_1".into()], 100),
        ));
        let mut tile_sets = TileSets::default();
        tile_sets.insert(set);

        let depths = DepthTable::from_depths([0.0, 1.0]).expect("depths");
        let mut grid =
            TileGrid::new(4, 4, IVec2::new(16, 16), depths, false, false).expect("grid");
        for y in 0..4 {
            for x in 0..4 {
                grid.get_tile_mut(ICoord::new(x, y, 0))
                    .expect("tile")
                    .set_tile_type(Some(Rc::clone(&grass)));
            }
        }
        grid.get_tile_mut(ICoord::new(1, 1, 1))
            .expect("tile")
            .set_tile_type(Some(water));

        let catalog = Rc::new(catalog());
        let player = Character::from_catalog(CharacterKind::Player, &catalog, "hero", "down")
            .expect("player");
        let mut area = Area::new(
            "grove",
            grid,
            tile_sets,
            Rc::new(RefCell::new(player)),
            catalog,
        );
        area.place_player(VICoord::new(0, 0, 0.0));
        area
    }

    #[derive(Default)]
    struct Jukebox {
        played: Vec<String>,
    }

    impl MusicCue for Jukebox {
        fn play(&mut self, path: &str) {
            self.played.push(path.to_string());
        }
    }

    struct RecordingHooks {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl AreaHooks for RecordingHooks {
        fn on_load(&mut self) {
            self.log.borrow_mut().push("load");
        }
        fn on_focus(&mut self) {
            self.log.borrow_mut().push("focus");
        }
        fn tick(&mut self, _dt_ms: u64) {
            self.log.borrow_mut().push("tick");
        }
        fn turn(&mut self) {
            self.log.borrow_mut().push("turn");
        }
    }

    #[test]
    fn scenario_visible_tiles_and_virtual_lookup() {
        let area = make_area();
        let view = camera((0.0, 0.0), (32.0, 32.0));
        assert_eq!(
            area.visible_tiles(&view),
            Cuboid {
                x1: 0,
                y1: 0,
                z1: 0,
                x2: 2,
                y2: 2,
                z2: 2,
            }
        );
        assert_eq!(area.virt_to_phys(VICoord::new(1, 1, 1.0)).z, 1);
        let tile = area
            .get_tile_virt(VICoord::new(1, 1, 1.0))
            .and_then(Tile::tile_type)
            .expect("water");
        assert_eq!(tile.gid(), WATER_GID);
    }

    #[test]
    fn phys_virt_round_trip_through_area() {
        let area = make_area();
        for phys in (Cuboid {
            x1: 0,
            y1: 0,
            z1: 0,
            x2: 4,
            y2: 4,
            z2: 2,
        })
        .iter()
        {
            assert_eq!(area.virt_to_phys(area.phys_to_virt(phys)), phys);
        }
        assert_eq!(area.index_depth(area.depth_index(1.0)), 1.0);
    }

    #[test]
    #[should_panic(expected = "has no registered layer")]
    fn unmapped_depth_is_fatal() {
        let area = make_area();
        let _ = area.get_tile_virt(VICoord::new(0, 0, 0.5));
    }

    #[test]
    fn try_virt_to_phys_reports_unmapped_depth() {
        let area = make_area();
        assert_eq!(
            area.try_virt_to_phys(VICoord::new(0, 0, 2.0)),
            Err(CoordError::UnmappedDepth { depth: 2.0 })
        );
    }

    #[test]
    fn quiet_area_does_not_need_redraw_after_draw() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (16.0, 16.0));
        let mut sink = RecordingSink::default();
        assert!(area.needs_redraw(0, &view));
        area.draw(0, &view, &mut sink);
        assert!(!area.needs_redraw(0, &view));
        assert!(!area.needs_redraw(10_000, &view));
    }

    #[test]
    fn color_overlay_always_marks_dirty() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (16.0, 16.0));
        let mut sink = RecordingSink::default();
        area.draw(0, &view, &mut sink);
        area.set_color_overlay(0, 0, 0, 0);
        assert!(area.needs_redraw(0, &view));
        area.draw(0, &view, &mut sink);
        area.set_color_overlay(0x80, 0x10, 0x20, 0x30);
        assert_eq!(area.color_overlay(), 0x8010_2030);
        assert!(area.needs_redraw(0, &view));
    }

    #[test]
    fn request_redraw_marks_dirty() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (16.0, 16.0));
        area.draw(0, &view, &mut RecordingSink::default());
        area.request_redraw();
        assert!(area.needs_redraw(0, &view));
    }

    #[test]
    fn visible_tile_animation_triggers_redraw() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (32.0, 32.0));
        area.draw(0, &view, &mut RecordingSink::default());
        assert!(!area.needs_redraw(50, &view));
        assert!(area.needs_redraw(150, &view));
    }

    #[test]
    fn off_screen_changes_do_not_trigger_redraw() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (16.0, 16.0));
        let npc = area
            .spawn_npc("villager", VICoord::new(3, 3, 0.0), "down")
            .expect("npc");
        area.draw(0, &view, &mut RecordingSink::default());
        npc.borrow_mut()
            .place(ICoord::new(3, 2, 0), RCoord::new(48.0, 32.0, 0.0));
        assert!(!area.needs_redraw(0, &view));
        npc.borrow_mut()
            .place(ICoord::new(0, 0, 0), RCoord::new(0.0, 0.0, 0.0));
        assert!(area.needs_redraw(0, &view));
    }

    #[test]
    fn draw_orders_tiles_then_characters_overlays_player_then_tint() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (32.0, 32.0));
        area.spawn_npc("villager", VICoord::new(1, 0, 0.0), "down")
            .expect("npc");
        area.spawn_overlay("sparkle", VICoord::new(0, 1, 1.0), "burst")
            .expect("overlay");
        area.set_color_overlay(255, 0, 0, 0);
        let mut sink = RecordingSink::default();
        area.draw(0, &view, &mut sink);

        let images = sink.images().collect::<Vec<_>>();
        assert_eq!(
            images,
            vec![
                "tiles/grass",
                "tiles/grass",
                "tiles/grass",
                "tiles/grass",
                "tiles/water_0",
                "villager/down",
                "fx/a",
                "hero/down",
            ]
        );
        assert_eq!(
            sink.calls().last(),
            Some(&DrawCall::Rect {
                argb: 0xFF00_0000,
                x: 0.0,
                y: 0.0,
                width: 32.0,
                height: 32.0,
            })
        );
    }

    #[test]
    fn transparent_overlay_is_not_drawn() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (16.0, 16.0));
        area.set_color_overlay(0, 255, 255, 255);
        let mut sink = RecordingSink::default();
        area.draw(0, &view, &mut sink);
        assert!(sink
            .calls()
            .iter()
            .all(|call| matches!(call, DrawCall::Image { .. })));
    }

    #[test]
    fn tiles_get_isometric_depth_offset() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (32.0, 32.0));
        let mut sink = RecordingSink::default();
        area.draw(0, &view, &mut sink);
        let water = sink
            .calls()
            .iter()
            .find_map(|call| match call {
                DrawCall::Image { key, x, y, z } if key == "tiles/water_0" => Some((*x, *y, *z)),
                _ => None,
            })
            .expect("water drawn");
        assert_eq!((water.0, water.1), (16.0, 16.0));
        assert!((water.2 - 1.001).abs() < 1e-12);
    }

    #[test]
    fn turn_mode_tick_never_moves_but_turn_does() {
        let mut area = make_area();
        let mut view = camera((0.0, 0.0), (64.0, 64.0));
        let npc = area
            .spawn_npc("villager", VICoord::new(2, 2, 0.0), "down")
            .expect("npc");
        npc.borrow_mut().start_movement(IVec2::new(0, -1));
        area.button_down(InputAction::MoveRight);

        for _ in 0..20 {
            area.tick(100, MoveMode::Turn, &mut view);
        }
        assert_eq!(area.player().borrow().tile(), ICoord::new(0, 0, 0));
        assert_eq!(npc.borrow().tile(), ICoord::new(2, 2, 0));

        area.turn(MoveMode::Turn, &mut view);
        assert_eq!(area.player().borrow().tile(), ICoord::new(1, 0, 0));
        assert_eq!(npc.borrow().tile(), ICoord::new(2, 1, 0));
    }

    #[test]
    fn turn_is_ignored_outside_turn_mode() {
        let mut area = make_area();
        let mut view = camera((0.0, 0.0), (64.0, 64.0));
        let log = Rc::new(RefCell::new(Vec::new()));
        area.set_hooks(Box::new(RecordingHooks {
            log: Rc::clone(&log),
        }));
        area.button_down(InputAction::MoveRight);
        area.turn(MoveMode::Tile, &mut view);
        area.turn(MoveMode::Notile, &mut view);
        assert_eq!(area.player().borrow().tile(), ICoord::new(0, 0, 0));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn reinserting_a_spawned_npc_keeps_one_entry() {
        let mut area = make_area();
        let mut view = camera((0.0, 0.0), (64.0, 64.0));
        let npc = area
            .spawn_npc("villager", VICoord::new(1, 2, 0.0), "down")
            .expect("npc");
        assert!(!area.insert_character(Rc::clone(&npc)));
        assert_eq!(area.characters().len(), 1);

        npc.borrow_mut().start_movement(IVec2::new(1, 0));
        area.turn(MoveMode::Turn, &mut view);
        assert_eq!(npc.borrow().tile(), ICoord::new(2, 2, 0));
    }

    #[test]
    fn visible_overlay_animation_alone_triggers_redraw() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (16.0, 16.0));
        area.spawn_overlay("sparkle", VICoord::new(0, 0, 1.0), "burst")
            .expect("overlay");
        area.draw(0, &view, &mut RecordingSink::default());
        assert!(!area.needs_redraw(50, &view));
        assert!(area.needs_redraw(150, &view));
    }

    #[test]
    fn tile_mode_tick_moves_player() {
        let mut area = make_area();
        let mut view = camera((0.0, 0.0), (64.0, 64.0));
        area.button_down(InputAction::MoveDown);
        area.tick(125, MoveMode::Tile, &mut view);
        area.button_up(InputAction::MoveDown);
        area.tick(125, MoveMode::Tile, &mut view);
        assert_eq!(area.player().borrow().tile(), ICoord::new(0, 1, 0));
    }

    #[test]
    fn overlays_tick_and_expire_in_turn_mode() {
        let mut area = make_area();
        let mut view = camera((0.0, 0.0), (64.0, 64.0));
        let fx = area
            .spawn_overlay("sparkle", VICoord::new(1, 1, 1.0), "burst")
            .expect("overlay");
        fx.borrow_mut().set_lifetime(Some(150));
        area.tick(100, MoveMode::Turn, &mut view);
        assert_eq!(area.overlays().len(), 1);
        area.tick(100, MoveMode::Turn, &mut view);
        assert!(area.overlays().is_empty());
        assert_eq!(fx.borrow().core().area(), None);
    }

    #[test]
    fn invalid_spawn_leaves_registry_unchanged() {
        let mut area = make_area();
        assert!(area
            .spawn_npc("ghost", VICoord::new(1, 1, 0.0), "down")
            .is_none());
        assert!(area
            .spawn_npc("villager", VICoord::new(1, 1, 0.0), "sideways")
            .is_none());
        assert!(area
            .spawn_overlay("ghost", VICoord::new(1, 1, 0.0), "burst")
            .is_none());
        assert!(area.registry().is_empty());
    }

    #[test]
    fn valid_spawn_binds_area_and_places_entity() {
        let mut area = make_area();
        let npc = area
            .spawn_npc("villager", VICoord::new(2, 3, 1.0), "down")
            .expect("npc");
        assert_eq!(area.characters().len(), 1);
        assert_eq!(npc.borrow().core().area(), Some(area.id()));
        assert_eq!(npc.borrow().tile(), ICoord::new(2, 3, 1));
        assert_eq!(npc.borrow().core().pixel(), RCoord::new(32.0, 48.0, 1.0));
    }

    #[test]
    fn dead_character_is_removed_after_one_tick() {
        let mut area = make_area();
        let mut view = camera((0.0, 0.0), (64.0, 64.0));
        let npc = area
            .spawn_npc("villager", VICoord::new(2, 2, 0.0), "down")
            .expect("npc");
        npc.borrow_mut().core_mut().destroy();
        area.tick(16, MoveMode::Tile, &mut view);
        assert!(area.characters().is_empty());
        assert_eq!(npc.borrow().core().area(), None);
    }

    #[test]
    fn dead_character_is_removed_after_turn() {
        let mut area = make_area();
        let mut view = camera((0.0, 0.0), (64.0, 64.0));
        let npc = area
            .spawn_npc("villager", VICoord::new(2, 2, 0.0), "down")
            .expect("npc");
        npc.borrow_mut().core_mut().destroy();
        area.tick(16, MoveMode::Turn, &mut view);
        assert_eq!(area.characters().len(), 1);
        area.turn(MoveMode::Turn, &mut view);
        assert!(area.characters().is_empty());
        assert_eq!(npc.borrow().core().area(), None);
    }

    #[test]
    fn focus_runs_load_once_and_focus_every_time() {
        let mut area = make_area();
        let log = Rc::new(RefCell::new(Vec::new()));
        area.set_hooks(Box::new(RecordingHooks {
            log: Rc::clone(&log),
        }));
        area.set_music(Some("music/grove".to_string()));
        let mut jukebox = Jukebox::default();

        area.focus(&mut jukebox);
        area.focus(&mut jukebox);
        assert!(area.been_focused());
        assert_eq!(*log.borrow(), vec!["load", "focus", "focus"]);
        assert_eq!(jukebox.played, vec!["music/grove", "music/grove"]);
        assert_eq!(area.player().borrow().core().area(), Some(area.id()));
    }

    #[test]
    fn area_hooks_follow_the_move_mode() {
        let mut area = make_area();
        let log = Rc::new(RefCell::new(Vec::new()));
        area.set_hooks(Box::new(RecordingHooks {
            log: Rc::clone(&log),
        }));
        let mut view = camera((0.0, 0.0), (64.0, 64.0));
        area.tick(16, MoveMode::Turn, &mut view);
        area.turn(MoveMode::Turn, &mut view);
        area.tick(16, MoveMode::Tile, &mut view);
        assert_eq!(*log.borrow(), vec!["tick", "turn", "tick"]);
    }

    #[test]
    fn missing_tile_set_returns_none() {
        let area = make_area();
        assert!(area.tile_set("tiles/grove").is_some());
        assert!(area.tile_set("tiles/desert").is_none());
    }

    #[test]
    fn editing_a_tile_marks_dirty() {
        let mut area = make_area();
        let view = camera((0.0, 0.0), (16.0, 16.0));
        area.draw(0, &view, &mut RecordingSink::default());
        area.get_tile_mut(ICoord::new(0, 0, 1))
            .expect("tile")
            .set_tile_type(None);
        assert!(area.needs_redraw(0, &view));
    }

    #[test]
    fn dropping_the_area_detaches_entities() {
        let mut area = make_area();
        let mut jukebox = Jukebox::default();
        area.focus(&mut jukebox);
        let npc = area
            .spawn_npc("villager", VICoord::new(1, 1, 0.0), "down")
            .expect("npc");
        let player = Rc::clone(area.player());
        drop(area);
        assert_eq!(npc.borrow().core().area(), None);
        assert_eq!(player.borrow().core().area(), None);
    }

    #[test]
    fn camera_follows_player_after_turn() {
        let mut area = make_area();
        let mut view = Camera::new((32.0, 32.0));
        view.set_bounds(Some(crate::world::CameraBounds {
            width_px: 64.0,
            height_px: 64.0,
            loop_x: false,
            loop_y: false,
        }));
        view.follow(Rc::downgrade(area.player()));
        assert_eq!(view.offset_px(), (0.0, 0.0));
        area.button_down(InputAction::MoveRight);
        area.turn(MoveMode::Turn, &mut view);
        area.turn(MoveMode::Turn, &mut view);
        area.turn(MoveMode::Turn, &mut view);
        assert_eq!(area.player().borrow().tile(), ICoord::new(3, 0, 0));
        assert_eq!(view.offset_px(), (32.0, 0.0));
    }
}
