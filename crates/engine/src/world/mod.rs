mod area;
mod coords;
mod entity;
mod grid;
mod input;
mod registry;
mod render;
mod tile;
mod viewport;

pub use area::{Area, AreaHooks, MusicCue};
pub use coords::{
    isometric_z_offset, real_to_virt, virt_to_real, CoordError, Cuboid, DepthTable, ICoord,
    IVec2, RCoord, VICoord, ISOMETRIC_ZOFF_PER_TILE,
};
pub use entity::{AreaId, Character, CharacterKind, EntityCore, Overlay, Shared, SpawnError};
pub use grid::{GridDim, GridError, TileGrid};
pub use input::InputAction;
pub use registry::EntityRegistry;
pub use render::{DrawCall, DrawSink, RecordingSink};
pub use tile::{Animation, Tile, TileSet, TileSets, TileType};
pub use viewport::{Camera, CameraBounds, Viewport};
