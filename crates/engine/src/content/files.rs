//! On-disk JSON shapes for entity catalogs and area files.

use serde::Deserialize;

use crate::image_keys::{validate_image_key, ImageKeyError};
use crate::world::Animation;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationFile {
    pub frames: Vec<String>,
    #[serde(default)]
    pub frame_ms: u64,
}

impl AnimationFile {
    /// Validates every frame key. On failure returns the offending key.
    pub(crate) fn to_animation(&self) -> Result<Animation, (String, ImageKeyError)> {
        for key in &self.frames {
            validate_image_key(key).map_err(|error| (key.clone(), error))?;
        }
        Ok(Animation::new(self.frames.clone(), self.frame_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    pub entities: Vec<EntityFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityFile {
    pub name: String,
    pub width: i32,
    pub height: i32,
    /// Tiles per second.
    #[serde(default = "default_speed")]
    pub speed: f64,
    pub phases: std::collections::BTreeMap<String, AnimationFile>,
}

fn default_speed() -> f64 {
    4.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AreaFile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    #[serde(default)]
    pub loop_x: bool,
    #[serde(default)]
    pub loop_y: bool,
    #[serde(default)]
    pub music: Option<String>,
    #[serde(default)]
    pub entry: Option<CoordFile>,
    pub tilesets: Vec<TileSetFile>,
    pub layers: Vec<LayerFile>,
    #[serde(default)]
    pub spawns: Vec<SpawnFile>,
}

/// Tile sets are numbered in file order: the first tile of the first set is
/// gid 1, gid 0 means an empty cell.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TileSetFile {
    pub image: String,
    pub tiles: Vec<AnimationFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerFile {
    pub depth: f64,
    pub tiles: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordFile {
    pub x: i32,
    pub y: i32,
    pub depth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnKind {
    Npc,
    Overlay,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnFile {
    pub kind: SpawnKind,
    pub descriptor: String,
    pub phase: String,
    pub at: CoordFile,
}
