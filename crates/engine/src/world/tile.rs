use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::error;

use super::coords::IVec2;

/// A looping sequence of image keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    frames: Vec<String>,
    frame_len_ms: u64,
    started_at_ms: u64,
}

impl Animation {
    pub fn new(frames: Vec<String>, frame_len_ms: u64) -> Self {
        Self {
            frames,
            frame_len_ms,
            started_at_ms: 0,
        }
    }

    pub fn still(frame: impl Into<String>) -> Self {
        Self::new(vec![frame.into()], 0)
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1 && self.frame_len_ms > 0
    }

    /// Restarts the sequence so that `now` shows the first frame.
    pub fn restart(&mut self, now_ms: u64) {
        self.started_at_ms = now_ms;
    }

    pub fn frame_index(&self, now_ms: u64) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        if !self.is_animated() {
            return Some(0);
        }
        let elapsed = now_ms.saturating_sub(self.started_at_ms);
        Some(((elapsed / self.frame_len_ms) % self.frames.len() as u64) as usize)
    }

    /// Image key to show at `now`. `None` means there is nothing to draw.
    pub fn frame(&self, now_ms: u64) -> Option<&str> {
        self.frame_index(now_ms)
            .and_then(|index| self.frames.get(index))
            .map(String::as_str)
    }

    /// Whether the frame shown at `now` differs from the one shown at `last_drawn`.
    pub fn needs_redraw(&self, last_drawn_ms: u64, now_ms: u64) -> bool {
        self.is_animated() && self.frame_index(last_drawn_ms) != self.frame_index(now_ms)
    }
}

/// Immutable tile definition shared by every cell that uses it.
#[derive(Debug, Clone, PartialEq)]
pub struct TileType {
    gid: u32,
    tile_set: String,
    animation: Animation,
}

impl TileType {
    pub fn new(gid: u32, tile_set: impl Into<String>, animation: Animation) -> Self {
        Self {
            gid,
            tile_set: tile_set.into(),
            animation,
        }
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn tile_set(&self) -> &str {
        &self.tile_set
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn needs_redraw(&self, last_drawn_ms: u64, now_ms: u64) -> bool {
        self.animation.needs_redraw(last_drawn_ms, now_ms)
    }
}

/// One grid cell. Cells only reference their type, they never own entities.
#[derive(Debug, Clone, Default)]
pub struct Tile {
    tile_type: Option<Rc<TileType>>,
}

impl Tile {
    pub fn new(tile_type: Option<Rc<TileType>>) -> Self {
        Self { tile_type }
    }

    pub fn tile_type(&self) -> Option<&TileType> {
        self.tile_type.as_deref()
    }

    pub fn set_tile_type(&mut self, tile_type: Option<Rc<TileType>>) {
        self.tile_type = tile_type;
    }
}

/// Tile types cut from one source image, indexed by local id.
#[derive(Debug, Clone)]
pub struct TileSet {
    image: String,
    tile_dim: IVec2,
    types: Vec<Rc<TileType>>,
}

impl TileSet {
    pub fn new(image: impl Into<String>, tile_dim: IVec2) -> Self {
        Self {
            image: image.into(),
            tile_dim,
            types: Vec::new(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn tile_dim(&self) -> IVec2 {
        self.tile_dim
    }

    pub fn push(&mut self, tile_type: TileType) -> Rc<TileType> {
        let shared = Rc::new(tile_type);
        self.types.push(Rc::clone(&shared));
        shared
    }

    pub fn get(&self, local_id: usize) -> Option<Rc<TileType>> {
        self.types.get(local_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<TileType>> {
        self.types.iter()
    }
}

/// Catalog of tile sets keyed by source image path.
#[derive(Debug, Clone, Default)]
pub struct TileSets {
    sets: BTreeMap<String, TileSet>,
}

impl TileSets {
    pub fn insert(&mut self, tile_set: TileSet) {
        self.sets.insert(tile_set.image.clone(), tile_set);
    }

    pub fn get(&self, image: &str) -> Option<&TileSet> {
        let found = self.sets.get(image);
        if found.is_none() {
            error!(tile_set = image, "tile_set_not_found");
        }
        found
    }

    pub fn contains(&self, image: &str) -> bool {
        self.sets.contains_key(image)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
