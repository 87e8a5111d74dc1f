//! Physical, virtual and real (pixel) coordinate spaces.
//!
//! Physical coordinates address the dense tile array: `z` is a layer index.
//! Virtual coordinates replace the layer index with the logical depth value
//! used by area files. Real coordinates are pixel positions that carry the
//! depth value through unchanged.

use std::collections::HashMap;

use thiserror::Error;

/// Depth added per tile row so tiles further down the screen sort in front.
pub const ISOMETRIC_ZOFF_PER_TILE: f64 = 0.001;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IVec2 {
    pub x: i32,
    pub y: i32,
}

impl IVec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Physical coordinate: `z` is an index into the grid's layer list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ICoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ICoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, delta: IVec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            z: self.z,
        }
    }
}

/// Virtual coordinate: `z` is a logical depth value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VICoord {
    pub x: i32,
    pub y: i32,
    pub z: f64,
}

impl VICoord {
    pub const fn new(x: i32, y: i32, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Real coordinate in pixels, `z` is a logical depth value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RCoord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RCoord {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Inclusive-exclusive integer box: `[x1, x2) x [y1, y2) x [z1, z2)`.
///
/// Used both for tile index ranges and for the pixel rectangle derived from
/// them, in which case `z` still counts layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cuboid {
    pub x1: i32,
    pub y1: i32,
    pub z1: i32,
    pub x2: i32,
    pub y2: i32,
    pub z2: i32,
}

impl Cuboid {
    pub fn is_empty(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2 || self.z1 >= self.z2
    }

    /// Scales the x/y extents from tile indices to pixels.
    pub fn to_pixels(self, tile_dim: IVec2) -> Self {
        Self {
            x1: self.x1.saturating_mul(tile_dim.x),
            y1: self.y1.saturating_mul(tile_dim.y),
            z1: self.z1,
            x2: self.x2.saturating_mul(tile_dim.x),
            y2: self.y2.saturating_mul(tile_dim.y),
            z2: self.z2,
        }
    }

    /// True when the pixel-space box `[x, x+w) x [y, y+h)` overlaps this one
    /// on the x/y plane.
    pub fn intersects_rect(&self, x: f64, y: f64, w: f64, h: f64) -> bool {
        x < f64::from(self.x2)
            && x + w > f64::from(self.x1)
            && y < f64::from(self.y2)
            && y + h > f64::from(self.y1)
    }

    /// Every `(x, y, z)` in the box, layer-major, bottom layer first.
    pub fn iter(&self) -> impl Iterator<Item = ICoord> + '_ {
        (self.z1..self.z2).flat_map(move |z| {
            (self.y1..self.y2).flat_map(move |y| (self.x1..self.x2).map(move |x| ICoord { x, y, z }))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordError {
    #[error("depth {depth} has no registered layer")]
    UnmappedDepth { depth: f64 },
    #[error("layer index {index} out of range for {layer_count} layers")]
    InvalidLayerIndex { index: i32, layer_count: usize },
    #[error("depth {depth} registered twice")]
    DuplicateDepth { depth: f64 },
    #[error("depth {depth} is not a finite number")]
    NonFiniteDepth { depth: f64 },
}

/// Bidirectional mapping between logical depth values and layer indices.
#[derive(Debug, Clone, Default)]
pub struct DepthTable {
    index_to_depth: Vec<f64>,
    depth_to_index: HashMap<u64, usize>,
}

impl DepthTable {
    pub fn from_depths(depths: impl IntoIterator<Item = f64>) -> Result<Self, CoordError> {
        let mut table = Self::default();
        for depth in depths {
            table.push(depth)?;
        }
        Ok(table)
    }

    /// Registers `depth` as the next layer and returns its index.
    pub fn push(&mut self, depth: f64) -> Result<usize, CoordError> {
        if !depth.is_finite() {
            return Err(CoordError::NonFiniteDepth { depth });
        }
        let index = self.index_to_depth.len();
        if self.depth_to_index.insert(depth_key(depth), index).is_some() {
            return Err(CoordError::DuplicateDepth { depth });
        }
        self.index_to_depth.push(depth);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.index_to_depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_depth.is_empty()
    }

    pub fn depths(&self) -> &[f64] {
        &self.index_to_depth
    }

    pub fn depth_index(&self, depth: f64) -> Result<i32, CoordError> {
        self.depth_to_index
            .get(&depth_key(depth))
            .map(|&index| index as i32)
            .ok_or(CoordError::UnmappedDepth { depth })
    }

    pub fn index_depth(&self, index: i32) -> Result<f64, CoordError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.index_to_depth.get(i).copied())
            .ok_or(CoordError::InvalidLayerIndex {
                index,
                layer_count: self.index_to_depth.len(),
            })
    }
}

fn depth_key(depth: f64) -> u64 {
    // -0.0 and 0.0 name the same layer.
    if depth == 0.0 {
        0.0f64.to_bits()
    } else {
        depth.to_bits()
    }
}

pub fn virt_to_real(virt: VICoord, tile_dim: IVec2) -> RCoord {
    RCoord {
        x: f64::from(virt.x) * f64::from(tile_dim.x),
        y: f64::from(virt.y) * f64::from(tile_dim.y),
        z: virt.z,
    }
}

pub fn real_to_virt(real: RCoord, tile_dim: IVec2) -> VICoord {
    VICoord {
        x: (real.x / f64::from(tile_dim.x)).floor() as i32,
        y: (real.y / f64::from(tile_dim.y)).floor() as i32,
        z: real.z,
    }
}

/// Isometric depth offset for something drawn at pixel row `pixel_y`.
pub fn isometric_z_offset(pixel_y: f64, tile_height: i32) -> f64 {
    pixel_y / f64::from(tile_height) * ISOMETRIC_ZOFF_PER_TILE
}
