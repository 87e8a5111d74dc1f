use thiserror::Error;

use super::coords::{Cuboid, CoordError, DepthTable, ICoord, IVec2, RCoord, VICoord};
use super::tile::Tile;

/// Width, height and layer count of a grid, in tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridDim {
    pub width: i32,
    pub height: i32,
    pub layers: i32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("tile size must be positive, got {width}x{height}")]
    InvalidTileSize { width: i32, height: i32 },
    #[error("grid needs at least one layer")]
    NoLayers,
    #[error("{width}x{height} tiles over {layers} layers is too many cells to store")]
    TooManyCells {
        width: i32,
        height: i32,
        layers: usize,
    },
    #[error("{width}x{height} tiles of {tile_width}x{tile_height} px exceeds the addressable pixel range")]
    PixelExtentOverflow {
        width: i32,
        height: i32,
        tile_width: i32,
        tile_height: i32,
    },
}

/// Dense 3D array of tiles with per-axis toroidal wrapping.
///
/// Cells are stored layer-major: `z * width * height + y * width + x`.
#[derive(Debug, Clone)]
pub struct TileGrid {
    dim: GridDim,
    tile_dim: IVec2,
    loop_x: bool,
    loop_y: bool,
    depths: DepthTable,
    cells: Vec<Tile>,
}

impl TileGrid {
    /// Builds an empty grid with one layer per entry in `depths`.
    pub fn new(
        width: i32,
        height: i32,
        tile_dim: IVec2,
        depths: DepthTable,
        loop_x: bool,
        loop_y: bool,
    ) -> Result<Self, GridError> {
        if width <= 0 || height <= 0 {
            return Err(GridError::InvalidDimensions { width, height });
        }
        if tile_dim.x <= 0 || tile_dim.y <= 0 {
            return Err(GridError::InvalidTileSize {
                width: tile_dim.x,
                height: tile_dim.y,
            });
        }
        if depths.is_empty() {
            return Err(GridError::NoLayers);
        }
        if width.checked_mul(tile_dim.x).is_none() || height.checked_mul(tile_dim.y).is_none() {
            return Err(GridError::PixelExtentOverflow {
                width,
                height,
                tile_width: tile_dim.x,
                tile_height: tile_dim.y,
            });
        }
        let cell_count = (width as usize)
            .checked_mul(height as usize)
            .and_then(|per_layer| per_layer.checked_mul(depths.len()))
            .filter(|&cells| cells <= isize::MAX as usize / std::mem::size_of::<Tile>().max(1))
            .ok_or(GridError::TooManyCells {
                width,
                height,
                layers: depths.len(),
            })?;
        let layers = i32::try_from(depths.len()).map_err(|_| GridError::TooManyCells {
            width,
            height,
            layers: depths.len(),
        })?;
        Ok(Self {
            dim: GridDim {
                width,
                height,
                layers,
            },
            tile_dim,
            loop_x,
            loop_y,
            depths,
            cells: vec![Tile::default(); cell_count],
        })
    }

    pub fn dim(&self) -> GridDim {
        self.dim
    }

    pub fn tile_dim(&self) -> IVec2 {
        self.tile_dim
    }

    pub fn loops_in_x(&self) -> bool {
        self.loop_x
    }

    pub fn loops_in_y(&self) -> bool {
        self.loop_y
    }

    pub fn depths(&self) -> &DepthTable {
        &self.depths
    }

    /// Folds looping axes back into range. Non-looping axes are untouched.
    pub fn wrap(&self, phys: ICoord) -> ICoord {
        ICoord {
            x: if self.loop_x {
                phys.x.rem_euclid(self.dim.width)
            } else {
                phys.x
            },
            y: if self.loop_y {
                phys.y.rem_euclid(self.dim.height)
            } else {
                phys.y
            },
            z: phys.z,
        }
    }

    /// Pixel-space counterpart of [`TileGrid::wrap`].
    pub fn wrap_real(&self, real: RCoord) -> RCoord {
        let span_x = f64::from(self.dim.width) * f64::from(self.tile_dim.x);
        let span_y = f64::from(self.dim.height) * f64::from(self.tile_dim.y);
        RCoord {
            x: if self.loop_x {
                real.x.rem_euclid(span_x)
            } else {
                real.x
            },
            y: if self.loop_y {
                real.y.rem_euclid(span_y)
            } else {
                real.y
            },
            z: real.z,
        }
    }

    pub fn in_bounds(&self, phys: ICoord) -> bool {
        self.cell_index(phys).is_some()
    }

    pub fn get_tile(&self, phys: ICoord) -> Option<&Tile> {
        self.cell_index(phys).and_then(|index| self.cells.get(index))
    }

    pub fn get_tile_mut(&mut self, phys: ICoord) -> Option<&mut Tile> {
        self.cell_index(phys)
            .and_then(move |index| self.cells.get_mut(index))
    }

    fn cell_index(&self, phys: ICoord) -> Option<usize> {
        let ICoord { x, y, z } = self.wrap(phys);
        let in_range = (0..self.dim.width).contains(&x)
            && (0..self.dim.height).contains(&y)
            && (0..self.dim.layers).contains(&z);
        if !in_range {
            return None;
        }
        let (w, h) = (self.dim.width as usize, self.dim.height as usize);
        Some(z as usize * w * h + y as usize * w + x as usize)
    }

    pub fn depth_index(&self, depth: f64) -> Result<i32, CoordError> {
        self.depths.depth_index(depth)
    }

    pub fn index_depth(&self, index: i32) -> Result<f64, CoordError> {
        self.depths.index_depth(index)
    }

    pub fn phys_to_virt(&self, phys: ICoord) -> Result<VICoord, CoordError> {
        Ok(VICoord {
            x: phys.x,
            y: phys.y,
            z: self.index_depth(phys.z)?,
        })
    }

    pub fn phys_to_real(&self, phys: ICoord) -> Result<RCoord, CoordError> {
        Ok(RCoord {
            x: f64::from(phys.x) * f64::from(self.tile_dim.x),
            y: f64::from(phys.y) * f64::from(self.tile_dim.y),
            z: self.index_depth(phys.z)?,
        })
    }

    pub fn virt_to_phys(&self, virt: VICoord) -> Result<ICoord, CoordError> {
        Ok(ICoord {
            x: virt.x,
            y: virt.y,
            z: self.depth_index(virt.z)?,
        })
    }

    pub fn real_to_phys(&self, real: RCoord) -> Result<ICoord, CoordError> {
        Ok(ICoord {
            x: (real.x / f64::from(self.tile_dim.x)).floor() as i32,
            y: (real.y / f64::from(self.tile_dim.y)).floor() as i32,
            z: self.depth_index(real.z)?,
        })
    }

    /// Tile-index box covered by the viewport's pixel rectangle, before any
    /// clamping. Partially visible tiles are included.
    pub fn visible_tile_bounds(&self, offset_px: (f64, f64), size_px: (f64, f64)) -> Cuboid {
        let tw = f64::from(self.tile_dim.x);
        let th = f64::from(self.tile_dim.y);
        Cuboid {
            x1: (offset_px.0 / tw).floor() as i32,
            y1: (offset_px.1 / th).floor() as i32,
            z1: 0,
            x2: ((offset_px.0 + size_px.0) / tw).ceil() as i32,
            y2: ((offset_px.1 + size_px.1) / th).ceil() as i32,
            z2: self.dim.layers,
        }
    }

    /// Visible tile box with non-looping axes clamped to the grid. Looping
    /// axes may span more than one full wrap.
    pub fn visible_tiles(&self, offset_px: (f64, f64), size_px: (f64, f64)) -> Cuboid {
        let mut cube = self.visible_tile_bounds(offset_px, size_px);
        if !self.loop_x {
            cube.x1 = cube.x1.clamp(0, self.dim.width);
            cube.x2 = cube.x2.clamp(0, self.dim.width);
        }
        if !self.loop_y {
            cube.y1 = cube.y1.clamp(0, self.dim.height);
            cube.y2 = cube.y2.clamp(0, self.dim.height);
        }
        cube
    }
}
