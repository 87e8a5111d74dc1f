use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::info;

use crate::image_keys::{validate_image_key, ImageKeyError};
use crate::world::{
    Area, Character, CoordError, DepthTable, GridError, ICoord, IVec2, Shared, SpawnError,
    TileGrid, TileSet, TileSets, TileType, VICoord,
};

use super::catalog::EntityCatalog;
use super::files::{AreaFile, CoordFile, SpawnKind};

#[derive(Debug, Error)]
pub enum AreaLoadError {
    #[error("failed to read area file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse area file: {source}")]
    Parse {
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("area '{area}' has dimensions too large to address: {width}x{height}")]
    InvalidDimensions {
        area: String,
        width: u32,
        height: u32,
    },
    #[error("area '{area}' has tile size too large to address: {tile_width}x{tile_height}")]
    InvalidTileSize {
        area: String,
        tile_width: u32,
        tile_height: u32,
    },
    #[error("area '{area}': {source}")]
    Grid {
        area: String,
        #[source]
        source: GridError,
    },
    #[error("area '{area}': {source}")]
    Depth {
        area: String,
        #[source]
        source: CoordError,
    },
    #[error("area '{area}' layer at depth {depth} has {actual} tiles, expected {expected}")]
    TileCountMismatch {
        area: String,
        depth: f64,
        expected: usize,
        actual: usize,
    },
    #[error("area '{area}' layer at depth {depth} references unknown tile id {gid}")]
    UnknownGid { area: String, depth: f64, gid: u32 },
    #[error("area '{area}' uses invalid image key '{key}': {source}")]
    ImageKey {
        area: String,
        key: String,
        #[source]
        source: ImageKeyError,
    },
    #[error("area '{area}' declares tile set '{image}' twice")]
    DuplicateTileSet { area: String, image: String },
    #[error("area '{area}' {what} at ({x}, {y}) uses depth {depth}, which has no layer")]
    UnmappedDepth {
        area: String,
        what: &'static str,
        x: i32,
        y: i32,
        depth: f64,
    },
    #[error("area '{area}' {what} at ({x}, {y}) lies outside the grid")]
    OutOfBounds {
        area: String,
        what: &'static str,
        x: i32,
        y: i32,
    },
    #[error("area '{area}' spawn failed: {source}")]
    Spawn {
        area: String,
        #[source]
        source: SpawnError,
    },
}

pub fn read_area_file(path: &Path) -> Result<AreaFile, AreaLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| AreaLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_area_file(&raw)
}

pub fn parse_area_file(raw: &str) -> Result<AreaFile, AreaLoadError> {
    let deserializer = &mut serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(deserializer).map_err(|source| AreaLoadError::Parse { source })
}

/// Reads, validates and builds the area stored at `path`.
pub fn load_area_from_path(
    path: &Path,
    player: Shared<Character>,
    catalog: Rc<EntityCatalog>,
) -> Result<Area, AreaLoadError> {
    let file = read_area_file(path)?;
    load_area(&file, player, catalog)
}

/// Builds an [`Area`] from its file form. Everything is validated before the
/// area exists, so a returned area never hits the fatal coordinate paths for
/// its own spawns or entry point.
pub fn load_area(
    file: &AreaFile,
    player: Shared<Character>,
    catalog: Rc<EntityCatalog>,
) -> Result<Area, AreaLoadError> {
    let area = file.name.as_str();
    let (width, height) = match (i32::try_from(file.width), i32::try_from(file.height)) {
        (Ok(width), Ok(height)) => (width, height),
        _ => {
            return Err(AreaLoadError::InvalidDimensions {
                area: area.to_string(),
                width: file.width,
                height: file.height,
            })
        }
    };
    let tile_dim = match (i32::try_from(file.tile_width), i32::try_from(file.tile_height)) {
        (Ok(tile_width), Ok(tile_height)) => IVec2::new(tile_width, tile_height),
        _ => {
            return Err(AreaLoadError::InvalidTileSize {
                area: area.to_string(),
                tile_width: file.tile_width,
                tile_height: file.tile_height,
            })
        }
    };

    let (tile_sets, gids) = build_tile_sets(file, tile_dim)?;

    let depths = DepthTable::from_depths(file.layers.iter().map(|layer| layer.depth)).map_err(
        |source| AreaLoadError::Depth {
            area: area.to_string(),
            source,
        },
    )?;

    // Layer sizes are checked before the grid allocates anything.
    let expected = (width as usize).checked_mul(height as usize).ok_or_else(|| {
        AreaLoadError::InvalidDimensions {
            area: area.to_string(),
            width: file.width,
            height: file.height,
        }
    })?;
    for layer in &file.layers {
        if layer.tiles.len() != expected {
            return Err(AreaLoadError::TileCountMismatch {
                area: area.to_string(),
                depth: layer.depth,
                expected,
                actual: layer.tiles.len(),
            });
        }
        if let Some(&gid) = layer.tiles.iter().find(|&&gid| gid as usize > gids.len()) {
            return Err(AreaLoadError::UnknownGid {
                area: area.to_string(),
                depth: layer.depth,
                gid,
            });
        }
    }

    let mut grid = TileGrid::new(width, height, tile_dim, depths, file.loop_x, file.loop_y)
        .map_err(|source| AreaLoadError::Grid {
            area: area.to_string(),
            source,
        })?;

    let row = width as usize;
    for (z, layer) in file.layers.iter().enumerate() {
        for (idx, &gid) in layer.tiles.iter().enumerate() {
            let Some(tile_type) = gid.checked_sub(1).and_then(|id| gids.get(id as usize)) else {
                continue;
            };
            let phys = ICoord::new((idx % row) as i32, (idx / row) as i32, z as i32);
            if let Some(tile) = grid.get_tile_mut(phys) {
                tile.set_tile_type(Some(Rc::clone(tile_type)));
            }
        }
    }

    if let Some(entry) = file.entry {
        check_coord(area, &grid, "entry", entry)?;
    }
    for spawn in &file.spawns {
        check_coord(area, &grid, "spawn", spawn.at)?;
        catalog
            .resolve(&spawn.descriptor, &spawn.phase)
            .map_err(|source| AreaLoadError::Spawn {
                area: area.to_string(),
                source,
            })?;
    }

    let mut built = Area::new(area, grid, tile_sets, player, catalog);
    built.set_music(file.music.clone());
    for spawn in &file.spawns {
        let at = VICoord::new(spawn.at.x, spawn.at.y, spawn.at.depth);
        match spawn.kind {
            SpawnKind::Npc => {
                built.spawn_npc(&spawn.descriptor, at, &spawn.phase);
            }
            SpawnKind::Overlay => {
                built.spawn_overlay(&spawn.descriptor, at, &spawn.phase);
            }
        }
    }

    info!(
        area,
        width,
        height,
        layers = file.layers.len(),
        tile_sets = file.tilesets.len(),
        spawns = file.spawns.len(),
        "area_loaded"
    );
    Ok(built)
}

/// Builds the tile sets and the gid lookup table (`gid - 1` → type).
fn build_tile_sets(
    file: &AreaFile,
    tile_dim: IVec2,
) -> Result<(TileSets, Vec<Rc<TileType>>), AreaLoadError> {
    let area = file.name.as_str();
    let mut tile_sets = TileSets::default();
    let mut gids = Vec::new();
    for set_file in &file.tilesets {
        validate_image_key(&set_file.image).map_err(|source| AreaLoadError::ImageKey {
            area: area.to_string(),
            key: set_file.image.clone(),
            source,
        })?;
        if tile_sets.contains(&set_file.image) {
            return Err(AreaLoadError::DuplicateTileSet {
                area: area.to_string(),
                image: set_file.image.clone(),
            });
        }
        let mut set = TileSet::new(set_file.image.clone(), tile_dim);
        for tile in &set_file.tiles {
            let animation = tile
                .to_animation()
                .map_err(|(key, source)| AreaLoadError::ImageKey {
                    area: area.to_string(),
                    key,
                    source,
                })?;
            let gid = gids.len() as u32 + 1;
            gids.push(set.push(TileType::new(gid, set_file.image.clone(), animation)));
        }
        tile_sets.insert(set);
    }
    Ok((tile_sets, gids))
}

fn check_coord(
    area: &str,
    grid: &TileGrid,
    what: &'static str,
    at: CoordFile,
) -> Result<(), AreaLoadError> {
    let z = grid
        .depth_index(at.depth)
        .map_err(|_| AreaLoadError::UnmappedDepth {
            area: area.to_string(),
            what,
            x: at.x,
            y: at.y,
            depth: at.depth,
        })?;
    if !grid.in_bounds(ICoord::new(at.x, at.y, z)) {
        return Err(AreaLoadError::OutOfBounds {
            area: area.to_string(),
            what,
            x: at.x,
            y: at.y,
        });
    }
    Ok(())
}
