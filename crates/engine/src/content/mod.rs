mod catalog;
mod files;
mod loader;

pub use catalog::{CatalogError, EntityCatalog, EntityDef};
pub use files::{
    AnimationFile, AreaFile, CatalogFile, CoordFile, EntityFile, LayerFile, SpawnFile, SpawnKind,
    TileSetFile,
};
pub use loader::{load_area, load_area_from_path, parse_area_file, read_area_file, AreaLoadError};
