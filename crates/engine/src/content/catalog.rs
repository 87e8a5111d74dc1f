use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

use crate::image_keys::ImageKeyError;
use crate::world::{Animation, IVec2, SpawnError};

use super::files::CatalogFile;

/// Static description of an entity: footprint, speed and its phases.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    pub name: String,
    pub size: IVec2,
    pub speed_tiles_per_sec: f64,
    pub phases: BTreeMap<String, Animation>,
}

impl EntityDef {
    pub fn phase(&self, phase: &str) -> Option<&Animation> {
        self.phases.get(phase)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read entity catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse entity catalog: {source}")]
    Parse {
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("entity '{descriptor}' is defined more than once")]
    DuplicateDescriptor { descriptor: String },
    #[error("entity '{descriptor}' has no phases")]
    NoPhases { descriptor: String },
    #[error("entity '{descriptor}' has invalid size {width}x{height}")]
    InvalidSize {
        descriptor: String,
        width: i32,
        height: i32,
    },
    #[error("entity '{descriptor}' has invalid speed {speed}")]
    InvalidSpeed { descriptor: String, speed: f64 },
    #[error("entity '{descriptor}' uses invalid image key '{key}': {source}")]
    ImageKey {
        descriptor: String,
        key: String,
        #[source]
        source: ImageKeyError,
    },
}

/// Entity definitions keyed by descriptor name.
#[derive(Debug, Default, Clone)]
pub struct EntityCatalog {
    defs: Vec<Rc<EntityDef>>,
    ids_by_name: HashMap<String, usize>,
}

impl EntityCatalog {
    pub fn from_defs(defs: Vec<EntityDef>) -> Result<Self, CatalogError> {
        let mut ids_by_name = HashMap::with_capacity(defs.len());
        for (idx, def) in defs.iter().enumerate() {
            if ids_by_name.insert(def.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateDescriptor {
                    descriptor: def.name.clone(),
                });
            }
        }
        Ok(Self {
            defs: defs.into_iter().map(Rc::new).collect(),
            ids_by_name,
        })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let deserializer = &mut serde_json::Deserializer::from_str(raw);
        let file: CatalogFile = serde_path_to_error::deserialize(deserializer)
            .map_err(|source| CatalogError::Parse { source })?;

        let mut defs = Vec::with_capacity(file.entities.len());
        for entity in file.entities {
            if entity.width <= 0 || entity.height <= 0 {
                return Err(CatalogError::InvalidSize {
                    descriptor: entity.name,
                    width: entity.width,
                    height: entity.height,
                });
            }
            if !entity.speed.is_finite() || entity.speed < 0.0 {
                return Err(CatalogError::InvalidSpeed {
                    descriptor: entity.name,
                    speed: entity.speed,
                });
            }
            if entity.phases.is_empty() {
                return Err(CatalogError::NoPhases {
                    descriptor: entity.name,
                });
            }
            let mut phases = BTreeMap::new();
            for (phase, animation) in &entity.phases {
                let animation =
                    animation
                        .to_animation()
                        .map_err(|(key, source)| CatalogError::ImageKey {
                            descriptor: entity.name.clone(),
                            key,
                            source,
                        })?;
                phases.insert(phase.clone(), animation);
            }
            defs.push(EntityDef {
                name: entity.name,
                size: IVec2::new(entity.width, entity.height),
                speed_tiles_per_sec: entity.speed,
                phases,
            });
        }
        Self::from_defs(defs)
    }

    pub fn get(&self, descriptor: &str) -> Option<Rc<EntityDef>> {
        self.ids_by_name
            .get(descriptor)
            .and_then(|&idx| self.defs.get(idx))
            .cloned()
    }

    /// Looks up `descriptor` and its `phase` animation.
    pub fn resolve(
        &self,
        descriptor: &str,
        phase: &str,
    ) -> Result<(Rc<EntityDef>, Animation), SpawnError> {
        let def = self
            .get(descriptor)
            .ok_or_else(|| SpawnError::UnknownDescriptor {
                descriptor: descriptor.to_string(),
            })?;
        let animation = def
            .phase(phase)
            .cloned()
            .ok_or_else(|| SpawnError::UnknownPhase {
                descriptor: descriptor.to_string(),
                phase: phase.to_string(),
            })?;
        Ok((def, animation))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
