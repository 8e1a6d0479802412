//! Saved city per user.
//!
//! Always kept in memory. A persistent store additionally mirrors every
//! change to a JSON file (temp file + rename, so a crash leaves either the old
//! or the new contents).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use weatherbot_core::StorageError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CityFile {
    #[serde(default)]
    cities: BTreeMap<i64, String>,
}

#[derive(Debug, Default)]
pub struct UserCities {
    cities: RwLock<BTreeMap<i64, String>>,
    path: Option<PathBuf>,
}

impl UserCities {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed store. A missing file is an empty store.
    pub fn persistent(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let cities = load(&path)?;
        tracing::info!("Loaded {} saved cities from {}", cities.len(), path.display());

        Ok(Self {
            cities: RwLock::new(cities),
            path: Some(path),
        })
    }

    pub fn get(&self, user_id: i64) -> Option<String> {
        self.cities.read().get(&user_id).cloned()
    }

    /// Save (or replace) a user's city.
    ///
    /// The in-memory value is updated even when writing the file fails.
    pub fn set(&self, user_id: i64, city: &str) -> Result<(), StorageError> {
        let mut cities = self.cities.write();
        cities.insert(user_id, city.to_string());

        match &self.path {
            Some(path) => save(path, &cities),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.cities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.read().is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }
}

fn load(path: &Path) -> Result<BTreeMap<i64, String>, StorageError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(StorageError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    };

    let file: CityFile =
        serde_json::from_str(&contents).map_err(|e| StorageError::Corruption {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    Ok(file.cities)
}

fn save(path: &Path, cities: &BTreeMap<i64, String>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_error(path, e))?;
    }

    let file = CityFile {
        cities: cities.clone(),
    };
    let contents = serde_json::to_string_pretty(&file).map_err(|e| write_error(path, e))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents).map_err(|e| write_error(path, e))?;
    std::fs::rename(&tmp, path).map_err(|e| write_error(path, e))?;

    Ok(())
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
