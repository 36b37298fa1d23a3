//! Persistent per-device identity.
//!
//! A single UUID, stored as JSON in one file, identifies this device to the backend so
//! an anonymous player is logged back into the same account on every launch.

use log::info;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::error::DeviceIdError;
use crate::config::network::DEVICE_ID_FILE_NAME;

/// Read-or-create access to the device id file.
#[derive(Debug, Clone)]
pub struct DeviceIdStore {
    path: PathBuf,
}

impl DeviceIdStore {
    /// Store using the standard file name inside `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::at(data_dir.as_ref().join(DEVICE_ID_FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The device id, generated and persisted on first use.
    pub fn get_value(&self) -> Result<Uuid, DeviceIdError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| DeviceIdError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let id = Uuid::new_v4();
                self.write(&id)?;
                info!("[DeviceId] Generated new device id in {}", self.path.display());
                Ok(id)
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Overwrite the stored device id.
    pub fn update_value_on_disk(&self, id: &str) -> Result<Uuid, DeviceIdError> {
        let id = Uuid::parse_str(id).map_err(|e| DeviceIdError::InvalidId {
            value: id.to_string(),
            reason: e.to_string(),
        })?;
        self.write(&id)?;
        Ok(id)
    }

    fn write(&self, id: &Uuid) -> Result<(), DeviceIdError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string(id).map_err(|e| DeviceIdError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, e: std::io::Error) -> DeviceIdError {
        DeviceIdError::Io {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}
