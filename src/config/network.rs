/// Network configuration constants.
///
/// This module defines the shared-group layout used for match exchange and
/// where the per-device identity is persisted.
use std::path::PathBuf;

/// Name of the field holding the serialized match inside a shared group.
pub const MATCH_DATA_KEY: &str = "LevelDefinition";

/// Separator between the two sorted user ids of a group id.
/// User ids must never contain it.
pub const GROUP_ID_SEPARATOR: char = '-';

/// File (inside the data directory) holding the unique device id.
pub const DEVICE_ID_FILE_NAME: &str = "UniqueDeviceGuid.dat";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "ARROW_DUEL_DATA_DIR";

/// Environment variable pinning the device id of the first local player.
pub const DEVICE_ID_ENV: &str = "ARROW_DUEL_DEVICE_ID";

/// Data directory used when `ARROW_DUEL_DATA_DIR` is not set.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Minimum password length accepted on registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Resolve the directory where local state is persisted.
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}
