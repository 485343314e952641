mod config;
pub mod database;
pub mod memory;
pub mod session_store;

pub use config::{Config, DurationsConfig, NotificationsConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use session_store::{PersistedSession, SessionStore};

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{CoreError, StorageError};

/// Durable string key-value storage.
///
/// The session engine is the only writer of the `session.*` keys.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + Sync + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Returns the data directory, creating it if needed.
///
/// `ONEPOMODORO_DATA_DIR` wins when set. Otherwise `~/.config/onepomodoro[-dev]/`,
/// with `ONEPOMODORO_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let dir = match std::env::var_os("ONEPOMODORO_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env =
                std::env::var("ONEPOMODORO_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("onepomodoro-dev")
            } else {
                base_dir.join("onepomodoro")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
