//! Storage backend selection

use serde::Deserialize;

/// Where reconciled state lives.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Process-local maps; state is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

impl StorageConfig {
    pub fn uses_postgres(&self) -> bool {
        self.backend == StorageBackend::Postgres
    }
}
