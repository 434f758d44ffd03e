use conductor_core::{Config, Error, MemoryBackendKind, Paths, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{InMemoryBackend, MemoryBackend, SqliteBackend};

/// Memory backends keyed by kind. One of them is selected process-wide.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<MemoryBackendKind, Arc<dyn MemoryBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the in-memory backend, plus SQLite when the config selects it.
    pub fn from_config(config: &Config, paths: &Paths) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(MemoryBackendKind::InMemory, Arc::new(InMemoryBackend::new()))?;
        if config.memory.backend == MemoryBackendKind::Sqlite {
            let backend = SqliteBackend::open(&config.sqlite_path(paths))?;
            registry.register(MemoryBackendKind::Sqlite, Arc::new(backend))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, kind: MemoryBackendKind, backend: Arc<dyn MemoryBackend>) -> Result<()> {
        if self.backends.contains_key(&kind) {
            return Err(Error::Registry(format!("memory backend '{}' already registered", kind)));
        }
        debug!(backend = %kind, "Registered memory backend");
        self.backends.insert(kind, backend);
        Ok(())
    }

    pub fn register_override(&mut self, kind: MemoryBackendKind, backend: Arc<dyn MemoryBackend>) {
        if self.backends.insert(kind, backend).is_some() {
            info!(backend = %kind, "Memory backend overridden");
        }
    }

    pub fn get(&self, kind: MemoryBackendKind) -> Option<Arc<dyn MemoryBackend>> {
        self.backends.get(&kind).cloned()
    }

    /// The backend selected by `kind`, or a configuration error.
    pub fn active(&self, kind: MemoryBackendKind) -> Result<Arc<dyn MemoryBackend>> {
        self.get(kind).ok_or_else(|| {
            Error::Config(format!(
                "Memory backend '{}' not found (available: {:?})",
                kind,
                self.names()
            ))
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.backends.keys().map(|k| k.as_str()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = BackendRegistry::new();
        registry
            .register(MemoryBackendKind::InMemory, Arc::new(InMemoryBackend::new()))
            .unwrap();
        let err = registry
            .register(MemoryBackendKind::InMemory, Arc::new(InMemoryBackend::new()))
            .unwrap_err();
        assert_eq!(err.kind(), "registry");

        registry.register_override(MemoryBackendKind::InMemory, Arc::new(InMemoryBackend::new()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_active_missing_is_config_error() {
        let registry = BackendRegistry::new();
        let err = registry.active(MemoryBackendKind::Sqlite).err().unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_from_config_sqlite() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let paths = Paths::with_base(temp_dir.path().to_path_buf());
        let mut config = Config::default();
        config.memory.backend = MemoryBackendKind::Sqlite;

        let registry = BackendRegistry::from_config(&config, &paths).unwrap();
        assert_eq!(registry.names(), vec!["in_memory", "sqlite"]);
        assert_eq!(registry.active(MemoryBackendKind::Sqlite).unwrap().name(), "sqlite");
        assert!(paths.memory_db().exists());
    }
}
