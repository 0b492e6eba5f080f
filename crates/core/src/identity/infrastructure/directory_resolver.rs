use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::identity::domain::identity_resolver::IdentityResolver;
use crate::shared::session::IdentityRecord;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("failed to read directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse directory {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory identity directory keyed by recognized name.
///
/// File format: a JSON object mapping each name to an [`IdentityRecord`],
/// e.g. `{"Subject-A": {"external_id": "EMP-001", "affiliation": "lab"}}`.
#[derive(Debug, Default, Clone)]
pub struct DirectoryResolver {
    entries: HashMap<String, IdentityRecord>,
}

impl DirectoryResolver {
    pub fn new(entries: HashMap<String, IdentityRecord>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let json = fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = serde_json::from_str(&json).map_err(|source| DirectoryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IdentityResolver for DirectoryResolver {
    fn resolve(&self, name: &str) -> Option<IdentityRecord> {
        self.entries.get(name).cloned()
    }
}
