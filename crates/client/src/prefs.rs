//! Persisted client-side preferences.
//!
//! A small JSON object on disk holding the display name, role, job and
//! backend domain. Every read is read-or-initialize: a missing key is
//! written back with its default so the file always reflects what the
//! client actually used.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const KEY_USERNAME: &str = "username";
pub const KEY_ROLE: &str = "role";
pub const KEY_JOB: &str = "job";
pub const KEY_DOMAIN: &str = "domain";

const DEFAULTS: [(&str, &str); 4] = [
    (KEY_USERNAME, "Guest"),
    (KEY_ROLE, "Guest"),
    (KEY_JOB, "None"),
    (KEY_DOMAIN, "localhost:8080"),
];

/// File-backed key-value store.
#[derive(Debug)]
pub struct Preferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Preferences {
    /// Load the store at `path`, starting empty if the file does not
    /// exist yet, then fill in any missing defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| PrefsError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(PrefsError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };

        let mut prefs = Self { path, values };
        let mut initialized = false;
        for (key, default) in DEFAULTS {
            if !prefs.values.contains_key(key) {
                prefs.values.insert(key.to_string(), default.to_string());
                initialized = true;
            }
        }
        if initialized {
            tracing::debug!(path = %prefs.path.display(), "Initialized default preferences");
            prefs.save()?;
        }
        Ok(prefs)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value for `key`, or the empty string when nothing is stored.
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    /// Return the stored value, first persisting `default` if the key is
    /// absent.
    pub fn get_or_init(&mut self, key: &str, default: &str) -> Result<String, PrefsError> {
        if let Some(value) = self.values.get(key) {
            return Ok(value.clone());
        }
        self.set(key, default)?;
        Ok(default.to_string())
    }

    /// Store `value` under `key` and persist immediately.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }

    pub fn username(&self) -> &str {
        self.get(KEY_USERNAME)
    }

    pub fn role(&self) -> &str {
        self.get(KEY_ROLE)
    }

    pub fn job(&self) -> &str {
        self.get(KEY_JOB)
    }

    pub fn domain(&self) -> &str {
        self.get(KEY_DOMAIN)
    }

    fn save(&self) -> Result<(), PrefsError> {
        let text = serde_json::to_string_pretty(&self.values).map_err(|source| {
            PrefsError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, text).map_err(|source| PrefsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("Failed to access preferences at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Preferences at {path} are not a JSON string map: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
