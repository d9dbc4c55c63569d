use crate::{Error, Result};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Durable key to string mapping holding calibration values
pub trait CalibrationStore {
    /// Stored value for `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Stage a value; it becomes durable on the next [`flush`](Self::flush)
    fn set(&mut self, key: &str, value: &str);

    /// Remove every value, durably
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn clear(&mut self) -> Result<()>;

    /// Persist staged values
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Process-local store, used in tests and when no path is configured
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl CalibrationStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}

/// YAML file backed store; the file is rewritten only when a value changed
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
    dirty: bool,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable mapping is logged
    /// and treated as empty so every key falls back to its default.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::parse(&content).unwrap_or_else(|e| {
                warn!("Calibration file {} is corrupt, using defaults: {e}", path.display());
                BTreeMap::new()
            })
        } else {
            info!("No calibration file at {}, starting fresh", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    fn parse(content: &str) -> Result<BTreeMap<String, String>> {
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(content)
            .map_err(|e| Error::StoreError(format!("Failed to parse calibration file: {e}")))?;

        Ok(raw
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_yaml::Value::String(s) => Some((key, s)),
                serde_yaml::Value::Number(n) => Some((key, n.to_string())),
                other => {
                    warn!("Skipping calibration entry {key} with unsupported value {other:?}");
                    None
                }
            })
            .collect())
    }

    fn write(&mut self) -> Result<()> {
        let content = serde_yaml::to_string(&self.values)
            .map_err(|e| Error::StoreError(format!("Failed to serialize calibration: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        self.dirty = false;

        debug!("Wrote calibration to {}", self.path.display());
        Ok(())
    }
}

impl CalibrationStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        if self.values.get(key).map(String::as_str) != Some(value) {
            self.values.insert(key.to_string(), value.to_string());
            self.dirty = true;
        }
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        self.values.clear();
        self.dirty = false;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.write()?;
        }
        Ok(())
    }
}
