//! Key-value storage backends for the setting document.
//!
//! Values are kept as `serde_json::Value` regardless of the on-disk format,
//! so TOML, JSON and YAML files all feed the same loader.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use mah_core::ConfigError;
use serde_json::{Map, Value};
use tracing::debug;

pub type RawValue = Value;
pub type RawDocument = Map<String, Value>;

/// Persistence collaborator consumed by [`crate::Setting::load`] and
/// [`crate::Setting::save`].
pub trait Storage: Send + Sync {
    /// Raw value stored under `key`, if any.
    fn read(&self, key: &str) -> Option<RawValue>;

    /// Snapshot of the whole document.
    fn document(&self) -> RawDocument;

    /// Replace the whole document. Either fully applied or not at all.
    fn replace(&self, document: RawDocument) -> Result<(), ConfigError>;

    /// Store a single key. Later writes to the same key win.
    fn write(&self, key: &str, value: RawValue) -> Result<(), ConfigError> {
        let mut document = self.document();
        document.insert(key.to_string(), value);
        self.replace(document)
    }

    /// Re-read the backing medium. Returns `true` if the document changed.
    ///
    /// A changed document is handed to `accept` first and only replaces the
    /// cached one if `accept` returns `Ok`.
    fn refresh(
        &self,
        _accept: &dyn Fn(&RawDocument) -> Result<(), ConfigError>,
    ) -> Result<bool, ConfigError> {
        Ok(false)
    }

    /// Human-readable location used in logs and errors.
    fn describe(&self) -> String;
}

fn read_lock(lock: &RwLock<RawDocument>) -> std::sync::RwLockReadGuard<'_, RawDocument> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock(lock: &RwLock<RawDocument>) -> std::sync::RwLockWriteGuard<'_, RawDocument> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process storage, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    document: RwLock<RawDocument>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: RawDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }

    /// Build from a JSON object literal. Non-object values yield an empty store.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_document(map),
            _ => Self::default(),
        }
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Option<RawValue> {
        read_lock(&self.document).get(key).cloned()
    }

    fn document(&self) -> RawDocument {
        read_lock(&self.document).clone()
    }

    fn replace(&self, document: RawDocument) -> Result<(), ConfigError> {
        *write_lock(&self.document) = document;
        Ok(())
    }

    fn write(&self, key: &str, value: RawValue) -> Result<(), ConfigError> {
        write_lock(&self.document).insert(key.to_string(), value);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// On-disk serialization format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    Toml,
    Json,
    Yaml,
}

impl StorageFormat {
    /// Unknown or missing extensions default to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    fn parse(self, raw: &str) -> Result<Value, String> {
        if raw.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        match self {
            Self::Toml => toml::from_str::<Value>(raw).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str::<Value>(raw).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str::<Value>(raw).map_err(|e| e.to_string()),
        }
    }

    /// Serialize a whole document in this format.
    pub fn render_document(
        self,
        source: &Path,
        document: &RawDocument,
    ) -> Result<String, ConfigError> {
        self.render(document)
            .map_err(|e| ConfigError::persist(source.display().to_string(), e))
    }

    fn render(self, document: &RawDocument) -> Result<String, String> {
        match self {
            Self::Toml => toml::to_string_pretty(document).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(document)
                .map(|s| s + "\n")
                .map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(document).map_err(|e| e.to_string()),
        }
    }
}

/// File-backed storage with atomic whole-file writes.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    format: StorageFormat,
    document: RwLock<RawDocument>,
}

impl FileStorage {
    /// Open `path`, reading it if it exists. A missing file is an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let format = StorageFormat::from_path(&path);
        let document = read_document(&path, format)?;
        debug!(path = %path.display(), ?format, keys = document.len(), "opened setting file");
        Ok(Self {
            path,
            format,
            document: RwLock::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StorageFormat {
        self.format
    }
}

fn read_document(path: &Path, format: StorageFormat) -> Result<RawDocument, ConfigError> {
    if !path.exists() {
        return Ok(RawDocument::new());
    }
    let source = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::parse(&source, e))?;
    match format.parse(&raw).map_err(|e| ConfigError::parse(&source, e))? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(RawDocument::new()),
        other => Err(ConfigError::parse(
            source,
            format!("top level must be a mapping, found {}", value_kind(&other)),
        )),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Option<RawValue> {
        read_lock(&self.document).get(key).cloned()
    }

    fn document(&self) -> RawDocument {
        read_lock(&self.document).clone()
    }

    fn replace(&self, document: RawDocument) -> Result<(), ConfigError> {
        let content = self.format.render_document(&self.path, &document)?;
        write_atomic(&self.path, &content)?;
        *write_lock(&self.document) = document;
        debug!(path = %self.path.display(), "wrote setting file");
        Ok(())
    }

    fn refresh(
        &self,
        accept: &dyn Fn(&RawDocument) -> Result<(), ConfigError>,
    ) -> Result<bool, ConfigError> {
        let fresh = read_document(&self.path, self.format)?;
        if *read_lock(&self.document) == fresh {
            return Ok(false);
        }
        accept(&fresh)?;
        *write_lock(&self.document) = fresh;
        Ok(true)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write `content` to `path` through a sibling temp file and rename.
///
/// Missing parent directories are created. The result is owner-only since
/// the file carries the auth key.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), ConfigError> {
    let persist_error = |e: std::io::Error| ConfigError::persist(path.display().to_string(), e);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist_error)?;
    }

    let tmp_path = tmp_path(path);
    fs::write(&tmp_path, content.as_bytes()).map_err(persist_error)?;
    if let Err(e) = set_file_mode_600(&tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(persist_error(e));
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(persist_error(e));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn set_file_mode_600(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_file_mode_600(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
