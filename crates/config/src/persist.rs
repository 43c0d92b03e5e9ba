//! Settings persistence (load/save)
//!
//! User settings are stored in `<config dir>/prism/settings.json`, the user
//! theme next to it in `theme.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;
use crate::schema::Schema;

/// Overrides the settings directory (useful for CI and tests).
pub const CONFIG_DIR_ENV: &str = "PRISM_CONFIG_DIR";

pub const SETTINGS_FILE: &str = "settings.json";
pub const THEME_FILE: &str = "theme.json";

/// Where the settings document and user theme live.
pub trait Storage: Send + Sync {
    fn settings_path(&self) -> PathBuf;

    fn theme_path(&self) -> PathBuf;

    /// Read the schema document.
    ///
    /// `Ok(None)` means there is no document yet.
    fn read(&self) -> Result<Option<Schema>, SettingsError>;

    /// Load the schema. Never fails: problems degrade to defaults.
    fn load(&self) -> Schema {
        match self.read() {
            Ok(schema) => schema.unwrap_or_default(),
            Err(e) => {
                log::warn!("{e}; using defaults");
                Schema::default()
            }
        }
    }

    fn save(&self, schema: &Schema) -> Result<(), SettingsError>;

    /// Raw bytes of the user theme document.
    ///
    /// `ErrorKind::NotFound` means there is no user theme.
    fn read_theme(&self) -> io::Result<Vec<u8>>;
}

/// Storage backed by JSON files in a config directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Storage in the per-user config directory.
    pub fn new() -> Self {
        Self::with_root(root_config_dir())
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// `$PRISM_CONFIG_DIR`, else `<config dir>/prism`, else `./prism`.
pub fn root_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prism")
}

/// Drop whole-line `//` comments so hand-edited files still parse.
fn strip_comments(contents: &str) -> String {
    contents
        .lines()
        .filter(|line| !line.trim().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Storage for FileStorage {
    fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    fn theme_path(&self) -> PathBuf {
        self.root.join(THEME_FILE)
    }

    fn read(&self) -> Result<Option<Schema>, SettingsError> {
        let path = self.settings_path();

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SettingsError::io(path, e)),
        };

        serde_json::from_str(&strip_comments(&contents))
            .map(Some)
            .map_err(|source| SettingsError::Parse { path, source })
    }

    /// Atomic write: temp file then rename.
    fn save(&self, schema: &Schema) -> Result<(), SettingsError> {
        let path = self.settings_path();
        fs::create_dir_all(&self.root).map_err(|e| SettingsError::io(&self.root, e))?;

        let json = serde_json::to_string_pretty(schema).map_err(|e| SettingsError::Parse {
            path: path.clone(),
            source: e,
        })?;

        let temp = path.with_extension("json.tmp");
        fs::write(&temp, json).map_err(|e| SettingsError::io(&temp, e))?;
        fs::rename(&temp, &path).map_err(|e| SettingsError::io(&path, e))?;
        Ok(())
    }

    fn read_theme(&self) -> io::Result<Vec<u8>> {
        fs::read(self.theme_path())
    }
}
