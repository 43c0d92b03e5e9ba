// Persisted user preferences
// Loaded from <config dir>/prism/settings.json

use serde::{Deserialize, Serialize};

/// Scale written by old releases to mean "auto".
pub const LEGACY_AUTO_SCALE: f32 = -1.0;

/// The settings document as stored on disk.
///
/// Plain data. The raw `scale` is kept exactly as loaded so it round-trips;
/// use [`Schema::effective_scale`] to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// "light", "dark", any custom name, or empty for the system default.
    #[serde(rename = "theme")]
    pub theme_name: String,

    pub scale: f32,

    pub primary_color: String,

    pub cloud_name: String,

    pub cloud_config: String,

    #[serde(rename = "no_animations")]
    pub disable_animations: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            theme_name: String::new(), // Empty = system default
            scale: 1.0,
            primary_color: String::new(),
            cloud_name: String::new(),
            cloud_config: String::new(),
            disable_animations: false,
        }
    }
}

impl Schema {
    /// Scale as seen by readers: never zero or negative.
    pub fn effective_scale(&self) -> f32 {
        // Also catches the legacy -1 "auto" value
        if self.scale > 0.0 {
            self.scale
        } else {
            1.0
        }
    }
}
