//! Host platform hooks consulted during theme setup.

use crate::theme::Variant;

/// Environment variable that overrides the persisted theme name.
pub const THEME_ENV: &str = "PRISM_THEME";

/// What the host tells us about its appearance.
pub trait Platform: Send + Sync {
    /// Variant used when the settings do not force one.
    fn default_variant(&self) -> Variant;

    /// Theme name override from the environment, if set and non-empty.
    fn theme_override(&self) -> Option<String> {
        std::env::var(THEME_ENV).ok().filter(|v| !v.is_empty())
    }
}

/// The real host. Falls back to dark like the built-in theme manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPlatform;

impl Platform for SystemPlatform {
    fn default_variant(&self) -> Variant {
        Variant::Dark
    }
}
