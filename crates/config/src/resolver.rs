//! Effective theme and variant resolution.
//!
//! Precedence for the theme name: `PRISM_THEME` over the persisted schema.
//! Precedence for the theme: an explicitly set theme, else the user's
//! theme.json, else the built-in default.

use std::io;

use crate::persist::Storage;
use crate::schema::Schema;
use crate::theme::{DefaultTheme, JsonTheme, Theme, ThemeHandle, Variant};

/// Inputs gathered by the store before resolving.
pub struct Resolution<'a> {
    pub schema: &'a Schema,
    /// Non-empty environment override of the theme name.
    pub env_override: Option<&'a str>,
    pub platform_variant: Variant,
    /// The theme set through the API, if any.
    pub specified: Option<ThemeHandle>,
}

/// Theme name in effect: the environment override wins when non-empty.
pub fn candidate_name<'a>(schema: &'a Schema, env_override: Option<&'a str>) -> &'a str {
    match env_override {
        Some(name) if !name.is_empty() => name,
        _ => &schema.theme_name,
    }
}

/// Forced variant for `name`, or `fallback` when the name doesn't force one.
pub fn variant_for(name: &str, fallback: Variant) -> Variant {
    Variant::from_theme_name(name).unwrap_or(fallback)
}

/// Decide the (theme, variant) pair to apply. `load_user_theme` is only
/// called when no theme was set explicitly.
pub fn resolve<F>(input: Resolution<'_>, load_user_theme: F) -> (ThemeHandle, Variant)
where
    F: FnOnce() -> ThemeHandle,
{
    let name = candidate_name(input.schema, input.env_override);
    let variant = variant_for(name, input.platform_variant);
    let theme = match input.specified {
        Some(theme) => theme,
        None => load_user_theme(),
    };
    (theme, variant)
}

/// Load theme.json from storage, degrading to the built-in theme.
///
/// Absence is silent; any other failure is logged and never returned.
pub fn load_user_theme(storage: &dyn Storage) -> ThemeHandle {
    let path = storage.theme_path();
    let data = match storage.read_theme() {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return DefaultTheme::handle(),
        Err(e) => {
            log::error!("Failed to load user theme file {}: {}", path.display(), e);
            return DefaultTheme::handle();
        }
    };

    if data.is_empty() {
        return DefaultTheme::handle();
    }

    match JsonTheme::from_slice(&data) {
        Ok(theme) => {
            log::debug!("Loaded user theme '{}' from {}", theme.name(), path.display());
            std::sync::Arc::new(theme)
        }
        Err(e) => {
            log::error!("Failed to parse user theme file {}: {}", path.display(), e);
            DefaultTheme::handle()
        }
    }
}
