// Theme handles
// Supports: the built-in default theme and a user theme.json document

use crate::error::ThemeError;
use crate::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Light/dark presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Light,
    Dark,
}

impl Variant {
    /// Map a persisted theme name to a forced variant.
    ///
    /// Only the reserved names "light" and "dark" force one; anything else
    /// (including empty) leaves the platform default in place.
    pub fn from_theme_name(name: &str) -> Option<Variant> {
        match name {
            "light" => Some(Variant::Light),
            "dark" => Some(Variant::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Light => f.write_str("light"),
            Variant::Dark => f.write_str("dark"),
        }
    }
}

/// Colors a theme resolves to for one variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub header_background: Color,
    pub foreground: Color,
    pub foreground_muted: Color,
    pub separator: Color,
    pub primary: Color,
    pub selection: Color,
    pub border: Color,
}

impl Palette {
    /// Built-in dark palette
    pub fn dark() -> Self {
        Palette {
            background: Color::from_rgb(0.008, 0.024, 0.090),        // #020617
            header_background: Color::from_rgb(0.118, 0.161, 0.231), // #1e293b
            foreground: Color::from_rgb(0.945, 0.961, 0.976),        // #f1f5f9
            foreground_muted: Color::from_rgb(0.392, 0.439, 0.529),  // #64748b
            separator: Color::from_rgb(0.200, 0.255, 0.333),         // #334155
            primary: Color::from_rgb(0.231, 0.510, 0.965),           // #3b82f6
            selection: Color::from_rgba(0.231, 0.510, 0.965, 0.2),   // #3b82f6 @ 20%
            border: Color::from_rgb(0.200, 0.255, 0.333),            // #334155
        }
    }

    /// Built-in light palette
    pub fn light() -> Self {
        Palette {
            background: Color::from_rgb(0.973, 0.980, 0.988),        // #f8fafc
            header_background: Color::from_rgb(0.886, 0.910, 0.941), // #e2e8f0
            foreground: Color::from_rgb(0.059, 0.090, 0.165),        // #0f172a
            foreground_muted: Color::from_rgb(0.278, 0.333, 0.412),  // #475569
            separator: Color::from_rgb(0.796, 0.835, 0.882),         // #cbd5e1
            primary: Color::from_rgb(0.231, 0.510, 0.965),           // #3b82f6
            selection: Color::from_rgba(0.231, 0.510, 0.965, 0.15),  // #3b82f6 @ 15%
            border: Color::from_rgb(0.796, 0.835, 0.882),            // #cbd5e1
        }
    }

    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Light => Self::light(),
            Variant::Dark => Self::dark(),
        }
    }

    /// Lighten a color by mixing with white
    fn lighten(color: Color, amount: f32) -> Color {
        Color::from_rgb(
            color.r + (1.0 - color.r) * amount,
            color.g + (1.0 - color.g) * amount,
            color.b + (1.0 - color.b) * amount,
        )
    }

    /// Darken a color by mixing with black
    fn darken(color: Color, amount: f32) -> Color {
        Color::from_rgb(
            color.r * (1.0 - amount),
            color.g * (1.0 - amount),
            color.b * (1.0 - amount),
        )
    }
}

/// A theme as the store sees it: an opaque handle with a name and palettes.
pub trait Theme: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn palette(&self, variant: Variant) -> Palette;
}

/// Shared theme handle. Identity (`Arc::ptr_eq`) is what the store tracks.
pub type ThemeHandle = Arc<dyn Theme>;

/// The compiled-in theme used whenever no user theme is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTheme;

impl DefaultTheme {
    pub const NAME: &'static str = "default";

    pub fn handle() -> ThemeHandle {
        Arc::new(DefaultTheme)
    }
}

impl Theme for DefaultTheme {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn palette(&self, variant: Variant) -> Palette {
        Palette::for_variant(variant)
    }
}

/// JSON theme document (theme.json)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemeConfig {
    #[serde(default)]
    pub name: String,
    /// Colors shared by both variants
    #[serde(default)]
    pub colors: ThemeColorsConfig,
    /// Overrides applied only in the light variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors_light: Option<ThemeColorsConfig>,
    /// Overrides applied only in the dark variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors_dark: Option<ThemeColorsConfig>,
}

/// JSON color definitions (hex strings). Missing entries keep the built-in value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeColorsConfig {
    pub background: Option<String>,
    pub header_background: Option<String>,
    pub foreground: Option<String>,
    pub foreground_muted: Option<String>,
    pub separator: Option<String>,
    pub primary: Option<String>,
    pub border: Option<String>,
    pub selection_alpha: Option<f32>,
}

/// A theme parsed from a user-supplied document.
#[derive(Debug, Clone)]
pub struct JsonTheme {
    name: String,
    light: Palette,
    dark: Palette,
}

impl JsonTheme {
    pub fn from_slice(data: &[u8]) -> Result<Self, ThemeError> {
        let config: ThemeConfig = serde_json::from_slice(data)?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &ThemeConfig) -> Result<Self, ThemeError> {
        let name = if config.name.is_empty() {
            "custom".to_string()
        } else {
            config.name.clone()
        };
        Ok(JsonTheme {
            name,
            light: build_palette(&config.colors, config.colors_light.as_ref(), Variant::Light)?,
            dark: build_palette(&config.colors, config.colors_dark.as_ref(), Variant::Dark)?,
        })
    }
}

impl Theme for JsonTheme {
    fn name(&self) -> &str {
        &self.name
    }

    fn palette(&self, variant: Variant) -> Palette {
        match variant {
            Variant::Light => self.light,
            Variant::Dark => self.dark,
        }
    }
}

/// Variant-specific entry wins over the shared one; an unparseable entry is an error.
fn pick(
    field: &str,
    specific: Option<&Option<String>>,
    shared: &Option<String>,
) -> Result<Option<Color>, ThemeError> {
    let raw = specific.and_then(|s| s.as_ref()).or(shared.as_ref());
    match raw {
        None => Ok(None),
        Some(hex) => Color::parse_hex(hex)
            .map(Some)
            .ok_or_else(|| ThemeError::InvalidColor {
                field: field.to_string(),
                value: hex.clone(),
            }),
    }
}

fn build_palette(
    shared: &ThemeColorsConfig,
    specific: Option<&ThemeColorsConfig>,
    variant: Variant,
) -> Result<Palette, ThemeError> {
    let is_dark = variant == Variant::Dark;
    let base = Palette::for_variant(variant);

    let background = pick("background", specific.map(|s| &s.background), &shared.background)?;
    let header = pick("header_background", specific.map(|s| &s.header_background), &shared.header_background)?;
    let foreground = pick("foreground", specific.map(|s| &s.foreground), &shared.foreground)?;
    let muted = pick("foreground_muted", specific.map(|s| &s.foreground_muted), &shared.foreground_muted)?;
    let separator = pick("separator", specific.map(|s| &s.separator), &shared.separator)?;
    let primary = pick("primary", specific.map(|s| &s.primary), &shared.primary)?;
    let border = pick("border", specific.map(|s| &s.border), &shared.border)?;
    let alpha = specific
        .and_then(|s| s.selection_alpha)
        .or(shared.selection_alpha)
        .unwrap_or(base.selection.a);

    let bg = background.unwrap_or(base.background);
    // A custom background without a header color gets a derived header
    let header_background = match (header, background) {
        (Some(h), _) => h,
        (None, Some(_)) if is_dark => Palette::lighten(bg, 0.06),
        (None, Some(_)) => Palette::darken(bg, 0.03),
        (None, None) => base.header_background,
    };
    let separator = separator.or(border).unwrap_or(base.separator);
    let primary = primary.unwrap_or(base.primary);

    Ok(Palette {
        background: bg,
        header_background,
        foreground: foreground.unwrap_or(base.foreground),
        foreground_muted: muted.unwrap_or(base.foreground_muted),
        separator,
        primary,
        selection: Color::from_rgba(primary.r, primary.g, primary.b, alpha),
        border: border.unwrap_or(separator),
    })
}
