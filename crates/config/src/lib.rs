// Settings store: theme resolution, schema persistence, change notification

pub mod build;
pub mod error;
pub mod notify;
pub mod persist;
pub mod platform;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod theme;
pub mod watcher;

pub use build::{BuildMode, StoreOptions};
pub use error::{SettingsError, ThemeError};
pub use notify::{ChangeNotifier, ListenerId};
pub use persist::{FileStorage, Storage};
pub use platform::{Platform, SystemPlatform, THEME_ENV};
pub use schema::Schema;
pub use store::{SettingsSnapshot, SettingsStore};
pub use theme::{DefaultTheme, JsonTheme, Palette, Theme, ThemeHandle, Variant};
pub use watcher::{FsWatcher, PollWatcher, Watcher};

/// Framework-agnostic RGBA color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional)
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| -> Option<f32> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        match hex.len() {
            6 => Some(Self::from_rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::from_rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}
