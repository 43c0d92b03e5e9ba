//! Process-wide constants captured once, before the store is constructed.

/// How the running binary was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Debug,
    Release,
    Test,
}

impl BuildMode {
    /// Build mode of the current compilation.
    pub const fn current() -> Self {
        if cfg!(test) {
            BuildMode::Test
        } else if cfg!(debug_assertions) {
            BuildMode::Debug
        } else {
            BuildMode::Release
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Release => "release",
            BuildMode::Test => "test",
        }
    }
}

/// Global switches handed to a [`SettingsStore`](crate::SettingsStore) at
/// construction. Never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Disables animations regardless of the user's schema.
    pub no_animations: bool,
    pub build_mode: BuildMode,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            no_animations: cfg!(feature = "no-animations"),
            build_mode: BuildMode::current(),
        }
    }
}
