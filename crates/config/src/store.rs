//! Process-wide settings store
//!
//! One `SettingsStore` is constructed at startup and shared as an
//! `Arc<SettingsStore>` with everything that reads presentation settings.
//! Tests build as many isolated stores as they like.
//!
//! All state sits behind a single read/write lock. Locks are never held
//! across file I/O or channel sends.

use std::fmt;
use std::sync::{Arc, Weak};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::build::{BuildMode, StoreOptions};
use crate::error::SettingsError;
use crate::notify::{ChangeNotifier, ListenerId};
use crate::persist::{FileStorage, Storage};
use crate::platform::{Platform, SystemPlatform};
use crate::resolver::{self, Resolution};
use crate::schema::Schema;
use crate::theme::{DefaultTheme, Theme, ThemeHandle, Variant};
use crate::watcher::Watcher;

struct State {
    theme: Option<ThemeHandle>,
    /// Sticky: set once a caller picks a theme through the API.
    theme_specified: bool,
    variant: Variant,
    schema: Schema,
}

/// Consistent view of the store taken under one lock acquisition.
#[derive(Debug, Clone)]
pub struct SettingsSnapshot {
    pub theme: Option<ThemeHandle>,
    pub variant: Variant,
    pub theme_name: String,
    pub scale: f32,
    pub primary_color: String,
    pub show_animations: bool,
}

pub struct SettingsStore {
    state: RwLock<State>,
    notifier: ChangeNotifier<Arc<SettingsStore>>,
    storage: Arc<dyn Storage>,
    platform: Arc<dyn Platform>,
    options: StoreOptions,
    watcher: Mutex<Option<Box<dyn Watcher>>>,
    this: Weak<SettingsStore>,
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SettingsStore")
            .field("theme", &state.theme.as_ref().map(|t| t.name().to_string()))
            .field("theme_specified", &state.theme_specified)
            .field("variant", &state.variant)
            .field("schema", &state.schema)
            .field("options", &self.options)
            .field("listeners", &self.notifier.listener_count())
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Create a store from persisted settings. No theme is active until
    /// [`setup_theme`](Self::setup_theme) or [`set_theme`](Self::set_theme) runs.
    pub fn load(
        storage: Arc<dyn Storage>,
        platform: Arc<dyn Platform>,
        options: StoreOptions,
    ) -> Arc<Self> {
        let schema = storage.load();
        let variant = platform.default_variant();
        Arc::new_cyclic(|this| SettingsStore {
            state: RwLock::new(State {
                theme: None,
                theme_specified: false,
                variant,
                schema,
            }),
            notifier: ChangeNotifier::new(),
            storage,
            platform,
            options,
            watcher: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// Store backed by the per-user config directory, with the theme set up.
    pub fn open() -> Arc<Self> {
        let store = Self::load(
            Arc::new(FileStorage::new()),
            Arc::new(SystemPlatform),
            StoreOptions::default(),
        );
        store.setup_theme();
        store
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn build_type(&self) -> BuildMode {
        self.options.build_mode
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn primary_color(&self) -> String {
        self.state.read().schema.primary_color.clone()
    }

    /// The effective theme, or `None` (logged) before setup has run.
    pub fn theme(&self) -> Option<ThemeHandle> {
        let theme = self.state.read().theme.clone();
        if theme.is_none() {
            log::error!("Attempt to access the current theme before settings were set up");
        }
        theme
    }

    pub fn theme_specified(&self) -> bool {
        self.state.read().theme_specified
    }

    pub fn variant(&self) -> Variant {
        self.state.read().variant
    }

    /// UI scale factor, always > 0.
    pub fn scale(&self) -> f32 {
        self.state.read().schema.effective_scale()
    }

    pub fn show_animations(&self) -> bool {
        !self.state.read().schema.disable_animations && !self.options.no_animations
    }

    pub fn schema(&self) -> Schema {
        self.state.read().schema.clone()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        let state = self.state.read();
        SettingsSnapshot {
            theme: state.theme.clone(),
            variant: state.variant,
            theme_name: state.schema.theme_name.clone(),
            scale: state.schema.effective_scale(),
            primary_color: state.schema.primary_color.clone(),
            show_animations: !state.schema.disable_animations && !self.options.no_animations,
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Make `theme` the effective theme, keeping the current variant.
    ///
    /// Later setup runs and reloads keep this theme.
    pub fn set_theme(&self, theme: ThemeHandle) {
        {
            let mut state = self.state.write();
            state.theme_specified = true;
            state.theme = Some(theme);
        }
        self.apply();
    }

    /// Temporarily preview a theme and accent color without notifying anyone.
    ///
    /// The caller must remember the previous values and call this again to
    /// restore them. The override flag is left untouched.
    pub fn override_theme(&self, theme: ThemeHandle, primary_color: &str) {
        let mut state = self.state.write();
        state.schema.primary_color = primary_color.to_string();
        state.theme = Some(theme);
    }

    /// The platform reports a new system appearance.
    ///
    /// Ignored when the theme name forces a variant.
    pub fn set_system_variant(&self, variant: Variant) {
        let env = self.platform.theme_override();
        let forced = {
            let state = self.state.read();
            Variant::from_theme_name(resolver::candidate_name(&state.schema, env.as_deref()))
        };
        if forced.is_none() {
            self.apply_variant(variant);
        }
    }

    /// Edit the schema, persist it, and notify listeners.
    ///
    /// A changed theme name re-derives the variant. Listeners are notified
    /// even when saving fails; the error is returned.
    pub fn update_schema<F, R>(&self, f: F) -> Result<R, SettingsError>
    where
        F: FnOnce(&mut Schema) -> R,
    {
        let env = self.platform.theme_override();
        let fallback = self.platform.default_variant();
        let (result, schema) = {
            let mut state = self.state.write();
            let previous = state.schema.theme_name.clone();
            let result = f(&mut state.schema);
            if state.schema.theme_name != previous {
                let name = resolver::candidate_name(&state.schema, env.as_deref());
                let variant = resolver::variant_for(name, fallback);
                state.variant = variant;
            }
            (result, state.schema.clone())
        };
        let saved = self.storage.save(&schema);
        self.apply();
        saved.map(|()| result)
    }

    /// Resolve and apply the effective theme and variant.
    ///
    /// Never fails: unreadable or malformed user themes fall back to the
    /// built-in one. Must not run concurrently with itself.
    pub fn setup_theme(&self) {
        let (schema, specified) = {
            let state = self.state.read();
            let specified = state
                .theme_specified
                .then(|| state.theme.clone().unwrap_or_else(DefaultTheme::handle));
            (state.schema.clone(), specified)
        };
        let env = self.platform.theme_override();

        let (theme, variant) = resolver::resolve(
            Resolution {
                schema: &schema,
                env_override: env.as_deref(),
                platform_variant: self.platform.default_variant(),
                specified,
            },
            || resolver::load_user_theme(self.storage.as_ref()),
        );
        self.apply_theme(theme, variant);
    }

    /// Reload the schema after the settings file changed on disk.
    ///
    /// Only schema-derived properties refresh; the theme is not re-resolved.
    /// A missing or unreadable document keeps the current schema.
    pub fn file_changed(&self) {
        let schema = match self.storage.read() {
            Ok(Some(schema)) => schema,
            Ok(None) => {
                log::debug!(
                    "Settings file {} is gone; keeping current settings",
                    self.storage.settings_path().display()
                );
                return;
            }
            Err(e) => {
                log::warn!("{e}; keeping current settings");
                return;
            }
        };
        self.state.write().schema = schema;
        log::debug!("Reloaded settings from {}", self.storage.settings_path().display());
        self.apply();
    }

    fn apply_theme(&self, theme: ThemeHandle, variant: Variant) {
        {
            let mut state = self.state.write();
            state.variant = variant;
            state.theme = Some(theme);
        }
        self.apply();
    }

    fn apply_variant(&self, variant: Variant) {
        self.state.write().variant = variant;
        self.apply();
    }

    // ========================================================================
    // Change notification
    // ========================================================================

    /// Register a channel that receives the store on every change.
    pub fn add_change_listener(&self, listener: Sender<Arc<SettingsStore>>) -> ListenerId {
        self.notifier.add_listener(listener)
    }

    pub fn remove_change_listener(&self, id: ListenerId) -> bool {
        self.notifier.remove_listener(id)
    }

    /// Create and register a channel with the given buffer size.
    pub fn subscribe(&self, capacity: usize) -> (ListenerId, Receiver<Arc<SettingsStore>>) {
        let (tx, rx) = bounded(capacity);
        (self.notifier.add_listener(tx), rx)
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }

    /// Send this store to every listener without blocking.
    pub fn apply(&self) {
        if let Some(this) = self.this.upgrade() {
            self.notifier.notify(this);
        }
    }

    // ========================================================================
    // File watching
    // ========================================================================

    /// Reload on external edits to the settings file, replacing any
    /// previous watcher.
    pub fn watch(&self, mut watcher: Box<dyn Watcher>) -> Result<(), SettingsError> {
        let this = self.this.clone();
        watcher.start(
            &self.storage.settings_path(),
            Box::new(move || {
                if let Some(store) = this.upgrade() {
                    store.file_changed();
                }
            }),
        )?;

        let previous = self.watcher.lock().replace(watcher);
        if let Some(mut previous) = previous {
            previous.stop();
        }
        Ok(())
    }

    pub fn unwatch(&self) {
        let watcher = self.watcher.lock().take();
        if let Some(mut watcher) = watcher {
            watcher.stop();
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }
}

impl Drop for SettingsStore {
    fn drop(&mut self) {
        self.unwatch();
    }
}
