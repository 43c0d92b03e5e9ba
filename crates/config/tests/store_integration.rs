// Integration tests for the settings store: resolution against real files,
// reload via the file watchers, and fan-out/locking behavior under concurrency.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use proptest::prelude::*;
use tempfile::TempDir;

use prism_config::{
    DefaultTheme, FileStorage, FsWatcher, Palette, Platform, PollWatcher, Schema, SettingsError,
    SettingsStore, Storage, StoreOptions, Theme, ThemeHandle, Variant,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct FixedPlatform {
    variant: Variant,
    env: Option<&'static str>,
}

impl Platform for FixedPlatform {
    fn default_variant(&self) -> Variant {
        self.variant
    }

    fn theme_override(&self) -> Option<String> {
        self.env.filter(|v| !v.is_empty()).map(String::from)
    }
}

fn platform(variant: Variant) -> Arc<dyn Platform> {
    Arc::new(FixedPlatform { variant, env: None })
}

#[derive(Default)]
struct MemoryStorage {
    schema: Mutex<Schema>,
}

impl Storage for MemoryStorage {
    fn settings_path(&self) -> PathBuf {
        PathBuf::from("memory/settings.json")
    }
    fn theme_path(&self) -> PathBuf {
        PathBuf::from("memory/theme.json")
    }
    fn read(&self) -> Result<Option<Schema>, SettingsError> {
        Ok(Some(self.schema.lock().clone()))
    }
    fn save(&self, schema: &Schema) -> Result<(), SettingsError> {
        *self.schema.lock() = schema.clone();
        Ok(())
    }
    fn read_theme(&self) -> io::Result<Vec<u8>> {
        Err(io::Error::from(io::ErrorKind::NotFound))
    }
}

#[derive(Debug)]
struct Named(&'static str);

impl Theme for Named {
    fn name(&self) -> &str {
        self.0
    }
    fn palette(&self, variant: Variant) -> Palette {
        Palette::for_variant(variant)
    }
}

fn memory_store(schema: Schema) -> Arc<SettingsStore> {
    SettingsStore::load(
        Arc::new(MemoryStorage {
            schema: Mutex::new(schema),
        }),
        platform(Variant::Light),
        StoreOptions::default(),
    )
}

fn file_store(dir: &TempDir, variant: Variant) -> Arc<SettingsStore> {
    SettingsStore::load(
        Arc::new(FileStorage::with_root(dir.path())),
        platform(variant),
        StoreOptions::default(),
    )
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ---------------------------------------------------------------------------
// Scale normalization
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn scale_is_always_positive(raw in -10.0f32..10.0) {
        let store = memory_store(Schema { scale: raw, ..Schema::default() });
        let scale = store.scale();
        if raw > 0.0 {
            prop_assert_eq!(scale, raw);
        } else {
            prop_assert_eq!(scale, 1.0);
        }
        // Raw value untouched
        prop_assert_eq!(store.schema().scale, raw);
    }
}

#[test]
fn test_legacy_auto_scale_on_disk() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("settings.json"), r#"{"scale": -1}"#).unwrap();
    let store = file_store(&dir, Variant::Light);
    assert_eq!(store.scale(), 1.0);
}

// ---------------------------------------------------------------------------
// Theme resolution
// ---------------------------------------------------------------------------

#[test]
fn test_theme_name_selects_variant() {
    for (name, platform_variant, expected) in [
        ("light", Variant::Dark, Variant::Light),
        ("dark", Variant::Light, Variant::Dark),
        ("", Variant::Light, Variant::Light),
        ("", Variant::Dark, Variant::Dark),
        ("solarized", Variant::Dark, Variant::Dark),
    ] {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            format!(r#"{{"theme": "{name}"}}"#),
        )
        .unwrap();
        let store = file_store(&dir, platform_variant);
        store.setup_theme();
        assert_eq!(store.variant(), expected, "theme name {name:?}");
    }
}

#[test]
fn test_env_override_beats_schema() {
    let store = SettingsStore::load(
        Arc::new(MemoryStorage {
            schema: Mutex::new(Schema {
                theme_name: "light".into(),
                ..Schema::default()
            }),
        }),
        Arc::new(FixedPlatform {
            variant: Variant::Light,
            env: Some("dark"),
        }),
        StoreOptions::default(),
    );
    store.setup_theme();
    assert_eq!(store.variant(), Variant::Dark);
}

#[test]
fn test_user_theme_document_is_used() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("theme.json"),
        r##"{"name": "Nord", "colors": {"primary": "#88c0d0"}}"##,
    )
    .unwrap();
    let store = file_store(&dir, Variant::Dark);
    store.setup_theme();
    assert_eq!(store.theme().unwrap().name(), "Nord");
}

#[test]
fn test_invalid_theme_document_falls_back_to_default() {
    for content in ["{ this is not json", r#"{"colors": {"background": "red"}}"#] {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("theme.json"), content).unwrap();
        let store = file_store(&dir, Variant::Dark);
        store.setup_theme();
        assert_eq!(store.theme().unwrap().name(), DefaultTheme::NAME);
    }
}

#[test]
fn test_unreadable_theme_document_falls_back_to_default() {
    let dir = TempDir::new().unwrap();
    // A directory where the file should be: reading it fails with something other than NotFound
    fs::create_dir(dir.path().join("theme.json")).unwrap();
    let store = file_store(&dir, Variant::Dark);
    store.setup_theme();
    assert_eq!(store.theme().unwrap().name(), DefaultTheme::NAME);
}

#[test]
fn test_set_theme_survives_reload_and_setup() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("theme.json"), r#"{"name": "FromDisk"}"#).unwrap();
    let store = file_store(&dir, Variant::Dark);
    store.setup_theme();
    assert_eq!(store.theme().unwrap().name(), "FromDisk");

    let chosen: ThemeHandle = Arc::new(Named("Chosen"));
    store.set_theme(chosen.clone());
    assert!(Arc::ptr_eq(&store.theme().unwrap(), &chosen));

    fs::write(dir.path().join("settings.json"), r#"{"primary_color": "red"}"#).unwrap();
    store.file_changed();
    store.setup_theme();
    assert!(Arc::ptr_eq(&store.theme().unwrap(), &chosen));
    assert_eq!(store.primary_color(), "red");
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[test]
fn test_file_changed_notifies_with_store() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir, Variant::Light);
    let (_, rx) = store.subscribe(1);

    fs::write(dir.path().join("settings.json"), r#"{"no_animations": true}"#).unwrap();
    store.file_changed();

    let notified = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(Arc::ptr_eq(&notified, &store));
    assert!(!notified.show_animations());
}

#[test]
fn test_broken_reload_keeps_current_schema() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("settings.json");
    fs::write(
        &settings,
        r#"{"primary_color": "teal", "scale": 2.0, "no_animations": true}"#,
    )
    .unwrap();
    let store = file_store(&dir, Variant::Light);
    let (_, rx) = store.subscribe(4);

    // Truncated mid-save
    fs::write(&settings, r#"{"primary_color": "te"#).unwrap();
    store.file_changed();
    assert_eq!(store.primary_color(), "teal");
    assert_eq!(store.scale(), 2.0);
    assert!(!store.show_animations());

    // Briefly deleted
    fs::remove_file(&settings).unwrap();
    store.file_changed();
    assert_eq!(store.primary_color(), "teal");

    assert!(rx.try_recv().is_err());

    fs::write(&settings, r#"{"primary_color": "navy"}"#).unwrap();
    store.file_changed();
    assert_eq!(store.primary_color(), "navy");
    assert_eq!(store.scale(), 1.0);
    assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
}

#[test]
fn test_fan_out_does_not_block_on_idle_subscribers() {
    let store = memory_store(Schema::default());
    store.setup_theme();

    // 16 unbuffered subscribers, half of them not receiving yet
    let mut idle = Vec::new();
    let mut active = Vec::new();
    for i in 0..16 {
        let (tx, rx) = bounded(0);
        store.add_change_listener(tx);
        if i % 2 == 0 {
            idle.push(rx);
        } else {
            active.push(rx);
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    let receivers: Vec<_> = active
        .into_iter()
        .map(|rx| {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut got = 0;
                while !stop.load(Ordering::SeqCst) {
                    if rx.recv_timeout(Duration::from_millis(20)).is_ok() {
                        got += 1;
                    }
                }
                got
            })
        })
        .collect();

    let start = Instant::now();
    store.set_theme(Arc::new(Named("A")));
    assert!(start.elapsed() < Duration::from_secs(1));

    // Every idle subscriber still receives the notification once it listens
    for rx in &idle {
        let notified = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(notified.theme().unwrap().name(), "A");
    }

    thread::sleep(Duration::from_millis(100));
    stop.store(true, Ordering::SeqCst);
    for handle in receivers {
        assert!(handle.join().unwrap() >= 1);
    }
}

#[test]
fn test_remove_change_listener() {
    let store = memory_store(Schema::default());
    let (id, rx) = store.subscribe(4);
    assert_eq!(store.listener_count(), 1);

    assert!(store.remove_change_listener(id));
    store.apply();
    assert!(rx.try_recv().is_err());
    assert_eq!(store.listener_count(), 0);
}

#[test]
fn test_dropped_receiver_is_forgotten() {
    let store = memory_store(Schema::default());
    let (_, rx) = store.subscribe(1);
    drop(rx);
    store.apply();
    assert_eq!(store.listener_count(), 0);
}

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

#[test]
fn test_readers_never_see_torn_writes() {
    let store = memory_store(Schema::default());
    let light: ThemeHandle = Arc::new(Named("one"));
    let dark: ThemeHandle = Arc::new(Named("two"));
    store.override_theme(light.clone(), "one");

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut checks = 0u64;
                while !stop.load(Ordering::SeqCst) {
                    let snap = store.snapshot();
                    let theme = snap.theme.expect("theme set before readers start");
                    assert_eq!(theme.name(), snap.primary_color);
                    checks += 1;
                }
                checks
            })
        })
        .collect();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..2_000 {
                if i % 2 == 0 {
                    store.override_theme(dark.clone(), "two");
                } else {
                    store.override_theme(light.clone(), "one");
                }
                store
                    .update_schema(|s| {
                        s.scale = (i % 7 + 1) as f32;
                        s.theme_name = format!("{}", i % 7 + 1);
                    })
                    .unwrap();
            }
        })
    };

    let scale_reader = {
        let store = Arc::clone(&store);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let snap = store.snapshot();
                if !snap.theme_name.is_empty() {
                    assert_eq!(snap.theme_name, format!("{}", snap.scale as u32));
                }
            }
        })
    };

    writer.join().unwrap();
    stop.store(true, Ordering::SeqCst);
    scale_reader.join().unwrap();
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

// ---------------------------------------------------------------------------
// Watching
// ---------------------------------------------------------------------------

#[test]
fn test_watcher_reloads_on_external_edit() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("settings.json");
    fs::write(&settings, "{}").unwrap();

    let store = file_store(&dir, Variant::Light);
    store.setup_theme();
    let (_, rx) = store.subscribe(8);
    store
        .watch(Box::new(PollWatcher::with_interval(Duration::from_millis(10))))
        .unwrap();
    assert!(store.is_watching());

    fs::write(&settings, r#"{"primary_color": "teal", "scale": 1.25}"#).unwrap();

    let notified = rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(wait_until(|| notified.primary_color() == "teal"));
    assert_eq!(store.scale(), 1.25);

    store.unwatch();
    assert!(!store.is_watching());
}

#[test]
fn test_fs_watcher_reloads_on_atomic_save() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("settings.json"), "{}").unwrap();

    let store = file_store(&dir, Variant::Light);
    store.setup_theme();
    let (_, rx) = store.subscribe(8);
    store
        .watch(Box::new(FsWatcher::with_debounce(Duration::from_millis(20))))
        .unwrap();

    // Another process saving through its own store
    let writer = FileStorage::with_root(dir.path());
    writer
        .save(&Schema {
            primary_color: "plum".into(),
            ..Schema::default()
        })
        .unwrap();

    let notified = rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(wait_until(|| notified.primary_color() == "plum"));
    store.unwatch();
}
