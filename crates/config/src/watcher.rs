//! Settings file watching.
//!
//! The store only needs "tell me when this file changes"; how that happens is
//! up to the [`Watcher`] implementation. [`FsWatcher`] uses OS file events via
//! `notify`. [`PollWatcher`] works everywhere by polling the file's metadata.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::{unbounded, RecvTimeoutError};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};

use crate::error::SettingsError;

/// Invoked from the watcher's own thread on every detected change.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync + 'static>;

pub trait Watcher: Send {
    /// Begin watching `path`. Restarting replaces the previous watch.
    fn start(&mut self, path: &Path, on_change: ChangeCallback) -> Result<(), SettingsError>;

    /// Stop watching. No callback runs after this returns (except from the
    /// watcher's own thread, if `stop` is called from inside a callback).
    fn stop(&mut self);
}

fn join_unless_current(handle: JoinHandle<()>) {
    // A callback dropping the last store reference lands here on the watch thread
    if handle.thread().id() != thread::current().id() {
        let _ = handle.join();
    }
}

/// Watches the settings file through OS file events.
///
/// The parent directory is watched so atomic saves (write temp, rename) and a
/// file created after start are seen. Bursts of events within the debounce
/// window collapse into one callback, fired once the file has been quiet.
pub struct FsWatcher {
    debounce: Duration,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl FsWatcher {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

    /// How often the event thread checks its stop flag.
    const TICK: Duration = Duration::from_millis(50);

    pub fn new() -> Self {
        Self::with_debounce(Self::DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            watcher: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Default for FsWatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn touches(event: &notify::Event, name: &OsString) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(name.as_os_str()))
}

impl Watcher for FsWatcher {
    fn start(&mut self, path: &Path, on_change: ChangeCallback) -> Result<(), SettingsError> {
        self.stop();

        let name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| SettingsError::Watch(format!("not a file path: {}", path.display())))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = event_tx.send(res);
        })
        .map_err(|e| SettingsError::Watch(e.to_string()))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| SettingsError::Watch(format!("{}: {e}", dir.display())))?;

        let stop = Arc::new(AtomicBool::new(false));
        self.stop = Arc::clone(&stop);
        let debounce = self.debounce;
        let shown = path.to_path_buf();

        let handle = thread::Builder::new()
            .name("prism-settings-watch".into())
            .spawn(move || {
                let mut due: Option<Instant> = None;
                while !stop.load(Ordering::Relaxed) {
                    match event_rx.recv_timeout(Self::TICK) {
                        Ok(Ok(event)) => {
                            if touches(&event, &name) {
                                due = Some(Instant::now() + debounce);
                            }
                        }
                        Ok(Err(e)) => log::warn!("Watch error on {}: {}", shown.display(), e),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    if due.is_some_and(|at| Instant::now() >= at) {
                        due = None;
                        log::debug!("Settings file changed: {}", shown.display());
                        on_change();
                    }
                }
            })
            .map_err(|e| SettingsError::Watch(e.to_string()))?;

        self.watcher = Some(watcher);
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.watcher = None;
        if let Some(handle) = self.handle.take() {
            join_unless_current(handle);
        }
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Identity of the file contents as far as polling can tell.
type Fingerprint = Option<(SystemTime, u64)>;

fn fingerprint(path: &Path) -> Fingerprint {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// Polls the file's mtime and size on a background thread.
pub struct PollWatcher {
    interval: Duration,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollWatcher {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

    pub fn new() -> Self {
        Self::with_interval(Self::DEFAULT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Default for PollWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Watcher for PollWatcher {
    fn start(&mut self, path: &Path, on_change: ChangeCallback) -> Result<(), SettingsError> {
        self.stop();

        let stop = Arc::new(AtomicBool::new(false));
        self.stop = Arc::clone(&stop);
        let path: PathBuf = path.to_path_buf();
        let interval = self.interval;
        let mut last = fingerprint(&path);

        let handle = thread::Builder::new()
            .name("prism-settings-watch".into())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let current = fingerprint(&path);
                    if current != last {
                        last = current;
                        log::debug!("Settings file changed: {}", path.display());
                        on_change();
                    }
                }
            })
            .map_err(|e| SettingsError::Watch(e.to_string()))?;

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            join_unless_current(handle);
        }
    }
}

impl Drop for PollWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
