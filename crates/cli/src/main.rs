// Prism CLI - inspect, edit and watch presentation settings

mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use prism_config::{
    FileStorage, FsWatcher, PollWatcher, Schema, SettingsError, SettingsSnapshot, SettingsStore,
    Storage, StoreOptions, SystemPlatform, Theme,
};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "Inspect, edit and watch presentation settings")]
#[command(version)]
struct Cli {
    /// Settings directory (defaults to the per-user config directory)
    #[arg(long, global = true, env = "PRISM_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the settings and theme file locations
    Path,

    /// Print the resolved settings
    Show {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Change one setting and save it
    #[command(after_help = "\
Examples:
  prism set theme dark
  prism set scale 1.25
  prism set animations off")]
    Set {
        key: Key,
        value: String,
    },

    /// Print a line every time the settings change on disk
    Watch {
        /// Poll the file at this interval (milliseconds) instead of using file events
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Key {
    Theme,
    Scale,
    PrimaryColor,
    Animations,
    CloudName,
}

/// Write `value` into the schema field named by `key`.
fn apply_setting(schema: &mut Schema, key: Key, value: &str) -> Result<(), String> {
    match key {
        Key::Theme => schema.theme_name = value.to_string(),
        Key::Scale => {
            let scale: f32 = value
                .parse()
                .map_err(|_| format!("invalid scale '{value}'"))?;
            if !scale.is_finite() || scale <= 0.0 {
                return Err(format!("scale must be a positive number, got '{value}'"));
            }
            schema.scale = scale;
        }
        Key::PrimaryColor => schema.primary_color = value.to_string(),
        Key::Animations => {
            schema.disable_animations = match value.to_ascii_lowercase().as_str() {
                "on" | "true" | "yes" => false,
                "off" | "false" | "no" => true,
                _ => return Err(format!("animations must be on or off, got '{value}'")),
            }
        }
        Key::CloudName => schema.cloud_name = value.to_string(),
    }
    Ok(())
}

fn describe(snapshot: &SettingsSnapshot) -> String {
    format!(
        "theme={} variant={} scale={} primary_color={} animations={}",
        snapshot.theme.as_ref().map(|t| t.name()).unwrap_or("-"),
        snapshot.variant,
        snapshot.scale,
        if snapshot.primary_color.is_empty() { "-" } else { snapshot.primary_color.as_str() },
        if snapshot.show_animations { "on" } else { "off" },
    )
}

fn open_store(storage: FileStorage) -> Arc<SettingsStore> {
    let store = SettingsStore::load(
        Arc::new(storage),
        Arc::new(SystemPlatform),
        StoreOptions::default(),
    );
    store.setup_theme();
    store
}

/// File events by default; polling when asked for or when events are unavailable.
fn start_watching(store: &SettingsStore, interval_ms: Option<u64>) -> Result<(), SettingsError> {
    let poll = |ms: u64| Box::new(PollWatcher::with_interval(Duration::from_millis(ms.max(1))));
    match interval_ms {
        Some(ms) => store.watch(poll(ms)),
        None => store.watch(Box::new(FsWatcher::new())).or_else(|e| {
            log::warn!("{e}; falling back to polling");
            store.watch(poll(250))
        }),
    }
}

fn run(cli: Cli) -> u8 {
    let storage = match cli.config_dir {
        Some(dir) => FileStorage::with_root(dir),
        None => FileStorage::new(),
    };

    match cli.command {
        Commands::Path => {
            println!("{}", storage.settings_path().display());
            println!("{}", storage.theme_path().display());
            EXIT_SUCCESS
        }
        Commands::Show { json } => {
            let store = open_store(storage);
            let snapshot = store.snapshot();
            if json {
                let value = serde_json::json!({
                    "theme": snapshot.theme.as_ref().map(|t| t.name().to_string()),
                    "theme_name": snapshot.theme_name,
                    "variant": snapshot.variant,
                    "scale": snapshot.scale,
                    "primary_color": snapshot.primary_color,
                    "show_animations": snapshot.show_animations,
                    "build": store.build_type().as_str(),
                });
                match serde_json::to_string_pretty(&value) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("Error: {e}");
                        return EXIT_ERROR;
                    }
                }
            } else {
                println!("{}", describe(&snapshot));
            }
            EXIT_SUCCESS
        }
        Commands::Set { key, value } => {
            let store = open_store(storage);
            let mut candidate = store.schema();
            if let Err(msg) = apply_setting(&mut candidate, key, &value) {
                eprintln!("Error: {msg}");
                return EXIT_USAGE;
            }
            if let Err(e) = store.update_schema(|schema| *schema = candidate) {
                eprintln!("Error: {e}");
                return EXIT_ERROR;
            }
            println!("{}", describe(&store.snapshot()));
            EXIT_SUCCESS
        }
        Commands::Watch { interval_ms } => {
            let store = open_store(storage);
            let (_id, changes) = store.subscribe(1);
            if let Err(e) = start_watching(&store, interval_ms) {
                eprintln!("Error: {e}");
                return EXIT_ERROR;
            }
            log::info!("Watching {}", store.storage().settings_path().display());
            println!("{}", describe(&store.snapshot()));
            while let Ok(changed) = changes.recv() {
                println!("{}", describe(&changed.snapshot()));
            }
            EXIT_SUCCESS
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    ExitCode::from(run(Cli::parse()))
}
