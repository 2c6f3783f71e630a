//! Session logger: routes `tracing` output to a single file in the OS data
//! directory.
//!
//! The file is **truncated (overwritten) at each launch**, so it only ever
//! contains output from the most-recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\RasterPad\rasterpad.log`
//!   Linux:    `~/.local/share/rasterpad/rasterpad.log`
//!   macOS:    `~/Library/Application Support/RasterPad/rasterpad.log`
//!
//! Library code only emits `tracing` events; nothing requires [`init`] to have
//! run. A panic hook mirrors panic messages into the same file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::EnvFilter;

static PANIC_SINK: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Initialise session logging at the default location.
///
/// With `debug` the level is `debug` and `RUST_LOG` may override it;
/// otherwise the level is fixed at `info`.
pub fn init(debug: bool) -> Option<PathBuf> {
    init_at(&log_file_path(), debug)
}

/// Like [`init`] but logging to `path`. Returns the path on success; when the
/// file cannot be opened logging falls back to stderr and `None` is returned.
pub fn init_at(path: &Path, debug: bool) -> Option<PathBuf> {
    let level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    // Truncate whatever the previous session left behind.
    let opened = OpenOptions::new().create(true).write(true).truncate(true).open(path);
    let mut file = match opened {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
            return None;
        }
    };

    let _ = writeln!(file, "=== rasterpad session started (unix {}) ===", unix_seconds());
    let _ = writeln!(file, "Log file: {}", path.display());

    if let Ok(sink) = file.try_clone() {
        let _ = PANIC_SINK.set(Mutex::new(sink));
        install_panic_hook();
    }
    let _ = LOG_PATH.set(path.to_path_buf());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Some(path.to_path_buf())
}

/// Mirror panic info to the log, then run the previous handler.
fn install_panic_hook() {
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(mutex) = PANIC_SINK.get()
            && let Ok(mut file) = mutex.lock()
        {
            let _ = writeln!(file, "[unix {}] [PANIC] {}", unix_seconds(), info);
        }
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    let base = data_dir();
    #[cfg(any(target_os = "windows", target_os = "macos"))]
    {
        base.join("RasterPad").join("rasterpad.log")
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        base.join("rasterpad").join("rasterpad.log")
    }
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
