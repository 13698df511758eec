/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Kokopi Logging Module
//!
//! Process-wide logger behind the `log` facade.
//!
//! ## Usage
//!
//! 1. Initialize the logger once at start-up:
//!    ```ignore
//!    kokopi_utils::logging::init_with_format("info", "json")?;
//!    ```
//!
//! 2. Use the macros from the prelude:
//!    ```ignore
//!    use kokopi_utils::logging::prelude::*;
//!    info!("Deploying {} into {}", repo_url, namespace);
//!    ```
//!
//! 3. Update the level at runtime if needed:
//!    ```ignore
//!    kokopi_utils::logging::update_log_level("debug");
//!    ```
//!
//! ## Output
//!
//! Records go to stderr, either as `YYYY-MM-DD HH:MM:SS - LEVEL [target]: message`
//! or as one JSON object per line carrying timestamp, level, target, message,
//! module, file and line.

use log::{LevelFilter, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub use log::{debug, error, info, trace, warn};

static LOGGER: KokopiLogger = KokopiLogger;
static CURRENT_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);
static JSON_FORMAT: AtomicBool = AtomicBool::new(false);
static INIT: OnceCell<Result<(), String>> = OnceCell::new();

/// Logger installed behind the `log` facade
pub struct KokopiLogger;

impl log::Log for KokopiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= current_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if JSON_FORMAT.load(Ordering::Relaxed) {
            eprintln!("{}", json_line(record));
        } else {
            eprintln!(
                "{} - {} [{}]: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

fn json_line(record: &Record) -> serde_json::Value {
    serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "level": record.level().to_string().to_lowercase(),
        "target": record.target(),
        "message": record.args().to_string(),
        "module": record.module_path(),
        "file": record.file(),
        "line": record.line()
    })
}

/// Initializes logging with the given level in text format.
pub fn init(level: &str) -> Result<(), SetLoggerError> {
    init_with_format(level, "text")
}

/// Initializes logging with the given level and format ("text" or "json").
///
/// Installing the logger happens once per process; later calls only adjust the
/// level and format.
pub fn init_with_format(level: &str, format: &str) -> Result<(), SetLoggerError> {
    let level_filter = str_to_level_filter(level);

    let installed = INIT.get_or_init(|| {
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(LevelFilter::Trace))
            .map_err(|e| e.to_string())
    });
    if installed.is_err() {
        // Another logger owns the facade; installing ours again reports the same error.
        log::set_logger(&LOGGER)?;
    }

    JSON_FORMAT.store(format.eq_ignore_ascii_case("json"), Ordering::Relaxed);
    CURRENT_LEVEL.store(level_filter as usize, Ordering::Relaxed);
    log::set_max_level(level_filter);
    Ok(())
}

/// Updates the current log level. Unknown levels fall back to "info".
pub fn update_log_level(level: &str) {
    let new_level = str_to_level_filter(level);
    CURRENT_LEVEL.store(new_level as usize, Ordering::Relaxed);
    log::set_max_level(new_level);
}

/// The level records are currently filtered at
pub fn current_level() -> LevelFilter {
    match CURRENT_LEVEL.load(Ordering::Relaxed) {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn str_to_level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

pub mod prelude {
    pub use log::{debug, error, info, trace, warn};
}
