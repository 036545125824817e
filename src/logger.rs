//! Structured logging for the launcher stub
//!
//! Stdout belongs to the protected program and to the one-line phase
//! messages, so every log record goes to stderr or to `XLAUNCH_LOG_PATH`.

use chrono::{Local, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;

/// Environment variable selecting the log level (`json:` prefix for JSON lines)
pub const LOG_LEVEL_ENV: &str = "XLAUNCH_LOG_LEVEL";

/// Environment variable naming a file that receives log records
pub const LOG_PATH_ENV: &str = "XLAUNCH_LOG_PATH";

/// Level used when nothing is configured
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// JSON logger implementation
#[derive(Debug)]
pub struct JsonLogger {
    level: Level,
    target_file: Mutex<Option<File>>,
}

impl JsonLogger {
    /// Create a new JSON logger
    pub fn new(level: Level, log_path: Option<String>) -> Self {
        JsonLogger {
            level,
            target_file: Mutex::new(log_path.and_then(open_log_file)),
        }
    }

    /// Initialize the logger from a level string such as `debug` or `json:trace`
    ///
    /// Returns the effective level name.
    pub fn init_with_level(level_str: &str) -> String {
        let log_path = env::var(LOG_PATH_ENV).ok();

        let (use_json, actual_level) = if let Some(stripped) = level_str.strip_prefix("json:") {
            (true, stripped)
        } else if level_str == "json" {
            (true, "info")
        } else {
            (false, level_str)
        };

        if !use_json {
            let mut builder = env_logger::Builder::new();
            builder
                .filter_level(parse_level_filter(actual_level))
                .format(|buf, record| {
                    writeln!(
                        buf,
                        "[{} {} {}] {}",
                        Local::now().format("%Y-%m-%dT%H:%M:%S"),
                        record.level(),
                        record.target(),
                        record.args()
                    )
                });
            if let Some(file) = log_path.and_then(open_log_file) {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            // A second init (tests, embedding) keeps the first logger
            let _ = builder.try_init();
            return actual_level.to_string();
        }

        let level = parse_level_filter(actual_level)
            .to_level()
            .unwrap_or(Level::Error);
        let logger = Box::new(JsonLogger::new(level, log_path));

        if let Err(e) = log::set_boxed_logger(logger) {
            eprintln!("Failed to initialize JSON logger: {e}");
            return actual_level.to_string();
        }

        // "off" still needs a logger installed, but nothing may pass the filter
        if actual_level == "off" {
            log::set_max_level(LevelFilter::Off);
        } else {
            log::set_max_level(level.to_level_filter());
        }
        actual_level.to_string()
    }

    /// Initialize from `XLAUNCH_LOG_LEVEL`, falling back to [`DEFAULT_LOG_LEVEL`]
    pub fn init() -> String {
        let log_level = env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        Self::init_with_level(&log_level)
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut file_guard) = self.target_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let _ = file.write_all(line.as_bytes());
                let _ = file.flush();
                return;
            }
        }
        let _ = io::stderr().write_all(line.as_bytes());
        let _ = io::stderr().flush();
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let log_entry = json!({
            "@timestamp": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "@level": record.level().to_string().to_lowercase(),
            "@message": record.args().to_string(),
            "@module": record.target(),
            "@pid": std::process::id(),
            "@file": record.file().unwrap_or("unknown"),
            "@line": record.line().unwrap_or(0),
        });

        let line = format!(
            "{}\n",
            serde_json::to_string(&log_entry).unwrap_or_default()
        );
        self.write_line(&line);
    }

    fn flush(&self) {
        if let Ok(mut file_guard) = self.target_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let _ = file.flush();
            }
        }
        let _ = io::stderr().flush();
    }
}

fn open_log_file(path: String) -> Option<File> {
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Map a level name to a filter; unknown names fall back to the default
pub fn parse_level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}
