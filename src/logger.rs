use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::AppConfig;

static SCROLL_LOGGER: Lazy<ScrollLogger> = Lazy::new(ScrollLogger::new);
static INSTALLED: AtomicBool = AtomicBool::new(false);

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

/// Installs the logger once; later calls only swap the configuration.
pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let level = config.min_level;
    SCROLL_LOGGER.update_config(config);

    if !INSTALLED.swap(true, Ordering::SeqCst) {
        if let Err(e) = log::set_logger(&*SCROLL_LOGGER) {
            INSTALLED.store(false, Ordering::SeqCst);
            return Err(format!("Failed to set logger: {:?}", e));
        }
    }

    log::set_max_level(level.to_level_filter());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }

    fn from_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }

    // `log` orders Error lowest, ours orders it highest.
    fn admits(&self, level: Level) -> bool {
        LogLevel::from_level(level) >= *self
    }
}

/// One emitted line, also the JSON shape written in production mode.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl LogEntry {
    fn from_record(record: &Record) -> Self {
        let location = match (record.file(), record.line()) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            _ => None,
        };
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::from_level(record.level()),
            target: record.target().to_string(),
            message: record.args().to_string(),
            location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_target: bool,
    pub show_file_location: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_file_path: Option<String>,
    /// Only warnings and errors from other crates get through.
    pub quiet_dependencies: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_target: true,
            show_file_location: false,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
            log_file_path: None,
            quiet_dependencies: true,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_file_path = Some(path.to_string());
        self
    }

    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            show_emojis: false,
            output_json: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_file_location: true,
            ..Default::default()
        }
    }

    /// `LOG_FORMAT=json` picks the production layout, `LOG_LEVEL` overrides the level.
    pub fn from_env() -> Self {
        let base = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => Self::production(),
            _ => Self::development(),
        };
        let base = match std::env::var("LOG_FILE") {
            Ok(path) if !path.is_empty() => base.with_file_output(&path),
            _ => base,
        };
        match std::env::var("LOG_LEVEL").ok().and_then(|v| LogLevel::parse(&v)) {
            Some(level) => base.with_level(level),
            None => base,
        }
    }
}

pub struct ScrollLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
}

impl ScrollLogger {
    fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            log_file: Mutex::new(None),
        }
    }

    fn update_config(&self, new_config: LoggerConfig) {
        let file = new_config.log_file_path.as_ref().and_then(|path| {
            OpenOptions::new().create(true).append(true).open(path).ok()
        });
        if let Ok(mut log_file) = self.log_file.lock() {
            *log_file = file;
        }
        if let Ok(mut config) = self.config.lock() {
            *config = new_config;
        }
    }

    fn format_line(entry: &LogEntry, config: &LoggerConfig) -> String {
        if config.output_json {
            return serde_json::to_string(entry).unwrap_or_default();
        }

        let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
        let level = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };

        let mut line = if config.show_colors {
            format!(
                "{} [{}] ",
                timestamp.bright_black(),
                level.color(entry.level.color()).bold()
            )
        } else {
            format!("{} [{}] ", timestamp, level)
        };

        if config.show_target {
            if config.show_colors {
                line.push_str(&format!("{}: ", entry.target.bright_blue()));
            } else {
                line.push_str(&format!("{}: ", entry.target));
            }
        }

        line.push_str(&entry.message);

        if config.show_file_location {
            if let Some(location) = &entry.location {
                if config.show_colors {
                    line.push_str(&format!(" ({})", location.bright_black()));
                } else {
                    line.push_str(&format!(" ({})", location));
                }
            }
        }

        line
    }
}

impl log::Log for ScrollLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let Ok(config) = self.config.lock() else {
            return true;
        };
        if !config.min_level.admits(metadata.level()) {
            return false;
        }
        !(config.quiet_dependencies
            && metadata.level() > Level::Warn
            && !metadata.target().starts_with(env!("CARGO_CRATE_NAME")))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry::from_record(record);
        let Ok(config) = self.config.lock() else {
            return;
        };

        let line = Self::format_line(&entry, &config);
        if entry.level >= LogLevel::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }

        if config.log_file_path.is_some() {
            let plain = LoggerConfig {
                show_colors: false,
                ..config.clone()
            };
            if let Ok(mut file) = self.log_file.lock() {
                if let Some(file) = file.as_mut() {
                    let _ = writeln!(file, "{}", Self::format_line(&entry, &plain));
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        if let Ok(mut file) = self.log_file.lock() {
            if let Some(file) = file.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

/// Logs the elapsed time of a pipeline stage when dropped.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  {} started", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::debug!(
            "⏱️  {} finished in {}ms",
            self.name,
            self.elapsed().as_millis()
        );
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

pub fn log_startup_info(app_name: &str, version: &str, port: u16) {
    log::info!("🚀 Starting {} v{}", app_name, version);
    log::info!("📍 Health check: http://127.0.0.1:{}/api/health", port);
    log::info!("🎨 Image generation: http://127.0.0.1:{}/api/generate-next-image", port);
    log::info!("🔧 Models endpoint: http://127.0.0.1:{}/api/models", port);
}

pub fn log_config_info(config: &AppConfig) {
    let flag = |present: bool| if present { "✅" } else { "❌" };
    log::info!("⚙️  Configuration loaded ({}):", config.environment);
    log::info!("   Canvas: {}x{}", config.image_width, config.image_height);
    log::info!(
        "   Slice: ratio {} (max {}px, max ratio {}), gradient {} up to {}px",
        config.slice.ratio,
        config.slice.max_slice_height,
        config.slice.max_ratio,
        config.slice.gradient_curve.as_str(),
        config.slice.max_gradient_zone
    );
    log::info!(
        "   Timeouts: generation {}ms, text {}ms, download {}ms",
        config.timeouts.generation.as_millis(),
        config.timeouts.text.as_millis(),
        config.timeouts.download.as_millis()
    );
    log::info!("   Replicate: {}", flag(config.replicate.api_token.is_some()));
    log::info!("   Gemini: {}", flag(config.gemini.api_key.is_some()));
    for key in config.missing_credentials() {
        log::warn!("{} is not set; calls to that backend will fail until it is set", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert!(LogLevel::Info.admits(Level::Error));
        assert!(!LogLevel::Info.admits(Level::Debug));
    }

    #[test]
    fn test_logger_config() {
        let config = LoggerConfig::development();
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.show_colors);

        let prod_config = LoggerConfig::production();
        assert!(!prod_config.show_colors);
        assert!(prod_config.output_json);
    }

    #[test]
    fn test_json_line_shape() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Warn,
            target: "dreamscroll::pipeline".to_string(),
            message: "falling back".to_string(),
            location: None,
        };
        let line = ScrollLogger::format_line(&entry, &LoggerConfig::production());
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["message"], "falling back");
        assert!(value.get("location").is_none());
    }

    #[test]
    fn test_logger_initialization_is_repeatable() {
        assert!(init_with_config(LoggerConfig::development()).is_ok());
        assert!(init_with_config(LoggerConfig::production()).is_ok());
    }
}
