//! dfdl Logging System
//!
//! Provides structured logging with a system information header, plus the
//! per-run build log that ends up inside the assembled tree.

use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, OnceLock};

static LOGGER: OnceLock<Arc<Mutex<DfdlLogger>>> = OnceLock::new();

// ============================================================================
// System Information Detection
// ============================================================================

#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub app_version: String,
    pub os: String,
    pub arch: String,
    pub distro: String,
    pub kernel: String,
}

impl SystemInfo {
    pub fn detect() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            distro: detect_distro(),
            kernel: detect_kernel(),
        }
    }

    pub fn to_log_header(&self) -> String {
        format!(
r#"================================================================================
dfdl Log - {}
================================================================================
Application:   dfdl v{}
System Info:
  OS:          {} ({})
  Distro:      {}
  Kernel:      {}
================================================================================
"#,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.app_version,
            self.os,
            self.arch,
            self.distro,
            self.kernel,
        )
    }

    /// One-line summary used in the build log header
    pub fn summary(&self) -> String {
        format!("{} {} ({}, kernel {})", self.os, self.arch, self.distro, self.kernel)
    }
}

fn detect_distro() -> String {
    if let Ok(file) = File::open("/etc/os-release") {
        let reader = BufReader::new(file);
        for line in reader.lines().map_while(Result::ok) {
            if line.starts_with("PRETTY_NAME=") {
                return line
                    .trim_start_matches("PRETTY_NAME=")
                    .trim_matches('"')
                    .to_string();
            }
        }
    }

    if let Ok(output) = Command::new("sw_vers").arg("-productVersion").output() {
        if output.status.success() {
            return format!("macOS {}", String::from_utf8_lossy(&output.stdout).trim());
        }
    }

    "Unknown".to_string()
}

fn detect_kernel() -> String {
    if let Ok(output) = Command::new("uname").arg("-r").output() {
        if output.status.success() {
            return String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
    }
    "Unknown".to_string()
}

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Info,
    Action, // User answers to prompts
    Download,
    Install,
    Warning,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Action => "[ACTION]",
            LogLevel::Download => "[DOWNLOAD]",
            LogLevel::Install => "[INSTALL]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

// ============================================================================
// dfdl Logger
// ============================================================================

pub struct DfdlLogger {
    log_file: Option<File>,
    echo: bool,
}

impl DfdlLogger {
    pub fn new() -> Self {
        let log_dir = crate::dfdl_path!("logs");
        let _ = fs::create_dir_all(&log_dir);

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("dfdl_{}.log", timestamp));

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok();

        let mut logger = Self { log_file, echo: true };

        let header = SystemInfo::detect().to_log_header();
        logger.write_raw(&header);

        logger
    }

    /// Logger without a backing file, used by unit tests
    pub fn console_only() -> Self {
        Self {
            log_file: None,
            echo: !cfg!(test),
        }
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.log_file {
            let _ = writeln!(file, "{}", msg);
            let _ = file.flush();
        }

        if self.echo {
            println!("{}", msg);
        }
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        let formatted = format!("[{}] {} {}", timestamp, level.prefix(), message);
        self.write_raw(&formatted);
    }
}

impl Default for DfdlLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Global Logger Access
// ============================================================================

/// Initialize the global logger (call once at startup)
pub fn init_logger() {
    LOGGER.get_or_init(|| Arc::new(Mutex::new(DfdlLogger::new())));
}

fn logger() -> Arc<Mutex<DfdlLogger>> {
    LOGGER
        .get_or_init(|| {
            let logger = if cfg!(test) {
                DfdlLogger::console_only()
            } else {
                DfdlLogger::new()
            };
            Arc::new(Mutex::new(logger))
        })
        .clone()
}

// ============================================================================
// Convenience Logging Functions
// ============================================================================

pub fn log_info(message: &str) {
    logger().lock().log(LogLevel::Info, message);
}

pub fn log_action(message: &str) {
    logger().lock().log(LogLevel::Action, message);
}

pub fn log_download(message: &str) {
    logger().lock().log(LogLevel::Download, message);
}

pub fn log_install(message: &str) {
    logger().lock().log(LogLevel::Install, message);
}

pub fn log_warning(message: &str) {
    logger().lock().log(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    logger().lock().log(LogLevel::Error, message);
}

// ============================================================================
// Build Log
// ============================================================================

/// File name of the build log inside the assembled tree
pub const BUILD_LOG_NAME: &str = "dfdl_build.txt";

/// Timestamped audit trail of one run.
///
/// Every entry is mirrored to the global logger; the rendered text is written
/// next to the assembled game so a partial assembly can be audited later.
#[derive(Debug, Clone)]
pub struct BuildLog {
    text: String,
}

impl BuildLog {
    pub fn new() -> Self {
        let info = SystemInfo::detect();
        let mut text = format!(
            "Build started at {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        text.push_str(&format!("System: {}\n", info.summary()));
        text.push_str(&format!("dfdl: v{}\n\n", info.app_version));
        Self { text }
    }

    /// Append a timestamped entry
    pub fn add(&mut self, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.text.push_str(&format!("[{}] {}\n", timestamp, message));
        log_info(message);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.text.lines().filter(|l| l.starts_with('['))
    }

    pub fn write_to(&self, dir: &Path) -> std::io::Result<()> {
        fs::write(dir.join(BUILD_LOG_NAME), &self.text)
    }
}

impl Default for BuildLog {
    fn default() -> Self {
        Self::new()
    }
}
