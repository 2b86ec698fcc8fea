//! Structured logging module for Talbot
//!
//! Writes logs to ~/Library/Logs/Talbot/ with categories:
//! - GATE: Submission gate decisions (accepted/rejected sends)
//! - CONVERSATION: Session lifecycle (resets, context preservation)
//! - MEMORY: Conversation memory derivation and persistence
//! - PIPELINE: Response pipeline events (crisis branch, fallback, filtering)
//! - STORAGE: Local persistence failures
//! - ERROR: Errors and crashes

use chrono::{Local, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Gate,         // Submission gate accept/reject decisions
    Conversation, // Session lifecycle (reset, keep-context, startup)
    Memory,       // Conversation memory derivation and persistence
    Pipeline,     // Response pipeline branches
    Storage,      // Persistence write/read failures
    Error,        // Errors and crashes
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Gate => "GATE",
            LogCategory::Conversation => "CONVERSATION",
            LogCategory::Memory => "MEMORY",
            LogCategory::Pipeline => "PIPELINE",
            LogCategory::Storage => "STORAGE",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Get the log directory path
fn get_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join("Library/Logs/Talbot")
}

/// Get today's log file path
fn get_log_file_path() -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    get_log_dir().join(format!("talbot-{}.log", today))
}

/// Initialize the logging system - creates log directory if needed
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = get_log_dir();

    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)?;
    }

    log(LogCategory::Conversation, "Talbot logging initialized");

    Ok(())
}

/// Log a message with a category prefix
pub fn log(category: LogCategory, message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let log_line = format!("[{}] [{}] {}\n", timestamp, category.as_str(), message);

    // Always print to console (for dev)
    print!("{}", log_line);

    // Write to file
    let log_path = get_log_file_path();
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let _ = file.write_all(log_line.as_bytes());
    }
}

/// Log a submission gate decision
pub fn log_gate(message: &str) {
    log(LogCategory::Gate, message);
}

/// Log a conversation lifecycle event
pub fn log_conversation(message: &str) {
    log(LogCategory::Conversation, message);
}

/// Log a conversation memory event
pub fn log_memory(message: &str) {
    log(LogCategory::Memory, message);
}

/// Log a response pipeline event
pub fn log_pipeline(message: &str) {
    log(LogCategory::Pipeline, message);
}

/// Log a persistence failure (the in-memory session keeps going)
pub fn log_storage(message: &str) {
    log(LogCategory::Storage, message);
}

/// Log an error
pub fn log_error(message: &str) {
    log(LogCategory::Error, message);
}

/// Clean up old log files (keep last 7 days)
pub fn cleanup_old_logs() -> Result<usize, Box<dyn std::error::Error>> {
    let log_dir = get_log_dir();
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(&log_dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff {
                    if fs::remove_file(&path).is_ok() {
                        deleted += 1;
                    }
                }
            }
        }
    }

    Ok(deleted)
}
