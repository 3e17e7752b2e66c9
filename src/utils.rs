use indicatif::{ProgressBar, ProgressStyle};
use log::error;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::types::ProcessingStats;

/// Parse the content of an export file into JSON documents.
///
/// A file holding one JSON value is taken as a whole (an array is a batch of
/// records). Anything else is read as newline-delimited JSON; lines that fail
/// to parse are logged, counted and skipped.
pub fn parse_json_documents(content: &str, stats: &mut ProcessingStats) -> Vec<Value> {
    if let Ok(document) = serde_json::from_str::<Value>(content) {
        return match document {
            Value::Array(items) => items,
            other => vec![other],
        };
    }

    let mut documents = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(document) => documents.push(document),
            Err(e) => {
                error!("Failed to parse JSON (line {}): {}", index + 1, e);
                stats.increment_skipped_malformed();
            }
        }
    }
    documents
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Make sure the directory a file is written into exists
pub fn create_parent_directory(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

// Copies every log line to stderr and to the log file
struct TeeWriter {
    file: Arc<Mutex<File>>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Ok(mut file) = self.file.lock() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Ok(mut file) = self.file.lock() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Initialize the logger. With `log_dir`, lines also go to
/// `<log_dir>/<mode>_processing_<timestamp>.log`.
pub fn init_logging(log_dir: Option<&Path>, mode: &str) -> io::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(dir) = log_dir {
        fs::create_dir_all(dir)?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_processing_{}.log", mode, timestamp));
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter {
            file: Arc::new(Mutex::new(file)),
        })));
    }

    builder.init();
    Ok(())
}
