use chrono::Utc;
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::PathBuf,
};

const LOG_DIRECTORY: &str = "output";
const LOG_FILENAME: &str = "forkstar-debug.log";

/// Append a timestamped line to the shared debug log. Errors are reported to stderr only.
pub fn log_debug(message: &str) {
    if let Err(err) = append_line(message) {
        eprintln!("[forkstar::log_util] failed to write debug log: {}", err);
    }
}

fn append_line(message: &str) -> io::Result<()> {
    let path = resolve_log_path()?;
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "[{}] {}", Utc::now().to_rfc3339(), message)?;
    Ok(())
}

fn resolve_log_path() -> io::Result<PathBuf> {
    let dir = PathBuf::from(LOG_DIRECTORY);
    fs::create_dir_all(&dir)?;
    Ok(dir.join(LOG_FILENAME))
}
