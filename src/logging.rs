//! Logger setup
//!
//! Lines look like `[2026-01-01 12:00:00.000] [INFO] [studio_engine::midi] message`
//! and go to stderr, plus a log file when enabled.

use env_logger::{Builder, Env, Target};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::config::LoggingConfig;

/// Copies every line to stderr and a file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn builder(config: &LoggingConfig) -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or(config.level.as_str()));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder
}

/// Install the global logger. Calling it again is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let mut builder = builder(config);

    let mut file_error = None;
    if config.log_to_file {
        if let Some(path) = config.file_path() {
            match open_log_file(&path) {
                Ok(file) => {
                    builder.target(Target::Pipe(Box::new(Tee { file })));
                }
                Err(e) => file_error = Some((path, e)),
            }
        }
    }

    if builder.try_init().is_err() {
        return;
    }
    if let Some((path, e)) = file_error {
        log::warn!("Could not open log file {}: {}", path.display(), e);
    }
    log::info!("Logging initialized");
}
