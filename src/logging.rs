//! env_logger setup writing to stderr and the append-only log file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use log::{LevelFilter, warn};

/// Copies every log line to stderr and, when open, the log file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(buf) {
                // the logger cannot log through itself
                let _ = writeln!(
                    io::stderr(),
                    "WARN: log file write failed: {e}; logging to stderr only"
                );
                self.file = None;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if self.file.as_mut().is_some_and(|file| file.flush().is_err()) {
            self.file = None;
        }
        Ok(())
    }
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global logger. `RUST_LOG` overrides the level chosen here.
pub fn init(verbose: bool, log_file: &Path) {
    let (file, open_error) = match open_log(log_file) {
        Ok(f) => (Some(f), None),
        Err(e) => (None, Some(e)),
    };

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let result = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(Tee { file })))
        .try_init();

    if result.is_err() {
        return;
    }
    if let Some(e) = open_error {
        warn!(
            "cannot open log file {}: {e}; logging to stderr only",
            log_file.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log/webstack.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "previous\n").unwrap();

        let mut tee = Tee {
            file: Some(open_log(&path).unwrap()),
        };
        tee.write_all(b"next\n").unwrap();
        tee.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "previous\nnext\n");
    }

    #[test]
    fn failed_file_write_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webstack.log");
        fs::write(&path, "").unwrap();
        // a read-only handle rejects every write
        let mut tee = Tee {
            file: Some(File::open(&path).unwrap()),
        };
        assert_eq!(tee.write(b"line\n").unwrap(), 5);
        assert!(tee.file.is_none());
        tee.write_all(b"more\n").unwrap();
        tee.flush().unwrap();
    }

    #[test]
    fn unwritable_location_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        assert!(open_log(&blocker.join("webstack.log")).is_err());
    }
}
