//! Persistence of raw fetched content and of cleaned records.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::cleaner::{OutputFormat, OutputTarget, Record};
use crate::config::raw_dir;
use crate::error::{Result, ScrapeError};

pub trait Persistence: Send + Sync {
    /// Store raw text and return the handle later cleaning tasks read from.
    fn write_text(&self, data: &str) -> Result<PathBuf>;

    fn write_bytes(&self, data: &[u8]) -> Result<PathBuf>;

    fn read_text(&self, path: &Path) -> Result<String>;

    /// Persist one non-empty batch of records of the same type.
    fn save_records(
        &self,
        records: &[Record],
        output: Option<&OutputTarget>,
        format: OutputFormat,
    ) -> Result<()>;
}

/// Filesystem-backed storage rooted at a data directory.
///
/// Raw content goes to `<data_dir>/.raw/<n>`. Records go to
/// `<data_dir>/<output>` or, with no declared output, to a file named
/// after the record type.
///
/// Record writes from concurrent cleaning workers sharing one
/// `FileStorage` are serialised, so a new CSV file gets exactly one header.
/// Separate processes writing the same data directory are not coordinated.
#[derive(Debug)]
pub struct FileStorage {
    data_dir: PathBuf,
    raw_dir: PathBuf,
    next_raw: AtomicU64,
    record_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            raw_dir: raw_dir(&data_dir),
            data_dir,
            next_raw: AtomicU64::new(0),
            record_lock: Mutex::new(()),
        }
    }

    fn next_raw_path(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.raw_dir).map_err(|e| ScrapeError::io(&self.raw_dir, e))?;
        let n = self.next_raw.fetch_add(1, Ordering::Relaxed);
        Ok(self.raw_dir.join(n.to_string()))
    }

    fn destination(&self, first: &Record, output: Option<&OutputTarget>) -> Option<PathBuf> {
        match output {
            Some(OutputTarget::Stdout) => None,
            Some(OutputTarget::File(name)) => Some(self.data_dir.join(name)),
            None => Some(self.data_dir.join(first.kind().name())),
        }
    }
}

impl Persistence for FileStorage {
    fn write_text(&self, data: &str) -> Result<PathBuf> {
        self.write_bytes(data.as_bytes())
    }

    fn write_bytes(&self, data: &[u8]) -> Result<PathBuf> {
        let path = self.next_raw_path()?;
        fs::write(&path, data).map_err(|e| ScrapeError::io(&path, e))?;
        Ok(path)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| ScrapeError::io(path, e))
    }

    fn save_records(
        &self,
        records: &[Record],
        output: Option<&OutputTarget>,
        format: OutputFormat,
    ) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        match self.destination(first, output) {
            None => {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                write_batch(&mut out, records, format, false)?;
                out.flush().map_err(|e| ScrapeError::io("<stdout>", e))
            }
            Some(path) => {
                fs::create_dir_all(&self.data_dir)
                    .map_err(|e| ScrapeError::io(&self.data_dir, e))?;
                // Held from the existence check until the batch is flushed
                let _guard = self.record_lock.lock().unwrap_or_else(PoisonError::into_inner);
                let is_new = !path.exists();
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| ScrapeError::io(&path, e))?;
                write_batch(&mut file, records, format, is_new)?;
                tracing::debug!(path = %path.display(), records = records.len(), %format, "Records saved");
                Ok(())
            }
        }
    }
}

fn write_batch<W: Write>(
    out: &mut W,
    records: &[Record],
    format: OutputFormat,
    with_header: bool,
) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(out);
            if with_header {
                if let Some(first) = records.first() {
                    wtr.write_record(first.header())?;
                }
            }
            for record in records {
                wtr.write_record(record.values())?;
            }
            wtr.flush().map_err(|e| ScrapeError::io("<csv>", e))?;
        }
        OutputFormat::Text => {
            for record in records {
                writeln!(out, "{}", record.to_json_line()?)
                    .map_err(|e| ScrapeError::io("<text>", e))?;
            }
        }
    }
    Ok(())
}
