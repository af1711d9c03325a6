//! Temp-file-then-rename CSV output.
//!
//! Rows go to a temporary file next to the destination. `commit()` renames it
//! over the destination; dropping an uncommitted file deletes the temp file,
//! so a failed export never leaves a half-written CSV behind.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::Writer;
use tempfile::NamedTempFile;

use crate::error::AppError;

pub struct AtomicCsvFile {
    writer: Writer<BufWriter<NamedTempFile>>,
    final_path: PathBuf,
    rows: usize,
}

impl AtomicCsvFile {
    /// Opens a temp file in the destination's directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ExportFailed` if the path has no parent directory or
    /// the temp file cannot be created there.
    pub fn create(final_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let final_path = final_path.as_ref().to_path_buf();

        let parent = match final_path.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => {
                return Err(AppError::ExportFailed(format!(
                    "No parent directory for {}",
                    final_path.display()
                )))
            }
        };

        let temp = NamedTempFile::new_in(parent)
            .map_err(|e| AppError::ExportFailed(format!("Failed to create temp file: {}", e)))?;

        Ok(Self {
            writer: Writer::from_writer(BufWriter::new(temp)),
            final_path,
            rows: 0,
        })
    }

    /// Writes one record. The header counts as a row.
    pub fn write_row<I, T>(&mut self, record: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(record)
            .map_err(|e| AppError::ExportFailed(format!("Failed to write row: {}", e)))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Flushes and renames the temp file over the destination.
    pub fn commit(self) -> Result<PathBuf, AppError> {
        let buffered = self.writer.into_inner().map_err(|e| {
            AppError::ExportFailed(format!("Failed to flush CSV writer: {}", e.error()))
        })?;
        let temp = buffered
            .into_inner()
            .map_err(|e| AppError::ExportFailed(format!("Failed to flush buffer: {}", e.error())))?;

        temp.persist(&self.final_path).map_err(|e| {
            AppError::ExportFailed(format!(
                "Failed to persist {}: {}",
                self.final_path.display(),
                e.error
            ))
        })?;

        Ok(self.final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dir_entries(dir: &Path) -> usize {
        fs::read_dir(dir).expect("read dir").count()
    }

    #[test]
    fn commit_replaces_existing_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("results.csv");
        fs::write(&path, "stale").expect("seed file");

        let mut file = AtomicCsvFile::create(&path).expect("create");
        file.write_row(["index", "status"]).expect("header");
        file.write_row(["1", "success"]).expect("row");
        assert_eq!(file.rows_written(), 2);

        let written = file.commit().expect("commit");
        assert_eq!(written, path);

        let content = fs::read_to_string(&path).expect("read back");
        assert_eq!(content, "index,status\n1,success\n");
        assert_eq!(dir_entries(dir.path()), 1);
    }

    #[test]
    fn dropped_file_leaves_nothing_behind() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("results.csv");

        {
            let mut file = AtomicCsvFile::create(&path).expect("create");
            file.write_row(["only", "partial"]).expect("row");
        }

        assert!(!path.exists());
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn missing_directory_is_an_export_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nope").join("results.csv");
        assert!(matches!(
            AtomicCsvFile::create(&path),
            Err(AppError::ExportFailed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn root_has_no_parent() {
        assert!(matches!(
            AtomicCsvFile::create("/"),
            Err(AppError::ExportFailed(_))
        ));
    }
}
