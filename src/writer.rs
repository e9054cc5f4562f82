use crate::store::PageRecord;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write all records as a pretty-printed JSON array (two-space indent),
/// truncating any existing file at `path`.
pub fn save_snapshot(path: impl AsRef<Path>, records: &[PageRecord]) -> Result<(), SnapshotError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::with_capacity(8192, file);

    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    writer.flush()?;

    log::debug!(
        "Wrote {} records to {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Read a snapshot written by [`save_snapshot`]
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Vec<PageRecord>, SnapshotError> {
    let file = File::open(path)?;
    let records = serde_json::from_reader(BufReader::new(file))?;
    Ok(records)
}
