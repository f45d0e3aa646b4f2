use crate::{ensure_parent, StorageError};
use std::path::Path;

/// Written in place of an absent value.
pub const NULL_MARKER: &str = "n/a";

/// Write a header and rows as a delimited file, creating parent directories.
pub fn write_delimited<I, R>(
    path: &Path,
    delimiter: u8,
    header: &[&str],
    rows: I,
) -> Result<(), StorageError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|err| StorageError::csv(path, err))?;
    writer
        .write_record(header)
        .map_err(|err| StorageError::csv(path, err))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|err| StorageError::csv(path, err))?;
    }
    writer.flush().map_err(|err| StorageError::io(path, err))
}

pub(crate) fn column(
    path: &Path,
    headers: &csv::StringRecord,
    name: &str,
) -> Result<usize, StorageError> {
    headers
        .iter()
        .position(|header| header.trim() == name)
        .ok_or_else(|| StorageError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
}

pub(crate) fn nullable(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value == NULL_MARKER {
        None
    } else {
        Some(value)
    }
}
