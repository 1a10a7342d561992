use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Bundled `logging.json` written on first run.
pub(crate) const DEFAULT_LOGGING_CONFIG: &str = include_str!("../../resources/logging.json");

/// Writes `contents` to `path` unless a file already exists there.
///
/// The payload is flushed and fsync'd into a sibling temporary file that is
/// then persisted without clobbering, so a concurrent writer or an existing
/// file always wins. Returns whether this call created the file.
pub(super) fn write_if_absent(path: &Path, contents: &[u8]) -> io::Result<bool> {
    if path.try_exists()? {
        return Ok(false);
    }
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("kino"),
    );
    builder.suffix(".tmp");

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    match file.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(error) if error.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(error) => Err(error.error),
    }
}
