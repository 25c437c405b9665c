//! Writing the program document to its destination.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

/// Destination write errors.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Fewer bytes reached the destination than were handed over.
    #[error("incomplete write to {}: {written} of {expected} bytes", .path.display())]
    Incomplete {
        path: PathBuf,
        expected: usize,
        written: usize,
    },
    /// The filesystem refused the write.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Something that stores a complete program document.
///
/// Implementations must either store every byte of `payload` or report an
/// error. A partial write never counts as success.
pub trait DocumentWriter {
    fn write(&self, destination: &Path, payload: &[u8]) -> Result<(), WriteError>;
}

/// Replaces the destination file atomically.
///
/// The payload goes to a temporary file next to the destination, which is
/// then renamed over it. Readers see the old document or the new one, never
/// a mix, and a failed run leaves the previous document untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriter;

impl DocumentWriter for FileWriter {
    fn write(&self, destination: &Path, payload: &[u8]) -> Result<(), WriteError> {
        let io_error = |source| WriteError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;

        let written = write_counted(file.as_file_mut(), payload).map_err(io_error)?;
        if written != payload.len() {
            return Err(WriteError::Incomplete {
                path: destination.to_path_buf(),
                expected: payload.len(),
                written,
            });
        }
        file.as_file().sync_all().map_err(io_error)?;
        file.persist(destination)
            .map_err(|err| io_error(err.error))?;

        tracing::debug!(path = %destination.display(), bytes = written, "wrote program document");
        Ok(())
    }
}

/// Writes as much of `payload` as `out` accepts, returning the byte count.
///
/// Stops early if the writer reports no progress.
fn write_counted(out: &mut impl io::Write, payload: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < payload.len() {
        match out.write(&payload[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    out.flush()?;
    Ok(written)
}
