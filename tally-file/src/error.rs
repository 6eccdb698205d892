use thiserror::Error;

/// Errors that can occur when reading or writing the document file.
///
/// [`DurableStore`](crate::DurableStore) never returns these to callers: a
/// failed read means "start from defaults" and a failed write is logged.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file could not be read, written or renamed.
    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file contents are not a valid document.
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl DocumentError {
    /// Whether the file simply does not exist yet.
    pub fn is_missing(&self) -> bool {
        matches!(self, DocumentError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
