//! Represents a file written by an upload.

use std::path::PathBuf;

/// A file placed beneath the storage root.
///
/// `filename` may differ from the requested name when a collision suffix
/// was needed.
#[derive(Clone, Debug)]
pub struct StoredObject {
    /// Final filename on disk.
    pub filename: String,

    /// Slash-separated path relative to the storage root, including the filename.
    pub relative_path: String,

    /// Absolute location on disk.
    pub path: PathBuf,

    /// Size in bytes.
    pub size: u64,
}
