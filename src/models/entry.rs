//! Represents one child of a listed directory.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::{fs::Metadata, io};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A directory listing entry as returned by `GET /list`.
#[derive(Serialize, Clone, Debug)]
pub struct ListEntry {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Byte size; always 0 for directories.
    pub size: u64,

    pub modified_time: DateTime<Local>,
}

impl ListEntry {
    pub fn from_metadata(name: String, metadata: &Metadata) -> io::Result<Self> {
        let (kind, size) = if metadata.is_dir() {
            (EntryKind::Directory, 0)
        } else {
            (EntryKind::File, metadata.len())
        };

        Ok(Self {
            name,
            kind,
            size,
            modified_time: metadata.modified()?.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn serializes_kind_under_type_key() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"abc").unwrap();
        let metadata = std::fs::metadata(temp.path().join("a.txt")).unwrap();

        let entry = ListEntry::from_metadata("a.txt".into(), &metadata).unwrap();
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["name"], "a.txt");
        assert_eq!(json["type"], "file");
        assert_eq!(json["size"], 3);
        assert!(json["modified_time"].is_string());
    }

    #[test]
    fn directories_report_zero_size() {
        let temp = TempDir::new().unwrap();
        let metadata = std::fs::metadata(temp.path()).unwrap();

        let entry = ListEntry::from_metadata("dir".into(), &metadata).unwrap();

        assert_eq!(entry.kind, EntryKind::Directory);
        assert_eq!(entry.size, 0);
        assert_eq!(serde_json::to_value(entry.kind).unwrap(), "directory");
    }
}
