//! src/services/storage_service.rs
//!
//! StorageService — the path resolver and store behind the HTTP gateway.
//! It maps untrusted relative paths and upload filenames onto locations
//! beneath a single storage root, and maps retrieval paths back again. There
//! is no metadata database and no in-memory index: the directory tree under
//! `root` is the only state.

use crate::models::{entry::ListEntry, object::StoredObject};
use chrono::Local;
use std::{
    collections::BTreeSet,
    fs::Metadata,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file name cannot be empty")]
    EmptyFilename,
    #[error("file type of `{filename}` is not supported, allowed types: {allowed}")]
    InvalidFileType { filename: String, allowed: String },
    #[error("path cannot be empty")]
    EmptyPath,
    #[error("invalid path `{0}`")]
    InvalidPath(String),
    #[error("path `{0}` does not exist")]
    PathNotFound(String),
    #[error("file `{0}` does not exist")]
    FileNotFound(String),
    #[error("no free name left for `{0}`")]
    CollisionExhausted(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Extensions accepted when no explicit list is configured.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 12] = [
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "xls", "xlsx", "zip", "rar",
];

/// Exclusive-create attempts in `place` before giving up.
const MAX_PLACE_ATTEMPTS: usize = 8;
const COLLISION_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const COLLISION_TOKEN_LEN: usize = 8;

/// An opened stored object, ready to be streamed back to a client.
#[derive(Debug)]
pub struct ObjectHandle {
    pub path: PathBuf,
    pub metadata: Metadata,
    pub file: File,
}

/// StorageService provides the gateway's filesystem operations:
/// - resolve a caller-supplied directory (creating it on demand)
/// - derive a sanitized filename with an allowed extension
/// - place bytes on disk without overwriting an existing file
/// - list a directory and open a stored file for reading
///
/// Cloning is cheap; the extension set is shared.
#[derive(Clone, Debug)]
pub struct StorageService {
    /// Canonical storage root. Every path handed out lives beneath it.
    root: PathBuf,

    /// Lowercase extensions (without the dot) accepted on upload.
    allowed_extensions: Arc<BTreeSet<String>>,
}

impl StorageService {
    /// Create the storage root if needed and bind a service to its
    /// canonical form.
    pub async fn new<I, S>(root: impl AsRef<Path>, allowed_extensions: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;

        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self {
            root,
            allowed_extensions: Arc::new(allowed_extensions),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn allowed_extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed_extensions.iter().map(String::as_str)
    }

    /// Reject canonical paths that escaped the root (e.g. through a symlink).
    ///
    /// `Path::starts_with` compares whole components, so `/srv/files-old`
    /// is not considered inside `/srv/files`.
    fn ensure_within_root(&self, canonical: &Path, requested: &str) -> StorageResult<()> {
        if canonical.starts_with(&self.root) {
            Ok(())
        } else {
            Err(StorageError::InvalidPath(requested.to_string()))
        }
    }

    /// Resolve `relative` to a directory under the root, creating any
    /// missing directories one segment at a time.
    ///
    /// Each created segment is canonicalized and checked before the next
    /// one is created, so a symlinked segment pointing outside the root is
    /// rejected before anything is written outside it.
    pub async fn resolve_directory(&self, relative: &str) -> StorageResult<PathBuf> {
        let segments = split_segments(relative)?;

        let mut current = self.root.clone();
        for segment in segments {
            let next = current.join(segment);
            match fs::create_dir(&next).await {
                Ok(()) => debug!("created directory {}", next.display()),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => return Err(StorageError::Io(err)),
            }

            current = fs::canonicalize(&next).await?;
            self.ensure_within_root(&current, relative)?;

            if !fs::metadata(&current).await?.is_dir() {
                return Err(StorageError::Io(io::Error::new(
                    ErrorKind::NotADirectory,
                    format!("`{}` exists and is not a directory", segment),
                )));
            }
        }

        Ok(current)
    }

    /// Derive the stored filename for an upload.
    ///
    /// With a non-blank `custom` name the result is
    /// `<sanitized custom>.<lowercase original extension>`; otherwise the
    /// original stem is sanitized and its extension kept as given.
    pub fn resolve_filename(&self, original: &str, custom: Option<&str>) -> StorageResult<String> {
        if original.is_empty() {
            return Err(StorageError::EmptyFilename);
        }

        let (stem, extension) = match original.rsplit_once('.') {
            Some((stem, ext)) if !ext.is_empty() => (stem, ext),
            _ => return Err(self.invalid_file_type(original)),
        };
        let normalized_ext = extension.to_lowercase();
        if !self.allowed_extensions.contains(&normalized_ext) {
            return Err(self.invalid_file_type(original));
        }

        let (base, extension) = match custom.map(str::trim).filter(|c| !c.is_empty()) {
            Some(custom) => (sanitize_component(custom), normalized_ext.as_str()),
            None => (sanitize_component(stem), extension),
        };
        if base.is_empty() {
            return Err(StorageError::EmptyFilename);
        }

        Ok(format!("{}.{}", base, extension))
    }

    fn invalid_file_type(&self, filename: &str) -> StorageError {
        StorageError::InvalidFileType {
            filename: filename.to_string(),
            allowed: self
                .allowed_extensions
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Write `content` into `directory` under `filename`, never replacing an
    /// existing file.
    ///
    /// - Uses exclusive creation, so the existence check and the create are
    ///   one filesystem call.
    /// - On collision retries as `name_YYYYMMDD_HHMMSS.ext`, then adds a
    ///   random token for further collisions in the same second.
    /// - Flushes and fsyncs; removes the partial file if the write fails.
    pub async fn place(
        &self,
        directory: &Path,
        filename: &str,
        content: &[u8],
    ) -> StorageResult<StoredObject> {
        self.place_within(directory, filename, content, MAX_PLACE_ATTEMPTS)
            .await
    }

    async fn place_within(
        &self,
        directory: &Path,
        filename: &str,
        content: &[u8],
        max_attempts: usize,
    ) -> StorageResult<StoredObject> {
        let relative_dir = directory
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath(directory.display().to_string()))?
            .to_path_buf();

        let stamp = Local::now().format(COLLISION_TIMESTAMP_FORMAT).to_string();

        for attempt in 0..max_attempts {
            let candidate = match attempt {
                0 => filename.to_string(),
                1 => suffixed_name(filename, &stamp, None),
                _ => {
                    let token = Uuid::new_v4().simple().to_string();
                    suffixed_name(filename, &stamp, Some(&token[..COLLISION_TOKEN_LEN]))
                }
            };
            let path = directory.join(&candidate);

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} already exists, trying another name", path.display());
                    continue;
                }
                Err(err) => return Err(StorageError::Io(err)),
            };

            if let Err(err) = write_synced(&mut file, content).await {
                drop(file);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    debug!("failed to remove partial file {}: {}", path.display(), cleanup);
                }
                return Err(StorageError::Io(err));
            }

            let relative_path = relative_dir
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .chain(std::iter::once(candidate.as_str().into()))
                .collect::<Vec<_>>()
                .join("/");

            return Ok(StoredObject {
                filename: candidate,
                relative_path,
                path,
                size: content.len() as u64,
            });
        }

        Err(StorageError::CollisionExhausted(filename.to_string()))
    }

    /// Validate the filename, resolve the directory and place the bytes.
    ///
    /// The filename is checked first so a rejected upload creates nothing.
    pub async fn store_upload(
        &self,
        relative_dir: &str,
        original_name: &str,
        custom_name: Option<&str>,
        content: &[u8],
    ) -> StorageResult<StoredObject> {
        let filename = self.resolve_filename(original_name, custom_name)?;
        let directory = self.resolve_directory(relative_dir).await?;
        self.place(&directory, &filename, content).await
    }

    /// Create `relative` (and its ancestors). Returns the normalized
    /// relative path and the absolute directory.
    pub async fn create_folder(&self, relative: &str) -> StorageResult<(String, PathBuf)> {
        let normalized = split_segments(relative)?.join("/");
        if normalized.is_empty() {
            return Err(StorageError::EmptyPath);
        }

        let full_path = self.resolve_directory(&normalized).await?;
        Ok((normalized, full_path))
    }

    /// List the immediate children of `relative`, sorted by name.
    pub async fn list(&self, relative: &str) -> StorageResult<Vec<ListEntry>> {
        let mut target = self.root.clone();
        target.extend(split_segments(relative)?);

        let canonical = fs::canonicalize(&target).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::PathNotFound(relative.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;
        self.ensure_within_root(&canonical, relative)?;

        let mut reader = fs::read_dir(&canonical).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            // Links are followed only when they resolve inside the root;
            // otherwise the link itself is described, not its target.
            let metadata = match fs::canonicalize(entry.path()).await {
                Ok(target) if target.starts_with(&self.root) => fs::metadata(&target).await?,
                Ok(_) => entry.metadata().await?,
                Err(err) if err.kind() == ErrorKind::NotFound => entry.metadata().await?,
                Err(err) => return Err(StorageError::Io(err)),
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(ListEntry::from_metadata(name, &metadata)?);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Open a stored file for reading.
    ///
    /// `..` anywhere and a leading `/` are refused before touching the
    /// filesystem; the canonical target must also stay under the root.
    pub async fn open(&self, relative: &str) -> StorageResult<ObjectHandle> {
        if relative.contains("..") || relative.starts_with('/') {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }

        let not_found = |err: io::Error| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::FileNotFound(relative.to_string())
            } else {
                StorageError::Io(err)
            }
        };

        let path = fs::canonicalize(self.root.join(relative))
            .await
            .map_err(not_found)?;
        self.ensure_within_root(&path, relative)?;

        let metadata = fs::metadata(&path).await.map_err(not_found)?;
        if !metadata.is_file() {
            return Err(StorageError::FileNotFound(relative.to_string()));
        }
        let file = File::open(&path).await.map_err(not_found)?;

        Ok(ObjectHandle {
            path,
            metadata,
            file,
        })
    }

    /// Write, read back and remove a scratch file under the root.
    pub async fn probe(&self) -> StorageResult<()> {
        const PAYLOAD: &[u8] = b"readyz";

        let tmp_path = self.root.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, PAYLOAD).await?;

        let read_back = fs::read(&tmp_path).await;
        let removed = fs::remove_file(&tmp_path).await;

        if read_back? != PAYLOAD {
            return Err(StorageError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "file content mismatch",
            )));
        }
        removed?;
        Ok(())
    }
}

async fn write_synced(file: &mut File, content: &[u8]) -> io::Result<()> {
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Split a caller-supplied relative path into directory segments.
///
/// Leading/trailing slashes, empty segments and `.` are dropped. Segments
/// containing `..` (which `open` would refuse later), backslashes or control
/// characters are refused.
fn split_segments(relative: &str) -> StorageResult<Vec<&str>> {
    let mut segments = Vec::new();
    for segment in relative.trim_matches('/').split('/') {
        match segment {
            "" | "." => continue,
            _ if segment.contains("..")
                || segment.chars().any(|c| c == '\\' || c.is_control()) =>
            {
                return Err(StorageError::InvalidPath(relative.to_string()));
            }
            _ => segments.push(segment),
        }
    }
    Ok(segments)
}

/// Reduce a name to a safe single path component.
///
/// Separators become spaces, whitespace runs become `_`, anything outside
/// `[A-Za-z0-9_.-]` is dropped, runs of `.` collapse to one and
/// leading/trailing `.`/`_` are trimmed. The result never contains `..`.
fn sanitize_component(name: &str) -> String {
    let spaced = name.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let mut safe = String::with_capacity(joined.len());
    for c in joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        if c == '.' && safe.ends_with('.') {
            continue;
        }
        safe.push(c);
    }

    safe.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Insert `_<stamp>[_<token>]` between the stem and the extension.
fn suffixed_name(filename: &str, stamp: &str, token: Option<&str>) -> String {
    let (stem, extension) = match filename.rfind('.') {
        Some(idx) if idx > 0 => filename.split_at(idx),
        _ => (filename, ""),
    };
    match token {
        Some(token) => format!("{}_{}_{}{}", stem, stamp, token, extension),
        None => format!("{}_{}{}", stem, stamp, extension),
    }
}
