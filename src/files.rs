//! On-disk staging area for shared files
//!
//! One flat directory; each staged file is named `<room>_<filename>`.
//! Files are created with create-new semantics, so a staged copy is written
//! once and never overwritten, which keeps concurrent readers safe.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::transfer;
use crate::types::RoomName;

/// Server-local file staging directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open the store, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the staged copy of `filename` in `room`
    pub fn path_for(&self, room: &RoomName, filename: &str) -> PathBuf {
        self.root.join(format!("{room}_{filename}"))
    }

    /// Stage `data` under the first free name derived from `filename`
    ///
    /// Names for which `taken` returns true are skipped, as are names that
    /// already exist on disk. Returns the name actually used.
    pub async fn save(
        &self,
        room: &RoomName,
        filename: &str,
        data: &[u8],
        taken: impl Fn(&str) -> bool,
    ) -> std::io::Result<String> {
        for candidate in transfer::candidate_names(filename) {
            if taken(&candidate) {
                continue;
            }

            let path = self.path_for(room, &candidate);
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Staged file {} exists, trying next name", path.display());
                    continue;
                }
                Err(e) => return Err(e),
            };

            file.write_all(data).await?;
            file.flush().await?;
            return Ok(candidate);
        }

        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "no free file name",
        ))
    }

    /// Read a staged file
    pub async fn load(&self, room: &RoomName, filename: &str) -> std::io::Result<Vec<u8>> {
        fs::read(self.path_for(room, filename)).await
    }

    /// Remove the staged copies of a deleted room's files
    pub async fn purge<'a>(&self, room: &RoomName, filenames: impl IntoIterator<Item = &'a str>) {
        for filename in filenames {
            let path = self.path_for(room, filename);
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed staged file {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove staged file {}: {}", path.display(), e),
            }
        }
    }
}

/// A shared file written to the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Name actually used, after collision renaming
    pub filename: String,
    pub size: u64,
}

impl FileStore {
    /// Read the local file at `raw_path` and stage it for `room`
    ///
    /// Names in `taken` are skipped; see `save`.
    pub async fn stage_local(
        &self,
        room: &RoomName,
        raw_path: &str,
        taken: &HashSet<String>,
    ) -> Result<StagedFile, AppError> {
        let file = read_local(raw_path).await?;
        let filename = self
            .save(room, &file.filename, &file.data, |name| taken.contains(name))
            .await
            .map_err(|e| {
                warn!("Failed to stage {} for {}: {}", file.filename, room, e);
                AppError::Storage(e.to_string())
            })?;

        Ok(StagedFile {
            filename,
            size: file.data.len() as u64,
        })
    }
}

/// A file read from the server's local file system for `/share`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Base name of the source path
    pub filename: String,
    pub data: Vec<u8>,
}

/// Read the file at `raw_path` (a leading `~` means `$HOME`)
pub async fn read_local(raw_path: &str) -> Result<LocalFile, AppError> {
    let path = expand_home(raw_path);

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::LocalFileMissing(raw_path.to_string()))?;
    if !transfer::is_valid_filename(&filename) {
        return Err(AppError::InvalidFileName(filename));
    }

    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(AppError::LocalFileMissing(raw_path.to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::LocalFileMissing(raw_path.to_string()))
        }
        Err(e) => return Err(AppError::Storage(e.to_string())),
    }

    let data = fs::read(&path)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    Ok(LocalFile { filename, data })
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix('~') {
        if let Some(home) = std::env::var_os("HOME") {
            let rest = rest.trim_start_matches(['/', '\\']);
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(raw)
}
