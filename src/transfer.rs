//! Inline file transfer framing
//!
//! A shared file travels through the text channel as one line:
//!
//! ```text
//! ::FILE_START::<filename>::<base64 body>::FILE_END::
//! ```
//!
//! The payload is not length-prefixed, so the receiver buffers from the start
//! marker to the end marker before decoding. The base64 alphabet has no `:`,
//! and file names containing the delimiter are refused at share time, so the
//! frame is unambiguous.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

pub const FILE_START: &str = "::FILE_START::";
pub const FILE_END: &str = "::FILE_END::";
pub const DELIMITER: &str = "::";

/// Errors decoding a received payload line
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("malformed file payload")]
    Malformed,

    #[error("invalid file name in payload: {0}")]
    BadFileName(String),

    #[error("invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A decoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Base64 body for `data`
pub fn encode_body(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Assemble a payload line from a filename and an encoded body
pub fn frame(filename: &str, body: &str) -> String {
    format!("{FILE_START}{filename}{DELIMITER}{body}{FILE_END}")
}

/// Full payload line for `data`
pub fn encode(filename: &str, data: &[u8]) -> String {
    frame(filename, &encode_body(data))
}

/// Whether a whole line is a file payload
///
/// Only a line that begins with the start marker counts, so chat text
/// relayed with a `[time] [#room] <name>` prefix is never taken for a file.
pub fn is_payload(line: &str) -> bool {
    line.starts_with(FILE_START) && line.ends_with(FILE_END)
}

/// Decode a complete payload line
pub fn decode(line: &str) -> Result<ReceivedFile, TransferError> {
    let inner = line
        .strip_prefix(FILE_START)
        .and_then(|rest| rest.strip_suffix(FILE_END))
        .ok_or(TransferError::Malformed)?;
    let (filename, body) = inner
        .split_once(DELIMITER)
        .ok_or(TransferError::Malformed)?;

    if !is_valid_filename(filename) {
        return Err(TransferError::BadFileName(filename.to_string()));
    }

    Ok(ReceivedFile {
        filename: filename.to_string(),
        data: BASE64.decode(body.trim())?,
    })
}

/// Whether `name` can be framed and staged as-is
pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(DELIMITER)
        && !name.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}

/// Collision-free name candidates for `filename`
///
/// Yields `filename` itself, then `base_1.ext`, `base_2.ext`, ...
pub fn candidate_names(filename: &str) -> impl Iterator<Item = String> + '_ {
    let path = Path::new(filename);
    let base = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    std::iter::once(filename.to_string()).chain((1u64..).map(move |n| format!("{base}_{n}{ext}")))
}

/// First path in `dir` for `filename` that does not exist yet
///
/// Used by receivers to store downloads without overwriting earlier ones.
pub fn unique_download_path(dir: &Path, filename: &str) -> PathBuf {
    candidate_names(filename)
        .map(|name| dir.join(name))
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join(filename))
}
