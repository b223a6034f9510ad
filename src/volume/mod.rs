//! volume
//!
//! Volume image output.
//!
//! # Architecture
//!
//! Writing an HFS volume is delegated to a [`VolumeBuilder`]. The runner
//! stages each version's file tree on disk and then asks the builder, if one
//! is configured, to place that tree onto an image of a fixed size.
//!
//! This module also writes the blank filler image, which needs no
//! filesystem at all.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// File dates stamped on every file placed in a volume.
///
/// A fixed value keeps images byte-identical across runs.
pub const FIXED_FILE_DATE: u32 = 0xC000_0000;

/// Errors from volume output.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// Writing an image failed.
    #[error("failed to write image '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The builder rejected the tree.
    #[error("volume builder failed for '{volume}': {message}")]
    Builder { volume: String, message: String },
}

/// What to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRequest {
    /// Volume name, e.g. `Test-7.6.1`.
    pub name: String,
    /// Root of the staged file tree.
    pub tree: PathBuf,
    /// Exact image size in bytes.
    pub size_bytes: u64,
    /// Creation and modification date for every file.
    pub file_date: u32,
    /// Image file to write.
    pub dest: PathBuf,
}

/// Places a staged file tree onto a fixed-size volume image.
pub trait VolumeBuilder: Send + Sync {
    /// Build the image described by `request`.
    fn build(&self, request: &VolumeRequest) -> Result<(), VolumeError>;
}

/// Write `size_bytes` of zeros to `path`, one MiB at a time.
///
/// # Errors
///
/// Returns `VolumeError::Write` if the file cannot be created or written.
pub fn write_blank_image(path: &Path, size_bytes: u64) -> Result<(), VolumeError> {
    const CHUNK: usize = 1024 * 1024;

    let wrap = |source| VolumeError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(wrap)?);
    let zeros = vec![0u8; CHUNK];
    let mut remaining = size_bytes;
    while remaining > 0 {
        let n = usize::try_from(remaining).map_or(CHUNK, |r| r.min(CHUNK));
        out.write_all(&zeros[..n]).map_err(wrap)?;
        remaining -= n as u64;
    }
    out.flush().map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn blank_image_exact_size() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blank.dsk");
        write_blank_image(&path, 3 * 1024 * 1024 + 17).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 3 * 1024 * 1024 + 17);
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn blank_image_overwrites() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blank.dsk");
        std::fs::write(&path, vec![0xFF; 4096]).unwrap();
        write_blank_image(&path, 10).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0; 10]);
    }

    #[test]
    fn blank_image_bad_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing/dir/blank.dsk");
        let err = write_blank_image(&path, 1).unwrap_err();
        assert!(err.to_string().contains("blank.dsk"));
    }
}
