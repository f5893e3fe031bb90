//! Memory-mapped, atomically finalized image files.
//!
//! [`Output`] maps a temporary sibling of the target path (`<target>.partial`), lets the caller
//! fill it through [`Output::write_at`], and renames it over the target in
//! [`Output::finalize`]. Dropping an output that was never finalized removes the temporary
//! file, so an interrupted build never leaves a truncated image behind.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilpack::file::output::Output;
//!
//! let mut output = Output::create("app.pe", 8)?;
//! output.write_at(0, b"NFMRK2\0\0")?;
//! output.finalize()?;
//! # Ok::<(), cilpack::Error>(())
//! ```

use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use crate::{Error, Result};

/// A file-backed output buffer that only becomes visible at its target path once finalized.
pub struct Output {
    mmap: MmapMut,
    temp_path: PathBuf,
    target_path: PathBuf,
    finalized: bool,
}

impl Output {
    /// Creates a zero-filled output of `size` bytes destined for `target_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MmapFailed`] if the temporary file cannot be created, sized or mapped,
    /// or if `size` is zero (empty files cannot be mapped).
    pub fn create<P: AsRef<Path>>(target_path: P, size: u64) -> Result<Self> {
        if size == 0 {
            return Err(Error::MmapFailed("Cannot map an empty output".to_string()));
        }

        let target_path = target_path.as_ref().to_path_buf();
        let temp_path = partial_path(&target_path);

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::MmapFailed(format!("Failed to create temporary file: {e}")))?;

        file.set_len(size)
            .map_err(|e| Error::MmapFailed(format!("Failed to set file size: {e}")))?;

        // SAFETY: the temporary file is created and truncated by us and is not shared with
        // other mappings for the lifetime of `Output`.
        let mmap = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .map_err(|e| Error::MmapFailed(format!("Failed to create memory mapping: {e}")))?
        };

        Ok(Output {
            mmap,
            temp_path,
            target_path,
            finalized: false,
        })
    }

    /// Size of the mapped region in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    /// The mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// The path the output will be renamed to on [`Output::finalize`].
    #[must_use]
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Copies `data` to `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MmapFailed`] if the write would exceed the mapped region.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = usize::try_from(offset).map_err(|_| {
            Error::MmapFailed(format!("Offset {offset} too large for target architecture"))
        })?;
        let end = start
            .checked_add(data.len())
            .filter(|end| *end <= self.size())
            .ok_or_else(|| {
                Error::MmapFailed(format!(
                    "Write would exceed buffer size: offset={offset}, len={}, buffer_size={}",
                    data.len(),
                    self.size()
                ))
            })?;

        self.mmap[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Flushes the mapping and atomically moves the file to its target path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MmapFailed`] if flushing fails, or [`Error::Io`] if the rename fails.
    pub fn finalize(mut self) -> Result<()> {
        self.mmap
            .flush()
            .map_err(|e| Error::MmapFailed(format!("Failed to flush memory mapping: {e}")))?;

        std::fs::rename(&self.temp_path, &self.target_path)?;
        self.finalized = true;
        Ok(())
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        if !self.finalized {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// Writes `data` to `path` through an [`Output`], replacing any existing file atomically.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, mapped or renamed.
pub fn write_file<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let mut output = Output::create(path, data.len() as u64)?;
    output.write_at(0, data)?;
    output.finalize()
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}
