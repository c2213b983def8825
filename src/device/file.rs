//! File-backed block device
//!
//! Uses positional I/O (`pread`/`pwrite` semantics), so no shared seek
//! position is involved.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LogError, Result};

use super::{check_access, check_block_size, BlockDevice};

/// A regular file or raw device node treated as a block device
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    path: PathBuf,
    block_size: u64,
    size: u64,
}

impl FileDevice {
    /// Open an existing image read/write
    ///
    /// The image length must be a non-zero multiple of `block_size`.
    pub fn open(path: impl AsRef<Path>, block_size: u64) -> Result<Self> {
        check_block_size(block_size)?;
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();

        if size == 0 || size % block_size != 0 {
            return Err(LogError::InvalidArgument(format!(
                "image {} is {} bytes, not a non-zero multiple of block size {}",
                path.display(),
                size,
                block_size
            )));
        }

        debug!(path = %path.display(), block_size, size, "opened file device");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            block_size,
            size,
        })
    }

    /// Create (or truncate) an image of `blocks` zeroed blocks and open it
    pub fn create(path: impl AsRef<Path>, block_size: u64, blocks: u64) -> Result<Self> {
        check_block_size(block_size)?;
        let size = block_size.checked_mul(blocks).ok_or_else(|| {
            LogError::InvalidArgument(format!("{blocks} blocks of {block_size} bytes overflows"))
        })?;
        {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path.as_ref())?;
            file.set_len(size)?;
        }
        Self::open(path, block_size)
    }

    /// Path this device was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileDevice {
    fn block_size(&self) -> u64 {
        self.block_size
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<()> {
        check_access(self.block_size, self.size, offset, buf.len())?;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        check_access(self.block_size, self.size, offset, buf.len())?;
        self.file.write_all_at(buf, offset)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
