//! BlockIo adapter for image files.
//!
//! The whole engine is generic over `gpt_disk_io::BlockIo`; this module
//! provides the host-side implementation over a `std::fs::File`. The file
//! must already be opened read+write and sized to the full image (the
//! front end owns open/close and `set_len`).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use thiserror::Error;

/// Error type for file-backed block I/O.
#[derive(Debug, Error)]
pub enum FileIoError {
    #[error("file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("buffer length {len} is not a multiple of the {lba_size}-byte sector size")]
    Misaligned { len: usize, lba_size: u32 },

    #[error("unsupported block size {0}")]
    UnsupportedBlockSize(u32),
}

/// Seek-based block I/O over an image file.
pub struct FileBlockIo<'a> {
    file: &'a mut File,
    block_size: BlockSize,
    lba_size: u64,
}

impl<'a> FileBlockIo<'a> {
    pub fn new(file: &'a mut File, lba_size: u32) -> Result<Self, FileIoError> {
        let block_size =
            BlockSize::new(lba_size).ok_or(FileIoError::UnsupportedBlockSize(lba_size))?;
        Ok(Self {
            file,
            block_size,
            lba_size: u64::from(lba_size),
        })
    }

    fn check_aligned(&self, len: usize) -> Result<(), FileIoError> {
        if len as u64 % self.lba_size != 0 {
            return Err(FileIoError::Misaligned {
                len,
                lba_size: self.lba_size as u32,
            });
        }
        Ok(())
    }
}

impl BlockIo for FileBlockIo<'_> {
    type Error = FileIoError;

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok(self.file.metadata()?.len() / self.lba_size)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        self.check_aligned(dst.len())?;
        self.file.seek(SeekFrom::Start(start_lba.0 * self.lba_size))?;
        self.file.read_exact(dst)?;
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        self.check_aligned(src.len())?;
        self.file.seek(SeekFrom::Start(start_lba.0 * self.lba_size))?;
        self.file.write_all(src)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.file.sync_all()?;
        Ok(())
    }
}
