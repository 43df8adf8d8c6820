//! The device (or stand-in file) under test.

use crate::error::TestError;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    path::Path,
};
use tracing::{info, warn};

/// Forces written data onto the physical media, past any OS write-back cache.
pub(crate) trait SyncToMedia {
    fn sync_to_media(&mut self) -> io::Result<()>;
}

impl SyncToMedia for File {
    fn sync_to_media(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetKind {
    BlockDevice,
    File,
}

impl TargetKind {
    #[cfg(unix)]
    fn of(metadata: &fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::FileTypeExt;
        let file_type = metadata.file_type();
        if file_type.is_block_device() {
            Some(TargetKind::BlockDevice)
        } else if file_type.is_file() {
            Some(TargetKind::File)
        } else {
            None
        }
    }

    #[cfg(not(unix))]
    fn of(metadata: &fs::Metadata) -> Option<Self> {
        metadata.is_file().then_some(TargetKind::File)
    }
}

/// A write handle on the target.
///
/// A regular file does not run out of space where its claimed capacity ends, so writes to one
/// are cut off at its length as of opening, the way a block device reports `ENOSPC`.
#[derive(Debug)]
pub(crate) struct Target {
    file: File,
    position: u64,
    end: Option<u64>,
}

impl Target {
    pub(crate) fn open_for_writing(dev_path: &Path) -> Result<Self, TestError> {
        let open_error = |source| TestError::Open {
            path: dev_path.to_path_buf(),
            mode: "writing",
            source,
        };
        let file = OpenOptions::new()
            .write(true)
            .open(dev_path)
            .map_err(open_error)?;
        let metadata = file.metadata().map_err(open_error)?;
        let end = match TargetKind::of(&metadata) {
            Some(TargetKind::BlockDevice) => {
                info!(?dev_path, "Target is a block device");
                None
            }
            Some(TargetKind::File) => {
                warn!(
                    ?dev_path,
                    len = metadata.len(),
                    "Target is a regular file; treating its current length as the device end"
                );
                Some(metadata.len())
            }
            None => {
                return Err(open_error(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "target is neither a block device nor a regular file",
                )))
            }
        };
        Ok(Self {
            file,
            position: 0,
            end,
        })
    }
}

impl Write for Target {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let allowed = match self.end {
            Some(end) => {
                let room = end.saturating_sub(self.position);
                if room == 0 && !buf.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "end of target reached",
                    ));
                }
                buf.len().min(usize::try_from(room).unwrap_or(usize::MAX))
            }
            None => buf.len(),
        };
        let written = self.file.write(&buf[..allowed])?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for Target {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = self.file.seek(pos)?;
        Ok(self.position)
    }
}

impl SyncToMedia for Target {
    fn sync_to_media(&mut self) -> io::Result<()> {
        self.file.sync_to_media()
    }
}
