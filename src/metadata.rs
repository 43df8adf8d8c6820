//! Meta-information about devices under test.

use std::{
    fs::OpenOptions,
    io::{self, Seek},
    path::{Path, PathBuf},
};

use tracing::info;

use crate::error::TestError;

/// Size of one addressable block. Fixed for the whole run.
pub const BLOCK_SIZE: usize = 512;

/// Blocks per chunk unless overridden: 128MiB per I/O call.
pub const DEFAULT_CHUNK_BLOCKS: usize = 2 * 1024 * 128;

/// Where filler bytes come from unless a seed is given.
pub const DEFAULT_ENTROPY_SOURCE: &str = "/dev/urandom";

/// Immutable settings shared by every phase of a test run.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub chunk_blocks: usize,
    /// Maximum number of blocks to process per phase. `None` means "until the device ends".
    pub block_limit: Option<u64>,
    /// Only test the final chunk of the claimed capacity.
    pub skip: bool,
    pub verbose: bool,
    pub seed: Option<u64>,
    pub entropy_source: PathBuf,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            chunk_blocks: DEFAULT_CHUNK_BLOCKS,
            block_limit: None,
            skip: false,
            verbose: false,
            seed: None,
            entropy_source: PathBuf::from(DEFAULT_ENTROPY_SOURCE),
        }
    }
}

impl TestConfig {
    /// The block both phases start at.
    pub fn first_block(&self, capacity: &Capacity) -> u64 {
        if self.skip {
            capacity
                .blocks_claimed
                .saturating_sub(self.chunk_blocks as u64)
        } else {
            0
        }
    }

    /// The region of the device both phases walk through.
    pub fn bounds(&self, capacity: &Capacity) -> PhaseBounds {
        let first_block = self.first_block(capacity);
        PhaseBounds {
            first_block,
            limit: self
                .block_limit
                .map(|limit| first_block.saturating_add(limit)),
            claimed: capacity.blocks_claimed,
        }
    }
}

/// Where a phase starts and at which block counter values it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseBounds {
    pub first_block: u64,
    /// Counter value at which `--limit` is used up.
    pub limit: Option<u64>,
    pub claimed: u64,
}

impl PhaseBounds {
    pub fn limit_reached(&self, block: u64) -> bool {
        Some(block) == self.limit
    }

    /// The limit is used up or the claimed capacity is exhausted.
    pub fn reached(&self, block: u64) -> bool {
        self.limit_reached(block) || block == self.claimed
    }

    /// Bytes a phase is expected to get through, for sizing its progress bar.
    pub fn expected_bytes(&self) -> u64 {
        let last = self.limit.map_or(self.claimed, |limit| limit.min(self.claimed));
        last.saturating_sub(self.first_block)
            .saturating_mul(BLOCK_SIZE as u64)
    }
}

/// What the device says about its own size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub bytes_claimed: u64,
    pub blocks_claimed: u64,
}

impl Capacity {
    pub fn from_bytes(bytes_claimed: u64) -> Self {
        Self {
            bytes_claimed,
            blocks_claimed: bytes_claimed / BLOCK_SIZE as u64,
        }
    }
}

/// Opens the given device for reading, seeks to the end and returns the number of bytes skipped
/// over.
///
/// Anything past the last whole block is ignored by both test phases.
pub fn device_capacity(dev_path: &Path) -> Result<Capacity, TestError> {
    let mut dev = OpenOptions::new()
        .read(true)
        .open(dev_path)
        .map_err(|source| TestError::Open {
            path: dev_path.to_path_buf(),
            mode: "reading",
            source,
        })?;
    let bytes_claimed = dev
        .seek(io::SeekFrom::End(0))
        .map_err(|source| TestError::Seek {
            path: dev_path.to_path_buf(),
            source,
        })?;
    let capacity = Capacity::from_bytes(bytes_claimed);
    info!(
        ?dev_path,
        blocks = capacity.blocks_claimed,
        gib = bytes_claimed as f64 / (1u64 << 30) as f64,
        gb = bytes_claimed as f64 / 1e9,
        "Target reports its size"
    );
    Ok(capacity)
}
