//! The chunk buffer and the per-block markers stamped into it.

use crate::{error::TestError, metadata::BLOCK_SIZE};
use std::{fmt, io};

/// A 16-byte ASCII tag identifying the absolute index of the block it heads.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Marker([u8; Marker::LEN]);

impl Marker {
    pub(crate) const LEN: usize = 16;

    pub(crate) fn for_block(block: u64) -> Self {
        let text = format!("BLK {:012}", block);
        let mut bytes = [0; Self::LEN];
        // Indices past 12 digits get cut off, same as they would in a 16-byte C string field.
        let len = text.len().min(Self::LEN);
        bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marker(\"{}\")", self)
    }
}

/// One chunk's worth of blocks, filled with random data exactly once.
///
/// Only the first [`Marker::LEN`] bytes of each block ever change afterwards.
pub(crate) struct ChunkBuffer {
    buf: Vec<u8>,
}

impl ChunkBuffer {
    /// Reserves room for `blocks` blocks and fills all of it from `source`.
    pub(crate) fn fill_from(blocks: usize, source: &mut impl io::Read) -> Result<Self, TestError> {
        let allocation_error = |source| TestError::Allocation {
            blocks,
            block_size: BLOCK_SIZE,
            source,
        };
        let bytes = blocks
            .checked_mul(BLOCK_SIZE)
            .ok_or_else(|| allocation_error(None))?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes)
            .map_err(|source| allocation_error(Some(source)))?;
        buf.resize(bytes, 0);
        source
            .read_exact(&mut buf)
            .map_err(|source| TestError::Fill { bytes, source })?;
        Ok(Self { buf })
    }

    pub(crate) fn block_count(&self) -> usize {
        self.buf.len() / BLOCK_SIZE
    }

    /// Stamps the marker for absolute block `block` into slot `slot` of the buffer.
    pub(crate) fn stamp(&mut self, slot: usize, block: u64) {
        let start = slot * BLOCK_SIZE;
        self.buf[start..start + Marker::LEN].copy_from_slice(Marker::for_block(block).as_bytes());
    }

    /// The marker region of slot `slot`, whatever it currently holds.
    pub(crate) fn marker_at(&self, slot: usize) -> &[u8] {
        let start = slot * BLOCK_SIZE;
        &self.buf[start..start + Marker::LEN]
    }

    /// The first `blocks` blocks of the buffer.
    pub(crate) fn blocks(&self, blocks: usize) -> &[u8] {
        &self.buf[..blocks * BLOCK_SIZE]
    }

    /// The whole buffer, for reading a chunk back into.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}
