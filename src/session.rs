//! A complete test run: probe, prepare, write, read back.

use crate::{
    buffer::ChunkBuffer,
    entropy,
    error::TestError,
    metadata::{self, TestConfig},
    perf::PhaseStats,
    read_test,
    target::Target,
    write_test::{self, ChunkFailure},
};
use std::path::Path;
use tracing::info;

/// What both phases of a run found.
#[derive(Debug, Clone)]
pub(crate) struct Report {
    pub write: PhaseStats,
    pub write_failure: Option<ChunkFailure>,
    pub read: PhaseStats,
}

/// Runs the write test and the read-back test against the device at `dev_path`.
///
/// Every handle and the chunk buffer are dropped on the way out, whichever way that is.
#[tracing::instrument(skip(config))]
pub(crate) fn run(dev_path: &Path, config: &TestConfig) -> Result<Report, TestError> {
    let capacity = metadata::device_capacity(dev_path)?;
    let mut target = Target::open_for_writing(dev_path)?;

    let mut buffer = {
        let mut source = entropy::open_source(config)?;
        info!(
            blocks = config.chunk_blocks,
            block_size = metadata::BLOCK_SIZE,
            "Preparing data buffer"
        );
        ChunkBuffer::fill_from(config.chunk_blocks, &mut source)?
    };
    info!("Data buffer ready");

    let written = write_test::write(&mut target, &mut buffer, &capacity, config);
    drop(target);
    written.stats.log_summary(config.block_limit);

    let mut source = read_test::open(dev_path)?;
    info!(?dev_path, "Reading back");
    let read = read_test::read_back(&mut source, &mut buffer, &capacity, config)?;
    read.log_summary(config.block_limit);

    Ok(Report {
        write: written.stats,
        write_failure: written.failure,
        read,
    })
}
