use clap::builder::TypedValueParser;
use clap::Parser;
use indicatif::ProgressStyle;
use std::{ffi::OsString, path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[macro_use]
extern crate lazy_static;

mod buffer;
mod entropy;
mod error;
mod metadata;
mod perf;
mod session;
mod target;
mod timing;

use metadata::TestConfig;

/// Checks that a block device (or a file standing in for one) really holds as much data as it
/// claims to, by writing numbered blocks across it and reading them back.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, infer_long_args = true)]
struct Args {
    /// Name of the block device (or file) to test, e.g. /dev/sdh.
    ///
    /// Everything on it will be overwritten.
    device: PathBuf,

    /// Log progress after every chunk.
    #[clap(long)]
    verbose: bool,

    /// Maximum number of blocks (sectors) to test. 0 means no limit.
    #[clap(long, value_name = "BLOCKS")]
    limit: Option<u64>,

    /// Only test the last chunk (128MiB by default) of the claimed capacity.
    #[clap(long)]
    skip: bool,

    /// Number of 512-byte blocks written or read per I/O call.
    #[clap(long, default_value_t = metadata::DEFAULT_CHUNK_BLOCKS, value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
    chunk_blocks: usize,

    /// Fill the data buffer from a seeded pseudo-random stream instead of the entropy source.
    #[clap(long)]
    seed: Option<u64>,

    /// Device to read random filler bytes from.
    #[clap(long, default_value = metadata::DEFAULT_ENTROPY_SOURCE)]
    entropy_source: PathBuf,
}

impl Args {
    fn config(&self) -> TestConfig {
        TestConfig {
            chunk_blocks: self.chunk_blocks,
            block_limit: self.limit.filter(|&limit| limit > 0),
            skip: self.skip,
            verbose: self.verbose,
            seed: self.seed,
            entropy_source: self.entropy_source.clone(),
        }
    }
}

/// Parses the command line. When no test should run, returns the exit status instead, after
/// printing usage (exit 1 on bad arguments) or the requested help or version text (exit 0).
fn parse_args<I, T>(argv: I) -> Result<Args, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Args::try_parse_from(argv).map_err(|e| {
        if let Err(error) = e.print() {
            warn!(%error, "Could not print usage");
        }
        if e.use_stderr() {
            1
        } else {
            0
        }
    })
}

fn main() -> ExitCode {
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();
    info!(version = env!("CARGO_PKG_VERSION"), "Block device integrity tester");

    let args = match parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(code) => return ExitCode::from(code),
    };
    let config = args.config();
    if let Some(limit) = config.block_limit {
        info!(limit, "Limiting test to {} blocks", limit);
    }
    if config.skip {
        info!("Skipping to end of device");
    }

    match session::run(&args.device, &config) {
        Ok(report) => {
            info!(
                written = report.write.blocks_actual,
                write_failure = ?report.write_failure.map(|f| f.kind),
                read = report.read.blocks_actual,
                mismatches = report.read.error_count,
                "Test complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, source = ?std::error::Error::source(&e), "Test aborted");
            ExitCode::from(e.exit_code())
        }
    }
}

lazy_static! {
    pub(crate) static ref PROGRESS_STYLE: ProgressStyle = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.white/grey} {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta_precise}) {msg}",
    ).expect("Internal error in indicatif progress bar template syntax");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from(["bdit", "--verbose", "--limit", "100", "--skip", "/dev/sdh"])
            .expect("valid arguments");
        let config = args.config();
        assert_eq!(args.device, PathBuf::from("/dev/sdh"));
        assert!(config.verbose && config.skip);
        assert_eq!(config.block_limit, Some(100));
        assert_eq!(config.chunk_blocks, metadata::DEFAULT_CHUNK_BLOCKS);
    }

    #[test]
    fn accepts_unambiguous_prefixes() {
        let args = Args::try_parse_from(["bdit", "--lim", "0", "--sk", "/dev/sdh"]).expect("valid");
        let config = args.config();
        assert!(config.skip);
        assert_eq!(config.block_limit, None, "a limit of 0 means no limit");
    }

    #[test]
    fn rejects_ambiguous_prefixes_and_missing_device() {
        // --ver could be --verbose or --version.
        assert!(Args::try_parse_from(["bdit", "--ver", "/dev/sdh"]).is_err());
        let err = Args::try_parse_from(["bdit", "--verbose"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn chunk_blocks_must_be_positive() {
        let args = Args::try_parse_from(["bdit", "--chunk-blocks", "16", "/dev/sdh"]).expect("valid");
        assert_eq!(args.config().chunk_blocks, 16);
        assert!(Args::try_parse_from(["bdit", "--chunk-blocks", "0", "/dev/sdh"]).is_err());
        assert!(Args::try_parse_from(["bdit", "--chunk-blocks", "-3", "/dev/sdh"]).is_err());
    }

    #[test]
    fn bad_arguments_exit_with_usage_status() {
        assert_eq!(parse_args(["bdit", "--verbose"]).err(), Some(1));
        assert_eq!(parse_args(["bdit", "--bogus", "/dev/sdh"]).err(), Some(1));
        assert_eq!(parse_args(["bdit", "--help"]).err(), Some(0));
        assert_eq!(parse_args(["bdit", "--version"]).err(), Some(0));
        let args = parse_args(["bdit", "/dev/sdh"]).expect("valid");
        assert_eq!(args.device, PathBuf::from("/dev/sdh"));
    }
}
