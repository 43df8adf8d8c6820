//! Sources of filler bytes for the chunk buffer.

use crate::{error::TestError, metadata::TestConfig};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::{fs::File, io};
use tracing::info;

/// A generator for deterministically random-looking garbage data.
///
/// Used in place of the system entropy device when the run is seeded, so the filler is
/// reproducible between runs.
#[derive(Clone)]
pub(crate) struct SeededGarbage {
    rng: ChaCha8Rng,
}

impl SeededGarbage {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

/// SeededGarbage implements Read so it can stand in for the entropy device. It never runs dry.
impl io::Read for SeededGarbage {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rng.fill_bytes(buf);
        Ok(buf.len())
    }
}

/// Opens the byte producer configured for this run.
pub(crate) fn open_source(config: &TestConfig) -> Result<Box<dyn io::Read>, TestError> {
    if let Some(seed) = config.seed {
        info!(seed, "Source: seeded ChaCha8 stream");
        return Ok(Box::new(SeededGarbage::new(seed)));
    }
    let file = File::open(&config.entropy_source).map_err(|source| TestError::EntropySource {
        path: config.entropy_source.clone(),
        source,
    })?;
    info!(path = ?config.entropy_source, "Source");
    Ok(Box::new(file))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    #[test]
    fn seeded_garbage_is_reproducible() {
        let mut a = vec![0; 4096];
        let mut b = vec![0; 4096];
        SeededGarbage::new(42).read_exact(&mut a).expect("read");
        SeededGarbage::new(42).read_exact(&mut b).expect("read");
        assert_eq!(a, b);
        assert!(a.iter().any(|&byte| byte != 0));
    }

    #[test]
    fn missing_entropy_device_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = TestConfig {
            entropy_source: dir.path().join("urandom"),
            ..TestConfig::default()
        };
        let err = open_source(&config).err().expect("should fail");
        assert_eq!(err.exit_code(), 3);
    }
}
