// Partition module - train/test assignment of file segments

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;

/// Dataset split a segment is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// Walk order used by the metadata exporter
    pub const ALL: [Split; 2] = [Split::Train, Split::Test];

    /// Directory name under the data root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Holds out exactly one segment per file for the test split
///
/// The assigner itself is stateless; randomness comes from the RNG passed to
/// each call so a run can be made reproducible without any global state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionAssigner {
    seed: Option<u64>,
}

impl PartitionAssigner {
    /// Unseeded assigner; every file draws from OS entropy
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Reproducible assigner
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Choose the test index for a file with `n` segments
    ///
    /// # Returns
    /// * `Some(i)` - `i` uniform in `[0, n)`
    /// * `None` - `n == 0`, nothing to assign
    pub fn choose<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Option<usize> {
        (n > 0).then(|| rng.gen_range(0..n))
    }

    /// Split of every segment of a file, index-aligned
    pub fn assign<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Split> {
        let test = self.choose(n, rng);
        (0..n)
            .map(|i| {
                if Some(i) == test {
                    Split::Test
                } else {
                    Split::Train
                }
            })
            .collect()
    }

    /// RNG owned by one source file
    ///
    /// Seeded runs derive the file's generator from the run seed, the label
    /// and the file stem, so the assignment does not depend on the order or
    /// the thread in which files are processed.
    pub fn file_rng(&self, label: &str, stem: &str) -> StdRng {
        match self.seed {
            Some(seed) => {
                let key = [label.as_bytes(), &[0u8][..], stem.as_bytes()]
                    .iter()
                    .fold(FNV_OFFSET, |hash, bytes| fnv1a(bytes, hash));
                StdRng::seed_from_u64(seed ^ key)
            }
            None => StdRng::from_entropy(),
        }
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8], mut hash: u64) -> u64 {
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
