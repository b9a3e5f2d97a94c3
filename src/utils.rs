use std::hash::BuildHasher;

use twox_hash::XxHash64;

const KEY_SEED: u64 = 0xdeadbeef;

/// An implementation of [`BuildHasher`] that hashes registry lookup keys with
/// a fixed-seed xxhash64. Lookup keys are produced by us, not by an untrusted
/// peer, so we skip the DoS resistant default hasher.
#[derive(Default, Debug, Clone, Copy)]
pub struct BuildKeyHasher;

impl BuildHasher for BuildKeyHasher {
    type Hasher = XxHash64;

    fn build_hasher(&self) -> Self::Hasher {
        XxHash64::with_seed(KEY_SEED)
    }
}
