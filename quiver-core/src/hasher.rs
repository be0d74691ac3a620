//! Seeded hashing of tag names and values into index keys
//!
//! Tag values are never stored a second time. The tag table keeps a 64-bit
//! fold of an XXH3-128 hash instead, chained as `hash(value, hash(name, seed))`
//! so the name half can be computed once per tag name.
//!
//! The seed is drawn once when a database is created and persisted with it.
//! Changing it would orphan every stored tag hash.
//!
//! Hashes are not collision free. Two distinct `(name, value)` pairs can map to
//! the same key, in which case a query for one also returns events carrying
//! the other. At 64 bits this is rare enough to accept.

use xxhash_rust::xxh3::xxh3_128_with_seed;

/// Seeded tag hasher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHasher {
    seed: u64,
    e: u64,
    a: u64,
    p: u64,
}

impl TagHasher {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            e: mix(b"e", seed) as u64,
            a: mix(b"a", seed) as u64,
            p: mix(b"p", seed) as u64,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed for values of tag `name`
    pub fn name_seed(&self, name: &str) -> u64 {
        match name {
            "e" => self.e,
            "a" => self.a,
            "p" => self.p,
            _ => mix(name.as_bytes(), self.seed) as u64,
        }
    }

    /// Hash a value under a precomputed name seed
    pub fn hash_with(&self, name_seed: u64, value: &str) -> i64 {
        mix(value.as_bytes(), name_seed)
    }

    /// Index key of a `(name, value)` tag pair
    pub fn hash(&self, name: &str, value: &str) -> i64 {
        self.hash_with(self.name_seed(name), value)
    }

    /// Index key of an author public key
    pub fn hash_pubkey(&self, pubkey: &str) -> i64 {
        mix(pubkey.as_bytes(), self.seed)
    }
}

/// XXH3-128 folded to 64 bits, stored as SQLite INTEGER
fn mix(bytes: &[u8], seed: u64) -> i64 {
    let wide = xxh3_128_with_seed(bytes, seed);
    ((wide >> 64) as u64 ^ wide as u64) as i64
}
