//! MuHash3072: a rolling hash over a set of byte strings
//!
//! Each element is hashed to a number modulo the prime `2^3072 - 1103717`.
//! Insertions multiply the numerator and removals multiply the denominator,
//! so the digest depends only on the multiset of elements and never on the
//! order they were added in.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::types::Hash;

/// Size in bytes of a 3072-bit number
pub const BYTE_SIZE: usize = 384;

const MODULUS_OFFSET: u32 = 1_103_717;

fn modulus() -> BigUint {
    (BigUint::from(1u32) << 3072usize) - BigUint::from(MODULUS_OFFSET)
}

/// Expand `data` to a 3072-bit number: SHA256 keys a ChaCha20 keystream
/// (zero nonce) whose first 384 bytes are read little-endian.
fn to_num3072(data: &[u8]) -> BigUint {
    let mut key = [0u8; 32];
    key.copy_from_slice(&Sha256::digest(data));
    let mut cipher = ChaCha20::new(&key.into(), &[0u8; 12].into());
    let mut stream = [0u8; BYTE_SIZE];
    cipher.apply_keystream(&mut stream);
    BigUint::from_bytes_le(&stream)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuHash3072 {
    numerator: BigUint,
    denominator: BigUint,
}

impl MuHash3072 {
    /// The hash of the empty set
    pub fn new() -> Self {
        Self {
            numerator: BigUint::from(1u32),
            denominator: BigUint::from(1u32),
        }
    }

    pub fn insert(&mut self, data: &[u8]) {
        self.numerator = (&self.numerator * to_num3072(data)) % modulus();
    }

    pub fn remove(&mut self, data: &[u8]) {
        self.denominator = (&self.denominator * to_num3072(data)) % modulus();
    }

    /// Union with another accumulator
    pub fn combine(&mut self, other: &MuHash3072) {
        let p = modulus();
        self.numerator = (&self.numerator * &other.numerator) % &p;
        self.denominator = (&self.denominator * &other.denominator) % &p;
    }

    /// SHA256 of the 384-byte little-endian encoding of
    /// numerator / denominator mod p
    pub fn finalize(&self) -> Hash {
        let p = modulus();
        let inverse = self.denominator.modpow(&(&p - BigUint::from(2u32)), &p);
        let value = (&self.numerator * inverse) % &p;

        let mut bytes = value.to_bytes_le();
        bytes.resize(BYTE_SIZE, 0);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(&bytes));
        hash
    }
}

impl Default for MuHash3072 {
    fn default() -> Self {
        Self::new()
    }
}
