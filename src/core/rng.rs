//! String hashing and the seeded generator behind every random draw.
//!
//! Two pieces:
//! 1. [`hash_str`]: 32-bit FNV-1a over UTF-16 code units.
//! 2. [`Mulberry32`]: a 32-bit-state generator producing `f64` draws in `[0, 1)`.
//!
//! Both are fixed to the bit. Changing a constant or the order of a
//! mixing step changes every embedding and weight matrix downstream.

use rand::{RngCore, SeedableRng};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Order-sensitive 32-bit FNV-1a digest of `s`.
///
/// Characters are consumed as UTF-16 code units, so text outside the
/// Basic Multilingual Plane contributes its surrogate pair.
pub fn hash_str(s: &str) -> u32 {
    s.encode_utf16().fold(FNV_OFFSET_BASIS, |acc, unit| {
        (acc ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// Mulberry32 generator.
///
/// Each draw advances the state by a fixed odd increment and then runs two
/// xor-shift / odd-multiply rounds. Generators built from the same seed
/// replay the same infinite sequence. Instances share nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generator seeded by the digest of `key`.
    pub fn from_key(key: &str) -> Self {
        Self::new(hash_str(key))
    }

    /// Next raw 32-bit output.
    pub fn next_raw(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let a = self.state;
        let mut t = (a ^ (a >> 15)).wrapping_mul(1 | a);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        t ^ (t >> 14)
    }

    /// Next draw in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_raw()) / TWO_POW_32
    }

    /// Next draw mapped to `[-amplitude, amplitude)`.
    pub fn next_symmetric(&mut self, amplitude: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * amplitude
    }
}

impl RngCore for Mulberry32 {
    fn next_u32(&mut self) -> u32 {
        self.next_raw()
    }

    fn next_u64(&mut self) -> u64 {
        let lo = u64::from(self.next_raw());
        let hi = u64::from(self.next_raw());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_raw().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Mulberry32 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}
