use crate::error::{IndexError, Result};
use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// A fixed-length string of bits, packed eight to a byte.
///
/// Bit `i` lives in byte `i >> 3` under the mask `1 << (i & 7)`. Bits past the end of the vector in the final byte are always zero.
///
/// Ordering compares the packed bytes lexicographically; it exists for deterministic iteration, not for similarity.
pub struct BitVector {
    bits: Vec<u8>,
    size: usize,
}

impl BitVector {
    /// Create a bit vector with every bit cleared.
    ///
    /// # Arguments
    ///
    /// * `size` - The number of bits in the vector.
    pub fn new(size: usize) -> Self {
        Self {
            bits: vec![0; (size + 7) >> 3],
            size,
        }
    }

    /// Build the bit code of a bucket key, where bit `i` of the vector is bit `i` of `value`.
    ///
    /// # Arguments
    ///
    /// * `value` - The integer to unpack.
    ///
    /// * `size` - The number of bits to take from `value`; at most 32.
    pub fn from_u32(value: u32, size: usize) -> Self {
        assert!(size <= 32, "a u32 holds at most 32 bits, not {size}");
        let mut bv = Self::new(size);
        for (i, byte) in bv.bits.iter_mut().enumerate() {
            *byte = (value >> (i * 8)) as u8;
        }
        bv.clear_padding();
        bv
    }

    fn clear_padding(&mut self) {
        let used = self.size & 7;
        if used != 0 {
            if let Some(last) = self.bits.last_mut() {
                *last &= (1u8 << used) - 1;
            }
        }
    }

    #[inline]
    fn check_index(&self, i: usize) {
        assert!(
            i < self.size,
            "bit index {i} out of range for a vector of {} bits",
            self.size
        );
    }

    /// Set bit `i`.
    pub fn set(&mut self, i: usize) {
        self.check_index(i);
        self.bits[i >> 3] |= 1 << (i & 7);
    }

    /// Clear bit `i`.
    pub fn unset(&mut self, i: usize) {
        self.check_index(i);
        self.bits[i >> 3] &= !(1 << (i & 7));
    }

    /// Whether bit `i` is set.
    pub fn get(&self, i: usize) -> bool {
        self.check_index(i);
        self.bits[i >> 3] & (1 << (i & 7)) != 0
    }

    /// The number of bits in the vector.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the vector holds no bits at all.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The number of bytes backing the vector.
    pub fn byte_len(&self) -> usize {
        self.bits.len()
    }

    /// The packed bytes backing the vector.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Interpret the vector as an unsigned integer, with byte 0 least significant.
    ///
    /// # Returns
    ///
    /// The bucket key of this bit code.
    ///
    /// # Panics
    ///
    /// If the vector is longer than 32 bits.
    pub fn to_u32(&self) -> u32 {
        assert!(
            self.size <= 32,
            "only vectors of at most 32 bits fit a u32, this one has {}",
            self.size
        );
        self.bits
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, byte)| acc | (u32::from(*byte) << (i * 8)))
    }

    /// The number of bits that differ between two vectors of the same length.
    ///
    /// # Panics
    ///
    /// If the vectors have different lengths.
    pub fn hamming(&self, other: &BitVector) -> u32 {
        assert_eq!(
            self.size, other.size,
            "Hamming distance is only defined between vectors of equal length"
        );
        hamming_bitwise_fast::hamming_bitwise_fast(&self.bits, &other.bits)
    }
}

/// Order bit vectors by ascending Hamming distance from `center`.
///
/// Vectors at the same distance are left in no particular order.
///
/// # Arguments
///
/// * `center` - The vector distances are measured from.
///
/// * `vectors` - The vectors to sort in place; each must be as long as `center`.
pub fn sort_by_distance_from(center: &BitVector, vectors: &mut [BitVector]) {
    vectors.par_sort_unstable_by_key(|x| center.hamming(x));
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.size {
            if i > 0 && i % 8 == 0 {
                f.write_str(" ")?;
            }
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for BitVector {
    type Err = IndexError;

    /// Parse a string of `0`s and `1`s. Spaces are skipped; any other character is an error.
    fn from_str(s: &str) -> Result<Self> {
        let mut bits = Vec::with_capacity(s.len());
        for (position, character) in s.chars().enumerate() {
            match character {
                '1' => bits.push(true),
                '0' => bits.push(false),
                ' ' => {}
                _ => {
                    return Err(IndexError::Format {
                        character,
                        position,
                    })
                }
            }
        }
        let mut bv = Self::new(bits.len());
        for (i, _) in bits.iter().enumerate().filter(|(_, b)| **b) {
            bv.set(i);
        }
        Ok(bv)
    }
}
