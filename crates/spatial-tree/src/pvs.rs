//! Potentially visible set storage and decoding.

use crate::{Result, SpatialError};

const WORD_BITS: usize = 32;

/// A fixed-size set of bits packed into 32-bit words.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bitset {
    len: usize,
    words: Vec<u32>,
}

impl Bitset {
    /// Creates a bitset of `len` bits, all cleared.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            words: vec![0; len.div_ceil(WORD_BITS)],
        }
    }

    /// Creates a bitset of `len` bits, all set.
    pub fn all_set(len: usize) -> Self {
        let mut bits = Self::new(len);
        bits.set_all();
        bits
    }

    /// Creates a bitset from little-endian packed bytes (bit `i` is bit
    /// `i % 8` of byte `i / 8`). Missing bytes read as zero, extra bits are
    /// ignored.
    pub fn from_bytes(len: usize, bytes: &[u8]) -> Self {
        let mut bits = Self::new(len);
        for index in 0..len {
            if bytes.get(index / 8).is_some_and(|b| b & (1 << (index % 8)) != 0) {
                bits.set(index);
            }
        }
        bits
    }

    /// Returns the number of bits in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the set holds no bits at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns bit `index`; out-of-range bits read as unset.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        index < self.len && self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    /// Sets bit `index`. Out-of-range indices are ignored.
    #[inline]
    pub fn set(&mut self, index: usize) {
        if index < self.len {
            self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
        }
    }

    /// Clears bit `index`. Out-of-range indices are ignored.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        if index < self.len {
            self.words[index / WORD_BITS] &= !(1 << (index % WORD_BITS));
        }
    }

    /// Clears every bit.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Sets every bit.
    pub fn set_all(&mut self) {
        self.words.fill(u32::MAX);
        // Keep the padding bits of the last word clear so count_ones stays exact.
        let tail = self.len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last = (1u32 << tail) - 1;
            }
        }
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates over the indices of the set bits, in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.get(i))
    }
}

/// Decodes one cluster's run-length compressed PVS row.
///
/// A non-zero byte is copied as-is; a zero byte is followed by the number of
/// zero bytes it stands for. Decoding stops once `ceil(cluster_count / 8)`
/// bytes are produced. `None` means the level carries no visibility data, so
/// every cluster is visible.
pub fn decompress_pvs(
    cluster: usize,
    input: Option<&[u8]>,
    cluster_count: usize,
) -> Result<Bitset> {
    let Some(mut input) = input else {
        return Ok(Bitset::all_set(cluster_count));
    };

    let row_bytes = cluster_count.div_ceil(8);
    let mut out = Vec::with_capacity(row_bytes);

    while out.len() < row_bytes {
        match input {
            [0, run, rest @ ..] => {
                if out.len() + usize::from(*run) > row_bytes {
                    return Err(SpatialError::InvalidPvs {
                        cluster,
                        reason: "zero run overflows the row",
                    });
                }
                out.resize(out.len() + usize::from(*run), 0);
                input = rest;
            }
            [0] => {
                return Err(SpatialError::InvalidPvs {
                    cluster,
                    reason: "zero run is missing its count",
                });
            }
            [byte, rest @ ..] => {
                out.push(*byte);
                input = rest;
            }
            [] => {
                return Err(SpatialError::InvalidPvs {
                    cluster,
                    reason: "row is truncated",
                });
            }
        }
    }

    Ok(Bitset::from_bytes(cluster_count, &out))
}
