//! Key-seeded encode/decode tables.
//!
//! A table maps every byte value to the set of 4-hint tuples that uniquely
//! pin down that byte's target grid, and maps each such tuple (in canonical
//! form) back to the byte. Construction is a pure function of the shared
//! key: both endpoints derive identical tables without ever exchanging them.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

use crate::codec::grid::{enumerate_grids, pack_hint, GRID_CELLS, GRID_COUNT};
use crate::error::{Error, Result};

/// Four hints with distinct positions; uniquely identifies one grid.
pub type HintTuple = [u8; 4];

/// Mask applied to hint bytes before decode lookup: clears bits 4 and 7.
pub const HINT_MASK: u8 = 0x6F;

/// Number of bytes in the padding pool.
pub const PADDING_POOL_SIZE: usize = 32;

/// Bitset over the enumerated grids, one lane per grid.
#[derive(Clone, Copy)]
struct GridSet([u64; 5]);

impl GridSet {
    const EMPTY: GridSet = GridSet([0; 5]);

    fn insert(&mut self, i: usize) {
        self.0[i / 64] |= 1 << (i % 64);
    }

    fn and(&self, other: &GridSet) -> GridSet {
        let mut words = [0u64; 5];
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.0[i] & other.0[i];
        }
        GridSet(words)
    }

    fn len(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }
}

/// Immutable codec tables, shared read-only by every connection.
pub struct Table {
    encode: Vec<Vec<HintTuple>>,
    decode: HashMap<u32, u8>,
    padding_pool: [u8; PADDING_POOL_SIZE],
    is_padding: [bool; 256],
}

impl Table {
    /// Build the tables for a shared key.
    ///
    /// One-shot work on the order of 256 x 1820 candidate tuples; tens of
    /// milliseconds. Fails if some byte value ends up with no unique-clue
    /// tuple or if the padding pool would collide with a decode key; neither
    /// happens for the fixed grid set.
    pub fn new(key: &str) -> Result<Self> {
        let grids = enumerate_grids();
        debug_assert_eq!(grids.len(), GRID_COUNT);

        // Key-seeded permutation: the first 8 digest bytes, big-endian, seed
        // a deterministic stream cipher RNG. Byte b's target grid is the
        // b-th entry of the shuffled enumeration.
        let digest = Sha256::digest(key.as_bytes());
        let seed = u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"));
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut shuffled = grids.clone();
        shuffled.shuffle(&mut rng);

        // One bitset of satisfying grids per (position, value) constraint;
        // a tuple's match count is the intersection of its four bitsets.
        let mut constraint = [[GridSet::EMPTY; 4]; GRID_CELLS];
        for (i, grid) in grids.iter().enumerate() {
            for (pos, &val) in grid.iter().enumerate() {
                constraint[pos][(val - 1) as usize].insert(i);
            }
        }

        let subsets = position_subsets();
        let mut encode: Vec<Vec<HintTuple>> = vec![Vec::new(); 256];
        let mut decode = HashMap::new();

        for (byte, tuples) in encode.iter_mut().enumerate() {
            let target = &shuffled[byte];
            for positions in &subsets {
                let mut matching = constraint[positions[0]][(target[positions[0]] - 1) as usize];
                for &pos in &positions[1..] {
                    matching = matching.and(&constraint[pos][(target[pos] - 1) as usize]);
                }
                // Tuples satisfied by two or more grids are ambiguous clues
                // and would decode differently under another target.
                if matching.len() == 1 {
                    let mut hints = [0u8; 4];
                    for (i, &pos) in positions.iter().enumerate() {
                        hints[i] = pack_hint(pos as u8, target[pos]);
                    }
                    tuples.push(hints);
                    decode.insert(canonical_key(&hints), byte as u8);
                }
            }
            if tuples.is_empty() {
                return Err(Error::codec(format!(
                    "no unique hint tuple for byte {}",
                    byte
                )));
            }
        }

        let mut padding_pool = [0u8; PADDING_POOL_SIZE];
        let mut is_padding = [false; 256];
        for i in 0..16u8 {
            padding_pool[2 * i as usize] = 0x80 + i;
            padding_pool[2 * i as usize + 1] = 0x10 + i;
            is_padding[(0x80 + i) as usize] = true;
            is_padding[(0x10 + i) as usize] = true;
        }

        // A masked padding byte reduces to its position nibble, i.e. a
        // value-1 hint at that cell. No four of them may form a decode key.
        for positions in &subsets {
            let hints = [
                pack_hint(positions[0] as u8, 1),
                pack_hint(positions[1] as u8, 1),
                pack_hint(positions[2] as u8, 1),
                pack_hint(positions[3] as u8, 1),
            ];
            if decode.contains_key(&canonical_key(&hints)) {
                return Err(Error::codec("padding pool collides with a decode key"));
            }
        }

        Ok(Self {
            encode,
            decode,
            padding_pool,
            is_padding,
        })
    }

    /// Hint tuples encoding `byte`; never empty.
    pub fn tuples_for(&self, byte: u8) -> &[HintTuple] {
        &self.encode[byte as usize]
    }

    /// Decode a full reassembly window, if it canonicalizes to a known key.
    pub fn decode_window(&self, window: &HintTuple) -> Option<u8> {
        self.decode.get(&canonical_key(window)).copied()
    }

    /// Whether `byte` belongs to the padding pool.
    pub fn is_padding(&self, byte: u8) -> bool {
        self.is_padding[byte as usize]
    }

    /// The fixed padding pool.
    pub fn padding_pool(&self) -> &[u8; PADDING_POOL_SIZE] {
        &self.padding_pool
    }

    /// Number of decode keys (diagnostics).
    pub fn decode_len(&self) -> usize {
        self.decode.len()
    }
}

/// Canonical decode key for a hint tuple: mask the free bits, order by cell
/// position, pack big-endian. Tuples differing only in free bits or emission
/// order collide to the same key.
pub fn canonical_key(hints: &HintTuple) -> u32 {
    let mut clean = [
        hints[0] & HINT_MASK,
        hints[1] & HINT_MASK,
        hints[2] & HINT_MASK,
        hints[3] & HINT_MASK,
    ];
    clean.sort_unstable_by_key(|h| h & 0x0F);
    u32::from_be_bytes(clean)
}

/// All C(16,4) = 1820 four-element position subsets, ascending.
fn position_subsets() -> Vec<[usize; 4]> {
    let mut subsets = Vec::with_capacity(1820);
    for a in 0..GRID_CELLS - 3 {
        for b in a + 1..GRID_CELLS - 2 {
            for c in b + 1..GRID_CELLS - 1 {
                for d in c + 1..GRID_CELLS {
                    subsets.push([a, b, c, d]);
                }
            }
        }
    }
    subsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecureRandom;

    #[test]
    fn test_subset_count() {
        assert_eq!(position_subsets().len(), 1820);
    }

    #[test]
    fn test_every_tuple_roundtrips() {
        let table = Table::new("hello").unwrap();
        for byte in 0..=255u8 {
            let tuples = table.tuples_for(byte);
            assert!(!tuples.is_empty(), "byte {} has no tuples", byte);
            for tuple in tuples {
                assert_eq!(table.decode_window(tuple), Some(byte));
            }
        }
    }

    #[test]
    fn test_construction_is_deterministic() {
        let a = Table::new("determinism").unwrap();
        let b = Table::new("determinism").unwrap();
        for byte in 0..=255u8 {
            assert_eq!(a.tuples_for(byte), b.tuples_for(byte));
        }
        assert_eq!(a.decode_len(), b.decode_len());
    }

    #[test]
    fn test_free_bits_and_order_collapse() {
        let table = Table::new("hello").unwrap();
        let tuple = table.tuples_for(0x42)[0];

        let mut dirty = tuple;
        dirty[0] |= 0x80;
        dirty[2] |= 0x10;
        assert_eq!(table.decode_window(&dirty), Some(0x42));

        let mut reordered = tuple;
        reordered.reverse();
        assert_eq!(table.decode_window(&reordered), Some(0x42));
    }

    #[test]
    fn test_padding_pool_layout() {
        let table = Table::new("hello").unwrap();
        let pool = table.padding_pool();
        for i in 0..16u8 {
            assert_eq!(pool[2 * i as usize], 0x80 + i);
            assert_eq!(pool[2 * i as usize + 1], 0x10 + i);
        }
        for &b in pool {
            assert!(table.is_padding(b));
        }
        // data hints keep bits 4 and 7 clear, so the pool is disjoint
        for byte in 0..=255u8 {
            for tuple in table.tuples_for(byte) {
                for &hint in tuple {
                    assert!(!table.is_padding(hint));
                }
            }
        }
    }

    #[test]
    fn test_padding_never_decodes() {
        let table = Table::new("hello").unwrap();
        let pool = *table.padding_pool();
        // any four pool bytes with distinct positions must miss the table
        for a in 0..8 {
            for b in 8..16 {
                for c in 16..24 {
                    for d in 24..32 {
                        let window = [pool[a], pool[b], pool[c], pool[d]];
                        assert_eq!(table.decode_window(&window), None);
                    }
                }
            }
        }
    }

    #[test]
    fn test_distinct_keys_yield_distinct_tables() {
        let mut signatures = std::collections::HashSet::new();
        for _ in 0..100 {
            let raw: [u8; 16] = SecureRandom::bytes();
            let key: String = raw.iter().map(|b| format!("{:02x}", b)).collect();
            let table = Table::new(&key).unwrap();
            let signature: Vec<HintTuple> = (0..4u8)
                .flat_map(|b| table.tuples_for(b).to_vec())
                .collect();
            assert!(signatures.insert(signature), "key collision for {}", key);
        }
    }
}
