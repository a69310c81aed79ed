// This module contains a data structure to efficiently map a large nonconsecutive
// global id space into a smaller consecutive id space from 0 to n where the order is preserved.

use std::mem::size_of;

// number of bits (not bytes) in one 64 bit uint
const STORAGE_BITS: usize = size_of::<u64>() * 8;

/// A plain vector of bits backed by `u64` words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitVec {
    data: Vec<u64>,
    size: usize,
}

impl BitVec {
    /// All bits unset.
    pub fn new(size: usize) -> BitVec {
        // ceiling to the right number of u64s
        let num_ints = (size + STORAGE_BITS - 1) / STORAGE_BITS;
        BitVec { data: vec![0; num_ints], size }
    }

    /// All bits set.
    pub fn new_set(size: usize) -> BitVec {
        let mut bits = BitVec {
            data: vec![!0; (size + STORAGE_BITS - 1) / STORAGE_BITS],
            size,
        };
        bits.clear_padding();
        bits
    }

    /// Rebuild from raw words, bits beyond `size` are dropped.
    pub fn from_words(mut data: Vec<u64>, size: usize) -> BitVec {
        data.resize((size + STORAGE_BITS - 1) / STORAGE_BITS, 0);
        let mut bits = BitVec { data, size };
        bits.clear_padding();
        bits
    }

    fn clear_padding(&mut self) {
        if self.size % STORAGE_BITS != 0 {
            if let Some(last) = self.data.last_mut() {
                *last &= (1u64 << (self.size % STORAGE_BITS)) - 1;
            }
        }
    }

    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.size, "index: {} size: {}", index, self.size);
        // shifting a 1 bit to the right place and masking
        self.data[index / STORAGE_BITS] & (1 << (index % STORAGE_BITS)) != 0
    }

    pub fn set(&mut self, index: usize) {
        assert!(index < self.size, "index: {} size: {}", index, self.size);
        self.data[index / STORAGE_BITS] |= 1 << (index % STORAGE_BITS);
    }

    pub fn unset(&mut self, index: usize) {
        assert!(index < self.size, "index: {} size: {}", index, self.size);
        self.data[index / STORAGE_BITS] &= !(1 << (index % STORAGE_BITS));
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn count_ones(&self) -> usize {
        self.data.iter().map(|v| v.count_ones() as usize).sum()
    }

    pub fn words(&self) -> &[u64] {
        &self.data
    }
}

// Bits per block of precomputed prefix sums, one 64 byte cache line.
const BITS_PER_PREFIX: usize = 512;
const INTS_PER_PREFIX: usize = BITS_PER_PREFIX / STORAGE_BITS;

/// Maps the set bits of a `BitVec` onto `0..count_ones`, preserving their order.
/// The local id of a global id is the number of set bits before it.
/// A prefix sum per 512 bit block makes this a popcount over at most one cache line.
#[derive(Debug, Clone)]
pub struct LocalIdMapper {
    contained_keys_flags: BitVec,
    prefix_sum: Vec<u32>,
}

impl LocalIdMapper {
    pub fn new(bit_vec: BitVec) -> LocalIdMapper {
        let block_count = (bit_vec.len() + BITS_PER_PREFIX - 1) / BITS_PER_PREFIX;
        // one extra element in the back containing the total number of elements
        let mut prefix_sum = Vec::with_capacity(block_count + 1);
        prefix_sum.push(0);
        let mut previous = 0;
        for block in bit_vec.data.chunks(INTS_PER_PREFIX) {
            previous += block.iter().map(|num| num.count_ones()).sum::<u32>();
            prefix_sum.push(previous);
        }

        LocalIdMapper {
            contained_keys_flags: bit_vec,
            prefix_sum,
        }
    }

    /// Number of global ids.
    pub fn global_id_count(&self) -> usize {
        self.contained_keys_flags.len()
    }

    /// Number of global ids which have a local id.
    pub fn local_id_count(&self) -> usize {
        self.prefix_sum.last().copied().unwrap_or(0) as usize
    }

    pub fn is_global_id_mapped(&self, key: usize) -> bool {
        self.contained_keys_flags.get(key)
    }

    /// Local id of a mapped global id, panics if the id is not mapped.
    pub fn to_local(&self, key: usize) -> usize {
        assert!(self.contained_keys_flags.get(key));
        self.prefix_sum[key / BITS_PER_PREFIX] as usize + self.bit_count_partial_range(key)
    }

    pub fn get(&self, key: usize) -> Option<usize> {
        if key < self.contained_keys_flags.len() && self.contained_keys_flags.get(key) {
            Some(self.prefix_sum[key / BITS_PER_PREFIX] as usize + self.bit_count_partial_range(key))
        } else {
            None
        }
    }

    fn bit_count_partial_range(&self, key: usize) -> usize {
        let data = &self.contained_keys_flags.data;
        let index = key / STORAGE_BITS; // the index of the number containing the bit
        let below_key = (1u64 << (key % STORAGE_BITS)) - 1;
        let num = (data[index] & below_key).count_ones() as usize;

        let range = ((index / INTS_PER_PREFIX) * INTS_PER_PREFIX)..index; // the numbers before ours in the block
        let sum: usize = data[range].iter().map(|num| num.count_ones() as usize).sum();
        sum + num
    }
}
