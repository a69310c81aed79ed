//! Binary file format of a `ContractionHierarchy`.
//!
//! A 24 byte header (`u64` magic number, `u32` node count, forward arc count, backward arc count, 4 bytes padding)
//! followed by `rank` and then for the forward and the backward side:
//! `first_out`, `head`, `weight`, the original arc bits padded to multiples of 512 bits,
//! `shortcut_first_arc` and `shortcut_second_arc`.
//! Everything is stored in native byte order without compression.

use super::{ContractionHierarchy, Side};
use crate::{
    datastr::{graph::*, rank_select_map::BitVec},
    io::{read_vec, DataBytes},
    util::{invert_permutation, is_permutation},
    Error, Result,
};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    mem::size_of,
    path::Path,
};

const MAGIC_NUMBER: u64 = 0x436F_6E74_4869_6572;
const HEADER_SIZE: u64 = 24;
// bits are stored in blocks of 512
const BIT_BLOCK_WORDS: usize = 512 / 64;

struct Header {
    node_count: u32,
    forward_arc_count: u32,
    backward_arc_count: u32,
}

impl Header {
    fn read(input: &mut impl Read) -> Result<Header> {
        let mut bytes = [0u8; HEADER_SIZE as usize];
        input.read_exact(&mut bytes)?;
        let u32_at = |offset: usize| u32::from_ne_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        if u64::from_ne_bytes(magic) != MAGIC_NUMBER {
            return Err(Error::Corrupt("magic number broken, is this really a contraction hierarchy file?".to_string()));
        }

        Ok(Header {
            node_count: u32_at(8),
            forward_arc_count: u32_at(12),
            backward_arc_count: u32_at(16),
        })
    }

    fn write(&self, output: &mut impl Write) -> Result<()> {
        output.write_all(&MAGIC_NUMBER.to_ne_bytes())?;
        output.write_all(&self.node_count.to_ne_bytes())?;
        output.write_all(&self.forward_arc_count.to_ne_bytes())?;
        output.write_all(&self.backward_arc_count.to_ne_bytes())?;
        output.write_all(&[0u8; 4])?;
        Ok(())
    }

    fn expected_file_size(&self) -> u64 {
        let n = u64::from(self.node_count);
        let forward = u64::from(self.forward_arc_count);
        let backward = u64::from(self.backward_arc_count);
        let u32_size = size_of::<u32>() as u64;

        HEADER_SIZE
            + u32_size * (n + (n + 1 + 4 * forward) + (n + 1 + 4 * backward))
            + ((forward + 511) / 512) * 64
            + ((backward + 511) / 512) * 64
    }
}

fn bit_block_word_count(bit_count: usize) -> usize {
    (bit_count + 511) / 512 * BIT_BLOCK_WORDS
}

fn read_side(input: &mut impl Read, node_count: usize, arc_count: usize) -> Result<Side> {
    let first_out = read_vec(input, node_count + 1)?;
    let head = read_vec(input, arc_count)?;
    let weight = read_vec(input, arc_count)?;
    let words = read_vec::<u64>(input, bit_block_word_count(arc_count))?;
    let shortcut_first_arc = read_vec(input, arc_count)?;
    let shortcut_second_arc = read_vec(input, arc_count)?;

    Ok(Side {
        first_out,
        head,
        weight,
        is_shortcut_an_original_arc: BitVec::from_words(words, arc_count),
        shortcut_first_arc,
        shortcut_second_arc,
    })
}

fn write_side(output: &mut impl Write, side: &Side) -> Result<()> {
    output.write_all(side.first_out.data_bytes())?;
    output.write_all(side.head.data_bytes())?;
    output.write_all(side.weight.data_bytes())?;
    let mut words = side.is_shortcut_an_original_arc.words().to_vec();
    words.resize(bit_block_word_count(side.num_arcs()), 0);
    output.write_all(words.data_bytes())?;
    output.write_all(side.shortcut_first_arc.data_bytes())?;
    output.write_all(side.shortcut_second_arc.data_bytes())?;
    Ok(())
}

impl ContractionHierarchy {
    /// Read a hierarchy. Only the header and the rank are checked, see `check_contraction_hierarchy_for_errors` for everything else.
    /// Counts in a broken header cause an error once the input runs out, memory grows only with the bytes actually read.
    /// Use `read_with_size` or `load_file` to reject such input before reading the body.
    pub fn read(input: &mut impl Read) -> Result<ContractionHierarchy> {
        let header = Header::read(input)?;
        Self::read_body(input, &header)
    }

    /// Like `read` but also rejects input whose size does not match the header.
    pub fn read_with_size(input: &mut impl Read, file_size: u64) -> Result<ContractionHierarchy> {
        let header = Header::read(input)?;
        let expected = header.expected_file_size();
        if expected != file_size {
            return Err(Error::Corrupt(format!(
                "file has {} bytes but the header requires {}, this file is corrupt",
                file_size, expected
            )));
        }
        Self::read_body(input, &header)
    }

    fn read_body(input: &mut impl Read, header: &Header) -> Result<ContractionHierarchy> {
        let node_count = header.node_count as usize;
        let rank: Vec<NodeId> = read_vec(input, node_count)?;
        if !is_permutation(&rank) {
            return Err(Error::Corrupt("rank is not a permutation".to_string()));
        }
        let order = invert_permutation(&rank);
        let forward = read_side(input, node_count, header.forward_arc_count as usize)?;
        let backward = read_side(input, node_count, header.backward_arc_count as usize)?;

        Ok(ContractionHierarchy { rank, order, forward, backward })
    }

    pub fn write(&self, output: &mut impl Write) -> Result<()> {
        Header {
            node_count: self.node_count() as u32,
            forward_arc_count: self.forward.num_arcs() as u32,
            backward_arc_count: self.backward.num_arcs() as u32,
        }
        .write(output)?;
        output.write_all(self.rank.data_bytes())?;
        write_side(output, &self.forward)?;
        write_side(output, &self.backward)?;
        Ok(())
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<ContractionHierarchy> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Self::read_with_size(&mut BufReader::new(file), file_size)
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut output = BufWriter::new(File::create(path)?);
        self.write(&mut output)?;
        output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::DEFAULT_MAX_POP_COUNT;
    use super::*;

    fn small_ch() -> ContractionHierarchy {
        ContractionHierarchy::build(4, &[0, 1, 2, 0], &[1, 2, 3, 3], &[1, 1, 1, 5], None, DEFAULT_MAX_POP_COUNT).unwrap()
    }

    #[test]
    fn in_memory_round_trip() {
        let ch = small_ch();
        let mut buffer = Vec::new();
        ch.write(&mut buffer).unwrap();
        let (forward, backward) = (ch.forward.num_arcs() as u64, ch.backward.num_arcs() as u64);
        let bit_bytes = |arcs: u64| (arcs + 511) / 512 * 64;
        assert_eq!(buffer.len() as u64, 24 + 4 * (4 + 5 + 4 * forward + 5 + 4 * backward) + bit_bytes(forward) + bit_bytes(backward));

        let read = ContractionHierarchy::read(&mut &buffer[..]).unwrap();
        assert_eq!(read, ch);
        let read = ContractionHierarchy::read_with_size(&mut &buffer[..], buffer.len() as u64).unwrap();
        assert_eq!(read, ch);
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let mut buffer = Vec::new();
        small_ch().write(&mut buffer).unwrap();
        let size = buffer.len() as u64;
        buffer.pop();
        assert!(matches!(ContractionHierarchy::read_with_size(&mut &buffer[..], size - 1), Err(Error::Corrupt(_))));
        assert!(ContractionHierarchy::read(&mut &buffer[..]).is_err());
    }

    #[test]
    fn huge_header_counts_are_rejected() {
        let mut buffer = Vec::new();
        small_ch().write(&mut buffer).unwrap();
        for offset in [8, 12, 16] {
            let mut broken = buffer.clone();
            broken[offset..offset + 4].copy_from_slice(&u32::MAX.to_ne_bytes());
            assert!(matches!(ContractionHierarchy::read(&mut &broken[..]), Err(Error::Io(_))));
            assert!(matches!(
                ContractionHierarchy::read_with_size(&mut &broken[..], broken.len() as u64),
                Err(Error::Corrupt(_))
            ));
        }
    }

    #[test]
    fn wrong_magic_is_corrupt() {
        let mut buffer = Vec::new();
        small_ch().write(&mut buffer).unwrap();
        buffer[0] ^= 0xFF;
        assert!(matches!(ContractionHierarchy::read(&mut &buffer[..]), Err(Error::Corrupt(_))));
    }
}
