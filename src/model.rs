// nanoseed/src/model.rs
//
// K-mer arithmetic interface and the precomputed table of every k-mer's
// full FM-range. Emission probabilities are the caller's concern; the
// core only needs to walk k-mer space and anchor k-mers in the index.

use crate::fm_index::FmIndex;
use crate::range::Range;

/// K-mer indexing as the signal model defines it.
///
/// Base index 0 is the oldest base of a k-mer, `kmer_len() - 1` the
/// newest; `get_neighbor` advances a k-mer by one event, shifting the
/// oldest base out and appending `base` as the newest.
pub trait KmerModel {
    fn kmer_count(&self) -> u32;
    fn kmer_len(&self) -> u32;

    /// The k-mer following `kmer` when `base` is observed next.
    fn get_neighbor(&self, kmer: u16, base: u8) -> u16;

    /// Base at position `i` (0 = oldest).
    fn get_base(&self, kmer: u16, i: u32) -> u8;

    /// The newest base.
    fn get_last_base(&self, kmer: u16) -> u8 {
        self.get_base(kmer, self.kmer_len() - 1)
    }
}

/// Full FM-range of every k-mer, computed once at construction and used
/// as the seeding universe: fresh paths are only ever born inside these
/// intervals. K-mers absent from the reference get an invalid range.
#[derive(Debug, Clone)]
pub struct KmerTable {
    ranges: Vec<Range>,
}

impl KmerTable {
    /// Walk each k-mer through the index, oldest base first; every
    /// later base is prepended in pattern space, mirroring how the
    /// beam search extends live paths.
    pub fn build<F: FmIndex, M: KmerModel>(fmi: &F, model: &M) -> Self {
        let mut ranges = Vec::with_capacity(model.kmer_count() as usize);
        for kmer in 0..model.kmer_count() {
            let kmer = kmer as u16;
            let mut r = fmi.get_full_range(model.get_base(kmer, 0));
            for i in 1..model.kmer_len() {
                if !r.is_valid() {
                    break;
                }
                r = fmi.get_neighbor(r, model.get_base(kmer, i));
            }
            ranges.push(r);
        }
        let present = ranges.iter().filter(|r| r.is_valid()).count();
        log::debug!(
            "k-mer range table built: {} of {} k-mers present in reference",
            present,
            ranges.len()
        );
        KmerTable { ranges }
    }

    #[inline]
    pub fn get(&self, kmer: u16) -> Range {
        self.ranges[kmer as usize]
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packed 2-bit k-mer model, oldest base in the high bits.
    struct PackedModel {
        k: u32,
    }

    impl KmerModel for PackedModel {
        fn kmer_count(&self) -> u32 {
            1 << (2 * self.k)
        }
        fn kmer_len(&self) -> u32 {
            self.k
        }
        fn get_neighbor(&self, kmer: u16, base: u8) -> u16 {
            (((kmer as u32) << 2 | base as u32) & (self.kmer_count() - 1)) as u16
        }
        fn get_base(&self, kmer: u16, i: u32) -> u8 {
            ((kmer >> (2 * (self.k - 1 - i))) & 3) as u8
        }
    }

    #[test]
    fn test_packed_model_arithmetic() {
        let m = PackedModel { k: 3 };
        assert_eq!(m.kmer_count(), 64);
        // ACG = 0b000110
        let acg: u16 = 0b000110;
        assert_eq!(m.get_base(acg, 0), 0, "A");
        assert_eq!(m.get_base(acg, 1), 1, "C");
        assert_eq!(m.get_base(acg, 2), 2, "G");
        assert_eq!(m.get_last_base(acg), 2);
        // Advancing by T drops the A: CGT = 0b011011
        assert_eq!(m.get_neighbor(acg, 3), 0b011011);
    }

    /// A hand-wired index over a two-symbol toy alphabet, enough to
    /// check the walk order of the table build.
    struct ToyFmi;

    impl FmIndex for ToyFmi {
        fn get_full_range(&self, base: u8) -> Range {
            match base {
                0 => Range::new(1, 4),
                1 => Range::new(5, 8),
                _ => Range::INVALID,
            }
        }
        fn get_neighbor(&self, range: Range, base: u8) -> Range {
            // Prepending A to the A-range narrows it; everything else
            // dies.
            if range == Range::new(1, 4) && base == 0 {
                Range::new(1, 2)
            } else if range == Range::new(1, 2) && base == 0 {
                Range::new(1, 1)
            } else {
                Range::INVALID
            }
        }
        fn sa(&self, i: u64) -> u64 {
            i
        }
        fn size(&self) -> u64 {
            9
        }
    }

    #[test]
    fn test_table_walk_starts_at_oldest_base() {
        let m = PackedModel { k: 3 };
        let table = KmerTable::build(&ToyFmi, &m);
        assert_eq!(table.len(), 64);
        // AAA: full range of A, then prepended A twice.
        assert_eq!(table.get(0), Range::new(1, 1));
        // AAC: the walk dies at the first C prepend.
        assert!(!table.get(1).is_valid());
        // Any k-mer whose oldest base is G or T never starts.
        assert!(!table.get(0b100000).is_valid());
    }
}
