// nanoseed/src/fm_index.rs
//
// Interface to the reference FM-index. The search only needs interval
// extension, suffix-array resolution for emitted seeds, and the text
// size for coordinate reversal; how the index is built and stored is the
// implementor's business.

use crate::range::Range;

/// Read-only FM-index over the reference.
///
/// `get_neighbor` prepends one base to the pattern an interval stands
/// for; the convention throughout the crate is that successive event
/// bases are prepended in pattern space, which keeps every child
/// interval nested inside its k-mer's full range.
pub trait FmIndex {
    /// Full interval of suffixes starting with `base` (0..4).
    fn get_full_range(&self, base: u8) -> Range;

    /// Extend `range` by one base. An invalid range means the extended
    /// pattern does not occur in the reference.
    fn get_neighbor(&self, range: Range, base: u8) -> Range;

    /// Suffix-array lookup: text position for suffix-array index `i`.
    fn sa(&self, i: u64) -> u64;

    /// Length of the indexed text.
    fn size(&self) -> u64;
}
