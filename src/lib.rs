// Real-time seed finding for nanopore selective sequencing.
//
// An event-driven beam search over a reference FM-index: each signal
// event arrives as a probability vector over all k-mers, and the
// aligner maintains a bounded population of partial alignments through
// suffix-array interval space, emitting seed hits as paths become
// specific. Event detection, the emission model, the FM-index itself
// and seed clustering are external; this crate defines the interfaces
// it consumes from them.

pub mod aligner;
pub mod fm_index; // FmIndex trait (interval extension, SA resolution)
pub mod map_opt; // Options and FM-length-bucketed thresholds
pub mod model; // KmerModel trait and the per-k-mer range table
pub mod path; // Per-path beam state
pub mod range;
pub mod seed; // Seed records and the SeedTracker interface
