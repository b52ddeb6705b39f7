// nanoseed/src/path.rs
//
// Per-path state for the beam search: one partial alignment through
// event space, kept as a value type inside a fixed arena slot. The
// event-type history is a 2-bit-per-event packed integer and the window
// probability is maintained through prefix sums, so extending a path is
// a handful of copies and shifts with no allocation.

use crate::map_opt::MapOpt;
use crate::range::Range;

/// Bits per packed event type.
pub const TYPE_BITS: u32 = 2;

const TYPE_MASK: u64 = (1 << TYPE_BITS) - 1;

/// How one event advanced a path. `Match` must stay variant 0: sources
/// are seeded with a single implicit match, and the per-type count
/// array is indexed by discriminant. `Skip` and `Ignore` are reserved
/// slots rounding the set to a power of two; the search machinery
/// carries them but the seed predicate does not consult them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    Match = 0,
    Stay = 1,
    Skip = 2,
    Ignore = 3,
}

impl EventType {
    pub const NUM_TYPES: usize = 4;

    #[inline]
    pub fn from_bits(bits: u8) -> EventType {
        match bits & TYPE_MASK as u8 {
            0 => EventType::Match,
            1 => EventType::Stay,
            2 => EventType::Skip,
            _ => EventType::Ignore,
        }
    }
}

/// Construction-time tables for the packed history, derived from the
/// window length. Shared by every path slot of one aligner.
#[derive(Debug, Clone)]
pub struct PathConf {
    /// Window length W in events.
    pub win_len: u32,
    /// Bit offset of the history head (the most recent event's slot).
    pub head_shift: u32,
    /// Per-type value pre-shifted into the head position.
    pub type_adds: [u64; EventType::NUM_TYPES],
}

impl PathConf {
    pub fn new(win_len: u32) -> Self {
        let head_shift = TYPE_BITS * (win_len - 2);
        let mut type_adds = [0u64; EventType::NUM_TYPES];
        for (t, add) in type_adds.iter_mut().enumerate() {
            *add = (t as u64) << head_shift;
        }
        PathConf {
            win_len,
            head_shift,
            type_adds,
        }
    }
}

/// One partial alignment. Slots are reused in place across events and
/// reads via `make_source` / `make_child`; `prob_sums` is allocated once
/// when the arena is built and never reallocated.
#[derive(Debug, Clone)]
pub struct PathState {
    /// Events consumed since seeding. 0 marks an invalidated slot;
    /// saturates at `win_len + 1` once the window is full.
    pub length: u32,
    pub fm_range: Range,
    pub kmer: u16,
    /// Packed 2-bit event-type history, head at the high end.
    pub event_types: u64,
    pub win_type_counts: [u8; EventType::NUM_TYPES],
    /// Prefix sums of the window's per-event probabilities;
    /// `prob_sums[i+1] - prob_sums[i]` is the i-th window event.
    pub prob_sums: Vec<f32>,
    /// Mean probability over the current window.
    pub win_prob: f32,
    pub consec_stays: u32,
    /// Set once this path's suffix-array positions have been emitted;
    /// inherited by children so a path never reports twice.
    pub sa_checked: bool,
}

impl PathState {
    /// An empty (invalid) slot with its probability buffer preallocated.
    pub fn new(win_len: u32) -> Self {
        PathState {
            length: 0,
            fm_range: Range::INVALID,
            kmer: 0,
            event_types: 0,
            win_type_counts: [0; EventType::NUM_TYPES],
            prob_sums: vec![0.0; win_len as usize + 1],
            win_prob: 0.0,
            consec_stays: 0,
            sa_checked: false,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.length > 0
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.length = 0;
    }

    /// Number of events currently inside the window.
    #[inline]
    pub fn win_len(&self, conf: &PathConf) -> u32 {
        self.length.min(conf.win_len)
    }

    #[inline]
    pub fn win_full(&self, conf: &PathConf) -> bool {
        self.length > conf.win_len
    }

    /// Match count within the window; the reference span of an emitted
    /// seed.
    #[inline]
    pub fn match_len(&self) -> u8 {
        self.win_type_counts[EventType::Match as usize]
    }

    /// Most recent event type in the history.
    #[inline]
    pub fn type_head(&self, conf: &PathConf) -> EventType {
        EventType::from_bits(((self.event_types >> conf.head_shift) & TYPE_MASK) as u8)
    }

    /// Oldest event type still in the history.
    #[inline]
    pub fn type_tail(&self) -> EventType {
        EventType::from_bits((self.event_types & TYPE_MASK) as u8)
    }

    /// Reset this slot to a fresh single-event path seeded at `kmer`.
    pub fn make_source(&mut self, range: Range, kmer: u16, prob: f32) {
        self.length = 1;
        self.consec_stays = 0;
        self.event_types = 0;
        self.win_prob = prob;
        self.fm_range = range;
        self.kmer = kmer;
        self.sa_checked = false;

        self.win_type_counts = [0; EventType::NUM_TYPES];
        self.win_type_counts[EventType::Match as usize] = 1;

        self.prob_sums[0] = 0.0;
        self.prob_sums[1] = prob;
    }

    /// Overwrite this slot with a one-event extension of `parent`.
    pub fn make_child(
        &mut self,
        parent: &PathState,
        range: Range,
        kmer: u16,
        prob: f32,
        ty: EventType,
        conf: &PathConf,
    ) {
        let w = conf.win_len as usize;

        self.length = parent.length + (parent.length <= conf.win_len) as u32;
        self.fm_range = range;
        self.kmer = kmer;
        self.sa_checked = parent.sa_checked;
        self.event_types = conf.type_adds[ty as usize] | (parent.event_types >> TYPE_BITS);
        self.consec_stays = if ty == EventType::Stay {
            parent.consec_stays + 1
        } else {
            0
        };
        self.win_type_counts = parent.win_type_counts;

        if self.length > conf.win_len {
            // Window slides: the parent's tail event falls out.
            self.prob_sums[..w].copy_from_slice(&parent.prob_sums[1..=w]);
            self.prob_sums[w] = self.prob_sums[w - 1] + prob;
            self.win_prob = (self.prob_sums[w] - self.prob_sums[0]) / w as f32;
            self.win_type_counts[parent.type_tail() as usize] -= 1;
        } else {
            let len = self.length as usize;
            self.prob_sums[..len].copy_from_slice(&parent.prob_sums[..len]);
            self.prob_sums[len] = self.prob_sums[len - 1] + prob;
            self.win_prob = (self.prob_sums[len] - self.prob_sums[0]) / len as f32;
        }

        self.win_type_counts[ty as usize] += 1;
    }

    /// Sort key for the per-event dedupe pass: ranges ascending, and
    /// among equal ranges the higher window probability last, so the
    /// walk can always keep the later duplicate.
    #[inline]
    pub fn cmp_pos(&self, other: &PathState) -> std::cmp::Ordering {
        self.fm_range
            .cmp(&other.fm_range)
            .then(self.win_prob.total_cmp(&other.win_prob))
    }

    /// Whether this path's suffix-array positions should be emitted as
    /// seeds. Mid-path emission requires a unique locus and a match at
    /// the head; a path that just died (`path_ended`) may also emit a
    /// bounded repeat.
    pub fn should_report(&self, opt: &MapOpt, conf: &PathConf, path_ended: bool) -> bool {
        (self.fm_range.length() == 1
            || (path_ended
                && self.fm_range.length() <= opt.max_rep_copy as u64
                && self.match_len() as u32 >= opt.min_rep_len))
            && self.length >= opt.seed_len
            && (path_ended || self.type_head(conf) == EventType::Match)
            && (path_ended
                || self.win_type_counts[EventType::Stay as usize] as f32
                    <= opt.max_stay_frac * opt.seed_len as f32)
            && self.win_prob >= opt.window_prob
    }
}
