// nanoseed/src/aligner.rs
//
// The event-driven beam search. Each incoming event expands the live
// path population through the reference's suffix-array interval space:
// existing paths extend by stay or match, duplicates collapsing onto
// one interval are pruned, and fresh sources are seeded into every
// uncovered stretch of a strong k-mer's range. Paths that become
// specific and long enough emit seeds to the tracker.

use crate::fm_index::FmIndex;
use crate::map_opt::{MapOpt, ProbThresholds};
use crate::model::{KmerModel, KmerTable};
use crate::path::{EventType, PathConf, PathState};
use crate::range::Range;
use crate::seed::{Seed, SeedTracker};

/// Per-read lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Inactive,
    Mapping,
    Success,
    Failure,
}

/// Terminal outcome surfaced by `add_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Mapped,
    Unmapped,
}

/// One read's aligner: owns the double-buffered path population and
/// drives the per-event beam step. The FM-index and k-mer model are
/// shared read-only; concurrent reads each get their own `Aligner`.
pub struct Aligner<'a, F: FmIndex, M: KmerModel, T: SeedTracker> {
    fmi: &'a F,
    model: &'a M,
    tracker: T,
    opt: MapOpt,
    thresholds: ProbThresholds,
    path_conf: PathConf,
    kmer_ranges: KmerTable,
    prev_paths: Vec<PathState>,
    next_paths: Vec<PathState>,
    sources_added: Vec<bool>,
    prev_size: usize,
    event_i: u32,
    reset_requested: bool,
    state: MapState,
}

impl<'a, F: FmIndex, M: KmerModel, T: SeedTracker> Aligner<'a, F, M, T> {
    /// Validate the configuration and allocate both path arenas. All
    /// per-event memory is claimed here; the steady state allocates
    /// nothing.
    pub fn new(fmi: &'a F, model: &'a M, tracker: T, opt: MapOpt) -> Result<Self, String> {
        opt.validate()?;
        let thresholds = ProbThresholds::parse(&opt.event_probs)?;

        let k = model.kmer_len();
        if k == 0 || k > 8 {
            return Err(format!("unsupported k-mer length: {k}"));
        }
        if model.kmer_count() != 1u32 << (2 * k) {
            return Err(format!(
                "k-mer count {} inconsistent with k-mer length {}",
                model.kmer_count(),
                k
            ));
        }

        let path_conf = PathConf::new(opt.seed_len);
        let kmer_ranges = KmerTable::build(fmi, model);
        let max_paths = opt.max_paths as usize;

        Ok(Aligner {
            fmi,
            model,
            tracker,
            thresholds,
            path_conf,
            kmer_ranges,
            prev_paths: (0..max_paths).map(|_| PathState::new(opt.seed_len)).collect(),
            next_paths: (0..max_paths).map(|_| PathState::new(opt.seed_len)).collect(),
            sources_added: vec![false; model.kmer_count() as usize],
            prev_size: 0,
            event_i: 0,
            reset_requested: false,
            state: MapState::Inactive,
            opt,
        })
    }

    /// Start mapping a new read; drops all live paths and tracker state.
    pub fn new_read(&mut self) {
        self.prev_size = 0;
        self.event_i = 0;
        self.reset_requested = false;
        self.sources_added.fill(false);
        self.tracker.reset();
        self.state = MapState::Mapping;
        log::debug!("starting new read");
    }

    /// Consume one event's k-mer probability vector and run a beam
    /// step. Returns a terminal decision when the read just mapped or
    /// failed; `None` while mapping continues. Cancellation
    /// (`request_reset`) and the event cap are honored here, at the
    /// event boundary, never mid-step.
    pub fn add_event(&mut self, kmer_probs: &[f32]) -> Option<Decision> {
        if self.state != MapState::Mapping {
            log::warn!("event ignored: aligner is {:?}", self.state);
            return None;
        }
        if self.reset_requested || self.event_i >= self.opt.max_events_proc {
            log::debug!(
                "read failed at event {} ({})",
                self.event_i,
                if self.reset_requested { "reset" } else { "event cap" }
            );
            self.reset_requested = false;
            self.state = MapState::Failure;
            return Some(Decision::Unmapped);
        }
        debug_assert_eq!(kmer_probs.len(), self.kmer_ranges.len());

        let mut next_len = self.extend_paths(kmer_probs);
        next_len = self.branch_sources(kmer_probs, next_len);
        next_len = self.fill_sources(kmer_probs, next_len);

        std::mem::swap(&mut self.prev_paths, &mut self.next_paths);
        self.prev_size = next_len;
        self.event_i += 1;

        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "event {}: {} slots, {} live",
                self.event_i,
                self.prev_size,
                self.paths().count()
            );
        }

        if self.tracker.is_confident() {
            log::debug!("read mapped after {} events", self.event_i);
            self.state = MapState::Success;
            return Some(Decision::Mapped);
        }
        None
    }

    /// Phase 1: extend every valid path by stay and by each base whose
    /// probability clears the path's width-dependent threshold. A path
    /// producing no child is about to die; give it one last chance to
    /// report before it does.
    fn extend_paths(&mut self, kmer_probs: &[f32]) -> usize {
        let fmi = self.fmi;
        let model = self.model;
        let event_i = self.event_i;
        let max = self.opt.max_paths as usize;
        let prev_size = self.prev_size;
        let Aligner {
            prev_paths,
            next_paths,
            tracker,
            opt,
            path_conf,
            thresholds,
            ..
        } = self;

        let mut cursor = 0usize;
        'prev: for pi in 0..prev_size {
            let prev = &mut prev_paths[pi];
            if !prev.is_valid() {
                continue;
            }

            let mut child_found = false;
            let thresh = thresholds.get(prev.fm_range.length());

            if prev.consec_stays < opt.max_consec_stay
                && kmer_probs[prev.kmer as usize] >= thresh
            {
                next_paths[cursor].make_child(
                    prev,
                    prev.fm_range,
                    prev.kmer,
                    kmer_probs[prev.kmer as usize],
                    EventType::Stay,
                    path_conf,
                );
                child_found = true;
                cursor += 1;
                if cursor == max {
                    break 'prev;
                }
            }

            for b in 0..4u8 {
                let next_kmer = model.get_neighbor(prev.kmer, b);
                let prob = kmer_probs[next_kmer as usize];
                if prob < thresh {
                    continue;
                }
                let next_range =
                    fmi.get_neighbor(prev.fm_range, model.get_last_base(next_kmer));
                if !next_range.is_valid() {
                    continue;
                }
                next_paths[cursor].make_child(
                    prev,
                    next_range,
                    next_kmer,
                    prob,
                    EventType::Match,
                    path_conf,
                );
                child_found = true;
                cursor += 1;
                if cursor == max {
                    break;
                }
            }

            if !child_found && !prev.sa_checked {
                Self::update_seeds(opt, path_conf, fmi, tracker, prev, event_i, true);
            }

            if cursor == max {
                break 'prev;
            }
        }
        cursor
    }

    /// Phase 2: sort the children by interval, collapse duplicates onto
    /// the highest-probability survivor, and seed sources into every
    /// gap of each represented k-mer's full range that no child covers.
    fn branch_sources(&mut self, kmer_probs: &[f32], next_len: usize) -> usize {
        if next_len == 0 {
            return 0;
        }
        let fmi = self.fmi;
        let model = self.model;
        let event_i = self.event_i;
        let max = self.opt.max_paths as usize;
        let Aligner {
            next_paths,
            tracker,
            opt,
            path_conf,
            thresholds,
            kmer_ranges,
            sources_added,
            ..
        } = self;

        let (children, tail) = next_paths.split_at_mut(next_len);
        children.sort_unstable_by(|a, b| a.cmp_pos(b));

        let source_prob = thresholds.source();
        let mut cursor = 0usize;
        let mut prev_kmer = model.kmer_count();
        let mut unchecked = Range::INVALID;

        for i in 0..next_len {
            let kmer = children[i].kmer;
            let prob = kmer_probs[kmer as usize];

            // First child of this k-mer: seed the stretch left of it.
            if kmer as u32 != prev_kmer && next_len + cursor < max && prob >= source_prob {
                sources_added[kmer as usize] = true;
                let full = kmer_ranges.get(kmer);
                if children[i].fm_range.start > full.start {
                    tail[cursor].make_source(
                        Range::new(full.start, children[i].fm_range.start - 1),
                        kmer,
                        prob,
                    );
                    cursor += 1;
                }
                unchecked = Range::new(children[i].fm_range.end + 1, full.end);
            }
            prev_kmer = kmer as u32;

            // Duplicate intervals: the sort puts the best path last.
            if i + 1 < next_len && children[i].fm_range == children[i + 1].fm_range {
                children[i].invalidate();
                continue;
            }

            // Seed the stretch right of this child, clipped at the next
            // child of the same k-mer.
            if next_len + cursor < max && prob >= source_prob {
                let mut source_range = unchecked;
                if i + 1 < next_len && kmer == children[i + 1].kmer {
                    let nxt = children[i + 1].fm_range;
                    if nxt.start == 0 {
                        source_range = Range::INVALID;
                    } else {
                        source_range.end = nxt.start - 1;
                    }
                    if unchecked.start <= nxt.end {
                        unchecked.start = nxt.end + 1;
                    }
                }
                if source_range.is_valid() {
                    tail[cursor].make_source(source_range, kmer, prob);
                    cursor += 1;
                }
            }

            Self::update_seeds(opt, path_conf, fmi, tracker, &mut children[i], event_i, false);
        }
        next_len + cursor
    }

    /// Phase 3: k-mers with no live path at all get a source covering
    /// their whole range; stale gap markers are cleared on the way.
    fn fill_sources(&mut self, kmer_probs: &[f32], mut next_len: usize) -> usize {
        let max = self.opt.max_paths as usize;
        let source_prob = self.thresholds.source();
        let Aligner {
            next_paths,
            kmer_ranges,
            sources_added,
            ..
        } = self;

        for kmer in 0..kmer_ranges.len() {
            if next_len == max {
                break;
            }
            let range = kmer_ranges.get(kmer as u16);
            if !sources_added[kmer] && kmer_probs[kmer] >= source_prob && range.is_valid() {
                next_paths[next_len].make_source(range, kmer as u16, kmer_probs[kmer]);
                next_len += 1;
            } else {
                sources_added[kmer] = false;
            }
        }
        next_len
    }

    /// Emit one seed per suffix-array position of a reporting path.
    /// Reference coordinates are flipped so read and reference advance
    /// in the same direction.
    fn update_seeds(
        opt: &MapOpt,
        conf: &PathConf,
        fmi: &F,
        tracker: &mut T,
        path: &mut PathState,
        event_i: u32,
        path_ended: bool,
    ) {
        if path.sa_checked || !path.should_report(opt, conf, path_ended) {
            return;
        }
        path.sa_checked = true;

        let read_end = event_i - path_ended as u32;
        let match_len = path.match_len() as u64;
        for s in path.fm_range.start..=path.fm_range.end {
            let ref_end = fmi.size() - fmi.sa(s) + 1;
            tracker.add_seed(Seed {
                read_end,
                read_window: opt.seed_len,
                ref_start: ref_end - match_len + 1,
                ref_end,
                prob: path.win_prob,
            });
        }
    }

    /// Ask the aligner to abandon the read; honored at the next
    /// `add_event`.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    pub fn end_reset(&mut self) {
        self.reset_requested = false;
    }

    pub fn is_resetting(&self) -> bool {
        self.reset_requested
    }

    /// Account for `n` events lost upstream (normaliser overflow): the
    /// live population is stale, so drop it and advance the clock.
    pub fn skip_events(&mut self, n: u32) {
        self.event_i += n;
        self.prev_size = 0;
    }

    pub fn get_state(&self) -> MapState {
        self.state
    }

    pub fn finished(&self) -> bool {
        matches!(self.state, MapState::Success | MapState::Failure)
    }

    pub fn event_index(&self) -> u32 {
        self.event_i
    }

    /// Events spanned by `n` nucleotides of reference.
    pub fn nucl_to_events(&self, n: u32) -> u32 {
        n + 1 - self.model.kmer_len()
    }

    /// The valid paths of the current population.
    pub fn paths(&self) -> impl Iterator<Item = &PathState> {
        self.prev_paths[..self.prev_size]
            .iter()
            .filter(|p| p.is_valid())
    }

    pub fn kmer_ranges(&self) -> &KmerTable {
        &self.kmer_ranges
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }
}
