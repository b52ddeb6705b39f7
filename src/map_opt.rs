// nanoseed/src/map_opt.rs
//
// Mapping options and the FM-length-bucketed probability thresholds.
// All knobs live in one plain struct handed to the aligner at
// construction; nothing here is mutated afterwards.

/// Options controlling the event-space beam search.
#[derive(Debug, Clone)]
pub struct MapOpt {
    /// Seed length W in events: the path statistics window, and the
    /// minimum path length before any seed may be emitted.
    pub seed_len: u32,
    /// Minimum window match count for a repeat to be emitted when a
    /// path ends at an ambiguous locus.
    pub min_rep_len: u32,
    /// Widest FM-interval a path may still report from when it ends.
    pub max_rep_copy: u32,
    /// Capacity of each path buffer.
    pub max_paths: u32,
    /// Fraction of the window that may be stays for mid-path emission.
    pub max_stay_frac: f32,
    /// Longest permitted run of consecutive stay events.
    pub max_consec_stay: u32,
    /// Reserved: the event-type machine carries skip/ignore slots but
    /// the seed predicate does not yet consult these.
    pub max_ignores: u32,
    pub max_skips: u32,
    /// Minimum window-mean probability for seed emission.
    pub window_prob: f32,
    /// Threshold string, e.g. "0.025_100-0.1_5-0.3"; see
    /// [`ProbThresholds::parse`].
    pub event_probs: String,
    /// Hard cap on events consumed per read before giving up.
    pub max_events_proc: u32,
}

impl Default for MapOpt {
    fn default() -> Self {
        MapOpt {
            seed_len: 22,
            min_rep_len: 0,
            max_rep_copy: 50,
            max_paths: 10000,
            max_stay_frac: 0.5,
            max_consec_stay: 8,
            max_ignores: 0,
            max_skips: 0,
            window_prob: 0.55,
            event_probs: "0.025_100-0.1_5-0.3".to_string(),
            max_events_proc: 30000,
        }
    }
}

impl MapOpt {
    /// Check the option set before the aligner is built. The packed
    /// event-type history needs 2*(W-1) bits of a u64, bounding W.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_paths == 0 {
            return Err("max_paths must be positive".to_string());
        }
        if self.seed_len < 2 {
            return Err(format!("seed_len must be at least 2: {}", self.seed_len));
        }
        if self.seed_len > 33 {
            return Err(format!(
                "seed_len too large for packed event history: {}",
                self.seed_len
            ));
        }
        if !(0.0..=1.0).contains(&self.max_stay_frac) {
            return Err(format!(
                "max_stay_frac must be in [0,1]: {}",
                self.max_stay_frac
            ));
        }
        Ok(())
    }
}

/// Per-event probability thresholds bucketed by FM-interval length.
///
/// Parsed from `p0_L1-p1_L2-p2_..._Lk-pk`: `p0` applies to intervals
/// wider than `L1` and doubles as the source threshold; each later pair
/// tightens the requirement as the interval narrows, falling through to
/// `pk` at the narrowest. A path in a wide (ambiguous) interval is cheap
/// to keep alive; one closing in on a unique locus must keep earning it.
#[derive(Debug, Clone)]
pub struct ProbThresholds {
    lengths: Vec<u64>,
    threshes: Vec<f32>,
}

impl ProbThresholds {
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut parts = s.split('_');
        let head = parts.next().unwrap_or("");
        let p0 = head
            .parse::<f32>()
            .map_err(|_| format!("invalid baseline threshold '{head}' in '{s}'"))?;

        let mut lengths = Vec::new();
        let mut threshes = vec![p0];
        let mut prev_prob = p0;
        for bucket in parts {
            let (len_s, prob_s) = bucket
                .split_once('-')
                .ok_or_else(|| format!("expected LENGTH-PROB bucket, got '{bucket}' in '{s}'"))?;
            let len = len_s
                .parse::<u64>()
                .map_err(|_| format!("invalid bucket length '{len_s}' in '{s}'"))?;
            let prob = prob_s
                .parse::<f32>()
                .map_err(|_| format!("invalid bucket threshold '{prob_s}' in '{s}'"))?;
            if let Some(&prev) = lengths.last() {
                if len >= prev {
                    return Err(format!(
                        "bucket lengths must strictly decrease: {prev} then {len} in '{s}'"
                    ));
                }
            }
            if prob < prev_prob {
                return Err(format!(
                    "thresholds must not loosen as intervals narrow: '{s}'"
                ));
            }
            prev_prob = prob;
            lengths.push(len);
            threshes.push(prob);
        }

        Ok(ProbThresholds { lengths, threshes })
    }

    /// Minimum per-event probability for extending a path whose current
    /// FM-interval has `fm_length` positions.
    #[inline]
    pub fn get(&self, fm_length: u64) -> f32 {
        let mut idx = 0;
        for &len in &self.lengths {
            if fm_length > len {
                break;
            }
            idx += 1;
        }
        self.threshes[idx]
    }

    /// Threshold for seeding a fresh path at a k-mer's full range.
    #[inline]
    pub fn source(&self) -> f32 {
        self.threshes[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let opt = MapOpt::default();
        assert_eq!(opt.seed_len, 22);
        assert_eq!(opt.max_paths, 10000);
        assert_eq!(opt.max_consec_stay, 8);
        assert!(opt.validate().is_ok());
        assert!(ProbThresholds::parse(&opt.event_probs).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let mut opt = MapOpt {
            max_paths: 0,
            ..MapOpt::default()
        };
        assert!(opt.validate().is_err(), "max_paths=0");

        opt = MapOpt {
            seed_len: 1,
            ..MapOpt::default()
        };
        assert!(opt.validate().is_err(), "seed_len<2");

        opt = MapOpt {
            seed_len: 40,
            ..MapOpt::default()
        };
        assert!(opt.validate().is_err(), "history would overflow");

        opt = MapOpt {
            max_stay_frac: 1.5,
            ..MapOpt::default()
        };
        assert!(opt.validate().is_err(), "stay fraction out of range");
    }

    #[test]
    fn test_parse_baseline_only() {
        let t = ProbThresholds::parse("0.5").unwrap();
        assert_eq!(t.source(), 0.5);
        assert_eq!(t.get(1), 0.5);
        assert_eq!(t.get(1_000_000), 0.5);
    }

    #[test]
    fn test_parse_buckets_and_lookup() {
        let t = ProbThresholds::parse("0.025_100-0.1_5-0.3").unwrap();
        assert_eq!(t.source(), 0.025);
        assert_eq!(t.get(1000), 0.025, "wider than every bucket");
        assert_eq!(t.get(101), 0.025);
        assert_eq!(t.get(100), 0.1, "at the boundary the bucket applies");
        assert_eq!(t.get(6), 0.1);
        assert_eq!(t.get(5), 0.3);
        assert_eq!(t.get(1), 0.3, "narrowest falls through to the last");
    }

    #[test]
    fn test_lookup_monotone_in_length() {
        let t = ProbThresholds::parse("0.02_500-0.05_50-0.2_3-0.4").unwrap();
        let mut prev = f32::NEG_INFINITY;
        for len in (1..=600).rev() {
            let p = t.get(len);
            assert!(
                p >= prev,
                "threshold loosened as interval narrowed at {len}"
            );
            prev = p;
        }
    }

    #[test]
    fn test_parse_negative_baseline() {
        // Log-probability style thresholds are legal.
        let t = ProbThresholds::parse("-3.75_100--2.25").unwrap();
        assert_eq!(t.source(), -3.75);
        assert_eq!(t.get(10), -2.25);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ProbThresholds::parse("").is_err());
        assert!(ProbThresholds::parse("abc").is_err());
        assert!(ProbThresholds::parse("0.5_x-0.1").is_err());
        assert!(ProbThresholds::parse("0.5_10-y").is_err());
        assert!(ProbThresholds::parse("0.5_10").is_err(), "bucket missing prob");
        assert!(
            ProbThresholds::parse("0.5_10-0.6_20-0.7").is_err(),
            "lengths must decrease"
        );
        assert!(
            ProbThresholds::parse("0.5_10-0.4").is_err(),
            "threshold loosened"
        );
    }
}
