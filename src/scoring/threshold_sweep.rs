//! Threshold sweep (supplemented feature, SPEC_FULL.md "Supplemented
//! Features" #1). A pure analysis helper over a completed cycle's scored
//! candidates: for a range of candidate alert thresholds, reports how many
//! finalists would have cleared each one. Useful for tuning
//! `high_conviction_threshold` offline without rerunning a cycle.

/// Anything with a final score; implemented by `Candidate` callers via a
/// small adapter closure rather than a trait bound on `Candidate` itself, so
/// this module stays decoupled from `model`.
pub struct ScoredEntry {
    pub address: String,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdBucket {
    pub threshold: f64,
    pub would_pass: usize,
}

/// Sweeps `thresholds` (expected ascending, not required) against `entries`,
/// counting how many entries clear each one.
pub fn sweep(entries: &[ScoredEntry], thresholds: &[f64]) -> Vec<ThresholdBucket> {
    thresholds
        .iter()
        .map(|&threshold| ThresholdBucket {
            threshold,
            would_pass: entries.iter().filter(|e| e.final_score >= threshold).count(),
        })
        .collect()
}

/// Default sweep points mirroring the conviction bands (§6).
pub const DEFAULT_SWEEP_POINTS: [f64; 4] = [35.0, 60.0, 70.0, 80.0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_counts_entries_clearing_each_threshold() {
        let entries = vec![
            ScoredEntry { address: "a".into(), final_score: 82.0 },
            ScoredEntry { address: "b".into(), final_score: 65.0 },
            ScoredEntry { address: "c".into(), final_score: 40.0 },
        ];
        let buckets = sweep(&entries, &DEFAULT_SWEEP_POINTS);
        assert_eq!(buckets[0].would_pass, 3); // >= 35
        assert_eq!(buckets[1].would_pass, 2); // >= 60
        assert_eq!(buckets[2].would_pass, 1); // >= 70
        assert_eq!(buckets[3].would_pass, 1); // >= 80
    }

    #[test]
    fn empty_entries_yield_zero_everywhere() {
        let buckets = sweep(&[], &DEFAULT_SWEEP_POINTS);
        assert!(buckets.iter().all(|b| b.would_pass == 0));
    }
}
