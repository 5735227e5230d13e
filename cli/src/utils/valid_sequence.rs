//! Valid-sequence derivation and positional aggregates.

use crate::models::{SequenceAnalysis, SequenceStats};
use crate::utils::round2;

/// Derive the valid sequence from run sums.
///
/// Each element is kept when the next run is strictly larger in magnitude,
/// otherwise it takes the next run's magnitude with its own sign. The last
/// element has no lookahead and is always 0. Fewer than two runs yield an
/// empty sequence.
pub fn derive_valid(runs: &[f64]) -> Vec<f64> {
    if runs.len() < 2 {
        return Vec::new();
    }

    let mut valid = Vec::with_capacity(runs.len());
    for pair in runs.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if next.abs() > current.abs() {
            valid.push(current);
        } else if current >= 0.0 {
            valid.push(next.abs());
        } else {
            valid.push(-next.abs());
        }
    }
    valid.push(0.0);
    valid
}

/// Absolute-value sums over halves and quarters, split with integer division.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionalAggregates {
    pub len: usize,
    pub first_half: f64,
    pub second_half: f64,
    pub blocks: [f64; 4],
}

pub fn positional_aggregates(seq: &[f64]) -> PositionalAggregates {
    let len = seq.len();
    let abs_sum = |range: std::ops::Range<usize>| round2(seq[range].iter().map(|v| v.abs()).sum());

    let half = len / 2;
    let (q1, q2, q3) = (len / 4, len / 2, 3 * len / 4);

    PositionalAggregates {
        len,
        first_half: abs_sum(0..half),
        second_half: abs_sum(half..len),
        blocks: [
            abs_sum(0..q1),
            abs_sum(q1..q2),
            abs_sum(q2..q3),
            abs_sum(q3..len),
        ],
    }
}

/// Sums of the strictly positive and strictly negative elements.
pub fn signed_sums(seq: &[f64]) -> (f64, f64) {
    let positive = seq.iter().filter(|v| **v > 0.0).sum();
    let negative = seq.iter().filter(|v| **v < 0.0).sum();
    (round2(positive), round2(negative))
}

pub fn sequence_stats(seq: &[f64]) -> SequenceStats {
    let positional = positional_aggregates(seq);
    let (pos_sum, neg_sum) = signed_sums(seq);
    SequenceStats {
        len: positional.len,
        sum: round2(seq.iter().sum()),
        abs_sum: round2(seq.iter().map(|v| v.abs()).sum()),
        pos_sum,
        neg_sum,
        first_half: positional.first_half,
        second_half: positional.second_half,
        block1: positional.blocks[0],
        block2: positional.blocks[1],
        block3: positional.blocks[2],
        block4: positional.blocks[3],
    }
}

/// Bundle runs with their valid sequence and both sets of stats.
pub fn analyze_sequence(runs: Vec<f64>) -> SequenceAnalysis {
    let valid = derive_valid(&runs);
    SequenceAnalysis {
        continuous_stats: sequence_stats(&runs),
        valid_stats: sequence_stats(&valid),
        continuous: runs,
        valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_valid_example() {
        assert_eq!(derive_valid(&[3.0, -4.0, 4.0]), vec![3.0, -4.0, 0.0]);
    }

    #[test]
    fn test_derive_valid_sign_matching() {
        // 5 vs -2: magnitude not larger, keep sign of 5
        // -2 vs 1: not larger, keep sign of -2
        assert_eq!(derive_valid(&[5.0, -2.0, 1.0, -7.0]), vec![2.0, -1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_derive_valid_short_inputs() {
        assert!(derive_valid(&[]).is_empty());
        assert!(derive_valid(&[1.5]).is_empty());
        assert_eq!(derive_valid(&[1.0, -2.0]), vec![1.0, 0.0]);
    }

    #[test]
    fn test_valid_last_element_is_zero() {
        let runs = [0.3, -1.2, 4.4, -0.1, 0.0, -9.9, 2.0];
        let valid = derive_valid(&runs);
        assert_eq!(valid.len(), runs.len());
        assert_eq!(valid.last().copied(), Some(0.0));
    }

    #[test]
    fn test_positional_aggregates_example() {
        let agg = positional_aggregates(&[3.0, -4.0, 0.0]);
        assert_eq!(agg.len, 3);
        assert_eq!(agg.first_half, 3.0);
        assert_eq!(agg.second_half, 4.0);
        // quarters at 0, 1, 2
        assert_eq!(agg.blocks, [0.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_positional_aggregates_empty() {
        let agg = positional_aggregates(&[]);
        assert_eq!(agg, PositionalAggregates::default());
        assert_eq!(sequence_stats(&[]), SequenceStats::default());
    }

    #[test]
    fn test_blocks_cover_whole_sequence() {
        let seq = [1.0, -2.0, 3.0, -4.0, 5.0, -6.0, 7.0];
        let agg = positional_aggregates(&seq);
        let total: f64 = agg.blocks.iter().sum();
        assert_eq!(total, 28.0);
        assert_eq!(agg.first_half + agg.second_half, 28.0);
    }

    #[test]
    fn test_signed_sums_ignore_zero() {
        assert_eq!(signed_sums(&[1.25, 0.0, -0.5, 2.0, -3.0]), (3.25, -3.5));
    }

    #[test]
    fn test_analyze_sequence() {
        let analysis = analyze_sequence(vec![3.0, -4.0, 4.0]);
        assert_eq!(analysis.valid, vec![3.0, -4.0, 0.0]);
        assert_eq!(analysis.continuous_stats.sum, 3.0);
        assert_eq!(analysis.continuous_stats.abs_sum, 11.0);
        assert_eq!(analysis.valid_stats.neg_sum, -4.0);
        assert_eq!(analysis.valid_stats.pos_sum, 3.0);
    }
}
