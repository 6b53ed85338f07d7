//! Partitioner: splits a candidate set by expanding monotone runs of
//! auxiliary signals, with bounded spread and standard deviation
//! (spec.md §4.4).

use std::collections::{BTreeMap, HashSet};

use crate::center_finder::CenterFinder;

pub struct Partitioner {
    pub bounce: f64,
    pub stdev_cut: f64,
    pub spread: f64,
}

impl Partitioner {
    pub fn new(bounce: f64, stdev_cut: f64, spread: f64) -> Self {
        Partitioner {
            bounce,
            stdev_cut,
            spread,
        }
    }

    /// Expand a selection left and right from `start_index` (a position in
    /// `vals`) while the augmented set's stdev stays under `stdev_cut` and
    /// the candidate stays within `spread` of the starting value. Returns
    /// positions into `vals`, sorted ascending.
    pub fn expand(&self, start_index: usize, vals: &[f64]) -> Vec<usize> {
        let start_val = vals[start_index];
        let mut sorted_indices: Vec<usize> = (0..vals.len()).collect();
        sorted_indices.sort_by(|&a, &b| vals[a].partial_cmp(&vals[b]).unwrap());

        let start_pos = sorted_indices
            .iter()
            .position(|&i| i == start_index)
            .expect("start_index must be within vals");

        let mut lower = start_pos;
        let mut upper = start_pos;
        let max_pos = vals.len() - 1;

        let mut value_store = vec![start_val];
        let mut ret = vec![start_index];

        let mut do_lower = true;
        let mut do_upper = true;
        while do_lower || do_upper {
            if do_lower {
                do_lower = false;
                if lower > 0 {
                    let cand = vals[sorted_indices[lower - 1]];
                    if (cand - start_val).abs() < self.spread {
                        let mut trial = value_store.clone();
                        trial.push(cand);
                        if stdev(&trial) < self.stdev_cut {
                            value_store = trial;
                            lower -= 1;
                            ret.push(sorted_indices[lower]);
                            do_lower = true;
                        }
                    }
                }
            }
            if do_upper {
                do_upper = false;
                if upper < max_pos {
                    let cand = vals[sorted_indices[upper + 1]];
                    if (cand - start_val).abs() < self.spread {
                        let mut trial = value_store.clone();
                        trial.push(cand);
                        if stdev(&trial) < self.stdev_cut {
                            value_store = trial;
                            upper += 1;
                            ret.push(sorted_indices[upper]);
                            do_upper = true;
                        }
                    }
                }
            }
        }

        ret.sort_unstable();
        ret
    }

    /// Repeatedly locate the densest remaining value and expand around it,
    /// emitting partitions as positions into the original `vals` slice.
    /// Stops once fewer than 3 values remain; the tail is emitted whole.
    pub fn partition_vals(&self, vals: &[f64]) -> Vec<Vec<usize>> {
        let cf = CenterFinder::new(self.bounce);
        let mut remaining: Vec<usize> = (0..vals.len()).collect();
        let mut partitions = Vec::new();

        while remaining.len() > 2 {
            let working: Vec<f64> = remaining.iter().map(|&i| vals[i]).collect();
            let c_index = cf.find_center(&working);
            let expanded = self.expand(c_index, &working);

            let expanded_set: HashSet<usize> = expanded.iter().copied().collect();
            let partition: Vec<usize> = expanded.iter().map(|&pos| remaining[pos]).collect();
            partitions.push(partition);

            remaining = remaining
                .iter()
                .enumerate()
                .filter(|(pos, _)| !expanded_set.contains(pos))
                .map(|(_, &orig)| orig)
                .collect();
        }

        if !remaining.is_empty() {
            partitions.push(remaining);
        }
        partitions
    }

    /// Compose the k-mer partition with the normalized-coverage partition,
    /// per spec.md §4.4's "Composition" clause: partition once on each axis
    /// over the full candidate set, then take the Cartesian intersection of
    /// the two partitions (groups sharing no member are simply absent from
    /// the result).
    ///
    /// `c_vals` must already be normalized to `[0, 1]` (spec.md §4.4
    /// "Input"); the caller normalizes once, globally, over the whole
    /// candidate set before calling this.
    pub fn partition(
        &self,
        indices: &[usize],
        k_vals: &[f64],
        c_vals: &[f64],
    ) -> Vec<Vec<usize>> {
        let k_groups = self.partition_vals(k_vals);
        let c_groups = self.partition_vals(c_vals);

        let mut k_group_id = vec![0usize; indices.len()];
        for (gid, group) in k_groups.iter().enumerate() {
            for &pos in group {
                k_group_id[pos] = gid + 1;
            }
        }

        let mut buckets: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (gid, group) in c_groups.iter().enumerate() {
            for &pos in group {
                buckets
                    .entry((k_group_id[pos], gid + 1))
                    .or_default()
                    .push(indices[pos]);
            }
        }

        buckets.into_values().collect()
    }
}

/// Center-then-scale a candidate set's values into `[0, 1]`: subtract the
/// minimum, then divide by the new maximum (left untouched when it is zero).
pub fn normalize_unit(vals: &[f64]) -> Vec<f64> {
    let min = vals.iter().cloned().fold(f64::MAX, f64::min);
    let shifted: Vec<f64> = vals.iter().map(|v| v - min).collect();
    let max = shifted.iter().cloned().fold(f64::MIN, f64::max);
    if max != 0.0 {
        shifted.iter().map(|v| v / max).collect()
    } else {
        shifted
    }
}

fn stdev(vals: &[f64]) -> f64 {
    let n = vals.len() as f64;
    let mean = vals.iter().sum::<f64>() / n;
    let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_respects_stdev_and_spread_bounds() {
        let p = Partitioner::new(0.1, 0.05, 0.15);
        let vals = vec![0.5, 0.51, 0.49, 0.9, 0.1];
        let expanded = p.expand(0, &vals);
        let selected: Vec<f64> = expanded.iter().map(|&i| vals[i]).collect();
        assert!(stdev(&selected) <= 0.05 + 1e-9);
        let start = vals[0];
        for &v in &selected {
            assert!((v - start).abs() < 0.15 + 1e-9);
        }
    }

    #[test]
    fn partition_vals_is_deterministic_across_repeated_calls() {
        let p = Partitioner::new(0.1, 0.04, 0.15);
        let vals = vec![0.1, 0.12, 0.11, 0.9, 0.91, 0.5, 0.52];
        let a = p.partition_vals(&vals);
        let b = p.partition_vals(&vals);
        assert_eq!(a, b);
    }

    #[test]
    fn separates_two_distinct_clusters() {
        let p = Partitioner::new(0.1, 0.04, 0.15);
        let mut vals = vec![0.1; 10];
        vals.extend(vec![0.9; 10]);
        let partitions = p.partition_vals(&vals);
        assert!(partitions.len() >= 2);
    }

    #[test]
    fn normalize_unit_scales_into_zero_one() {
        let vals = vec![5.0, 10.0, 15.0, 20.0];
        let n = normalize_unit(&vals);
        assert!((n[0] - 0.0).abs() < 1e-9);
        assert!((n.last().unwrap() - 1.0).abs() < 1e-9);
    }

    /// Two k-groups, each split further by coverage-z: rows agreeing on
    /// k-mer signal but differing on coverage-z (spec.md §8 Scenario 3)
    /// must land in separate partitions, while the full Cartesian product
    /// still accounts for every input row exactly once.
    #[test]
    fn partition_intersects_kmer_and_coverage_axes() {
        let p = Partitioner::new(0.1, 0.04, 0.15);
        let indices: Vec<usize> = (0..20).collect();

        let mut k_vals = vec![0.1; 10];
        k_vals.extend(vec![0.9; 10]);

        let mut c_vals = vec![0.1; 5];
        c_vals.extend(vec![0.9; 5]);
        c_vals.extend(vec![0.1; 5]);
        c_vals.extend(vec![0.9; 5]);

        let partitions = p.partition(&indices, &k_vals, &c_vals);

        // every row appears in exactly one partition
        let mut seen: HashSet<usize> = HashSet::new();
        for part in &partitions {
            for &i in part {
                assert!(seen.insert(i), "row {i} appeared in more than one partition");
            }
        }
        assert_eq!(seen, indices.iter().copied().collect::<HashSet<usize>>());

        // differing on coverage-z alone, within the same k-group, must split
        assert!(
            partitions.len() >= 4,
            "expected the two k-groups each split by coverage-z, got {} partitions",
            partitions.len()
        );
        for part in &partitions {
            let ks: Vec<f64> = part.iter().map(|&i| k_vals[i]).collect();
            let cs: Vec<f64> = part.iter().map(|&i| c_vals[i]).collect();
            assert!(stdev(&ks) < 1e-9, "partition mixes k-groups: {ks:?}");
            assert!(stdev(&cs) < 1e-9, "partition mixes coverage-groups: {cs:?}");
        }
    }
}
