//! CenterFinder: the "balloon bounce" algorithm for locating the densest
//! region of a 1D value list (spec.md §4.3).

use itertools::Itertools;

pub struct CenterFinder {
    pub bounce: f64,
}

impl CenterFinder {
    pub fn new(bounce: f64) -> Self {
        CenterFinder { bounce }
    }

    /// Returns the original index of `vals` that sits in its densest region.
    pub fn find_center(&self, vals: &[f64]) -> usize {
        assert!(!vals.is_empty(), "find_center called on an empty slice");
        let n = vals.len();

        let sorted_indices: Vec<usize> = (0..n)
            .sorted_by(|&a, &b| vals[a].partial_cmp(&vals[b]).unwrap())
            .collect();

        let mut sorted_vals: Vec<f64> = sorted_indices.iter().map(|&i| vals[i]).collect();
        let first = sorted_vals[0];
        for v in sorted_vals.iter_mut() {
            *v -= first;
        }
        let last = *sorted_vals.last().unwrap();
        if last != 0.0 {
            for v in sorted_vals.iter_mut() {
                *v /= last;
            }
        }

        let mut working = vec![0.0_f64; n];

        // forward sweep
        let mut height = 0.0;
        let mut last_val = 0.0;
        for (i, &v) in sorted_vals.iter().enumerate() {
            let delta = v - last_val;
            height = reduce_via_delta(height, self.bounce, delta);
            height += self.bounce;
            working[i] = height;
            last_val = v;
        }

        // backward sweep, mirrored onto the same array
        let mut height = 0.0;
        let mut last_val = 0.0;
        let mut final_index = n - 1;
        for (i, &v) in sorted_vals.iter().enumerate().rev() {
            let delta = if last_val == 0.0 { 0.0 } else { last_val - v };
            height = reduce_via_delta(height, self.bounce, delta);
            height += self.bounce;
            working[final_index] += height;
            if final_index > 0 {
                final_index -= 1;
            }
            last_val = v;
            let _ = i;
        }

        let mut best_idx = 0;
        let mut best_val = f64::MIN;
        for (i, &v) in working.iter().enumerate() {
            if v > best_val {
                best_val = v;
                best_idx = i;
            }
        }
        sorted_indices[best_idx]
    }
}

fn reduce_via_delta(height: f64, bounce: f64, delta: f64) -> f64 {
    let perc = (delta / bounce).sqrt();
    if perc > 1.0 {
        0.0
    } else {
        height * (1.0 - perc)
    }
}
