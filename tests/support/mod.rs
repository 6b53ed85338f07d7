//! Shared scaffolding for the scenario tests in spec.md §8: a ProfileStore
//! backed entirely by in-memory vectors, and a couple of synthetic-data
//! builders.

use std::cell::RefCell;

use densicore::error::CoreError;
use densicore::profile_store::{ContigTable, ProfileStore};
use rand::rngs::StdRng;
use rand::Rng;

pub struct MemoryProfileStore {
    table: ContigTable,
    clustered: RefCell<bool>,
}

impl MemoryProfileStore {
    pub fn new(table: ContigTable) -> Self {
        MemoryProfileStore {
            table,
            clustered: RefCell::new(false),
        }
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, length_cutoff: u64) -> Result<ContigTable, CoreError> {
        let mut contig_ids = Vec::new();
        let mut coverage = Vec::new();
        let mut aux = Vec::new();
        let mut lengths = Vec::new();
        let mut colours = Vec::new();

        for i in 0..self.table.len() {
            if self.table.lengths[i] < length_cutoff {
                continue;
            }
            contig_ids.push(self.table.contig_ids[i].clone());
            coverage.push(self.table.coverage[i].clone());
            aux.push(self.table.aux[i]);
            lengths.push(self.table.lengths[i]);
            colours.push(self.table.colours[i]);
        }

        if coverage.is_empty() {
            return Err(CoreError::EmptyCoverageMatrix);
        }

        Ok(ContigTable {
            contig_ids,
            coverage,
            aux,
            lengths,
            colours,
        })
    }

    fn write_bins(&self, _contig_ids: &[String], _bin_ids: &[u32]) -> Result<(), CoreError> {
        Ok(())
    }

    fn mark_clustered(&self) -> Result<(), CoreError> {
        *self.clustered.borrow_mut() = true;
        Ok(())
    }

    fn is_clustered(&self) -> bool {
        *self.clustered.borrow()
    }
}

/// Standard normal sample via Box-Muller, driven by the supplied RNG.
pub fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(1e-12_f64..1.0);
    let u2: f64 = rng.gen_range(0.0_f64..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Build `n` coverage rows pointing along `direction` (a unit-free ratio
/// vector), with multiplicative per-coordinate noise and a log-normal
/// per-row depth multiplier — approximates a coverage-profile "blob" the
/// way spec.md §8's scenarios describe a spatial Gaussian in the lattice.
pub fn make_direction_blob(
    rng: &mut StdRng,
    n: usize,
    direction: &[f64],
    relative_noise: f64,
    base_depth: f64,
) -> Vec<Vec<f64>> {
    (0..n)
        .map(|_| {
            let depth = base_depth * (1.0 + 0.1 * standard_normal(rng)).max(0.1);
            direction
                .iter()
                .map(|&d| (d * depth * (1.0 + relative_noise * standard_normal(rng))).max(1e-6))
                .collect()
        })
        .collect()
}

pub fn uniform_ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}_{i}")).collect()
}
