//! ClusterEngine: drives the round loop described in spec.md §4.6 — build
//! maps, find peak, densify column, partition, instantiate and grow a Bin,
//! decrement maps, until breakout.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::assignment::Assignment;
use crate::bin_manager::BinManager;
use crate::config::Config;
use crate::density_map::DensityMap;
use crate::error::CoreError;
use crate::partitioner::{normalize_unit, Partitioner};
use crate::profile_store::ProfileStore;
use crate::transform::CoordinateTransformer;

/// Final, user-visible report: contigs binned, bin count, and percentage
/// (spec.md §7's "progress counters and a final summary").
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    pub total_contigs: usize,
    pub contigs_binned: usize,
    pub bin_count: usize,
    pub percent_binned: f64,
}

pub struct ClusterEngine {
    config: Config,
}

impl ClusterEngine {
    pub fn new(config: Config) -> Self {
        ClusterEngine { config }
    }

    pub fn make_cores(
        &self,
        store: &dyn ProfileStore,
        length_cutoff: u64,
        force: bool,
    ) -> Result<Summary, CoreError> {
        if store.is_clustered() && !force {
            warn!("store has already been clustered once; pass --force to overwrite");
        }

        let table = store.load(length_cutoff)?;
        info!(
            "loaded {} contigs (coverage dim {})",
            table.len(),
            table.coverage_dim()
        );

        let transformer = CoordinateTransformer::new(self.config.scale_factor, self.config.phi_max);
        let transform_result = transformer.transform(&table.coverage)?;

        let n = table.len();
        let mut assignment = vec![Assignment::Unassigned; n];

        let mut density_map = DensityMap::new(self.config.num_img_maps, self.config.scale_factor);
        density_map.populate(&transform_result.positions, &table.lengths, &assignment);

        let mut bin_manager = BinManager::new(self.config.min_size, self.config.min_vol);
        let partitioner = Partitioner::new(
            self.config.bounce,
            self.config.partition_stdev_cut,
            self.config.partition_spread,
        );

        let mut num_below_cutoff = 0usize;
        let mut round_number = 0usize;

        let prog = ProgressBar::new(self.config.breakout as u64);
        prog.set_style(
            ProgressStyle::with_template("{bar:60} | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        while num_below_cutoff < self.config.breakout {
            density_map.blur(self.config.blur_sigma);
            let (peak_value, x0, y0) = density_map.peak();
            if peak_value <= 0.0 {
                info!("no remaining density; stopping after round {round_number}");
                break;
            }
            round_number += 1;

            let (xs, ys, zs) = density_map.column_densify(
                x0,
                y0,
                self.config.span,
                &table.lengths,
                self.config.blur_sigma,
            );

            let candidates = density_map.unassigned_in_box(
                (xs, ys, zs),
                self.config.span,
                2 * self.config.span,
            );

            if candidates.is_empty() {
                debug!("round {round_number}: no candidates near ({xs}, {ys}, {zs})");
                num_below_cutoff += 1;
                continue;
            }

            let partitions: Vec<Vec<usize>> = if candidates.len() == 1 {
                vec![candidates]
            } else {
                let total_bp: u64 = candidates.iter().map(|&i| table.lengths[i]).sum();
                if !bin_manager.is_good_bin(total_bp, candidates.len(), 5) {
                    self.restrict(&candidates, &mut assignment, &mut density_map, &transform_result.positions, &table.lengths);
                    num_below_cutoff += 1;
                    continue;
                }

                let k_vals: Vec<f64> = candidates.iter().map(|&i| table.aux[i]).collect();
                let raw_c_vals: Vec<f64> = candidates
                    .iter()
                    .map(|&i| transform_result.positions[i][2] as f64)
                    .collect();
                let c_vals = normalize_unit(&raw_c_vals);
                partitioner.partition(&candidates, &k_vals, &c_vals)
            };

            let mut made_good_bin_this_round = false;

            for partition in partitions {
                let live: Vec<usize> = partition
                    .into_iter()
                    .filter(|&i| assignment[i] == Assignment::Unassigned)
                    .collect();
                if live.is_empty() {
                    continue;
                }
                let total_bp: u64 = live.iter().map(|&i| table.lengths[i]).sum();

                if !bin_manager.is_good_bin(total_bp, live.len(), 5) {
                    self.restrict(&live, &mut assignment, &mut density_map, &transform_result.positions, &table.lengths);
                    num_below_cutoff += 1;
                    continue;
                }

                let bin_id = bin_manager.make_new_bin(
                    &live,
                    self.config.primary_tolerance,
                    self.config.aux_tolerance,
                );
                // Mark as binned and pull out of the density map immediately,
                // the same way `grow` retires every contig it admits — so
                // the map and the reverse index never carry a row that is no
                // longer unassigned.
                for &i in &live {
                    assignment[i] = Assignment::Binned(bin_id);
                    density_map.decrement(i, &transform_result.positions[i], &table.lengths);
                }

                let bin = bin_manager.get_mut(bin_id).expect("just inserted");
                bin.grow(
                    &mut density_map,
                    &transform_result.positions,
                    &table.lengths,
                    &table.aux,
                    &mut assignment,
                    self.config.tolerance_decay,
                );

                let bin = bin_manager.get(bin_id).expect("just inserted");
                let grown_bp = bin.total_bp(&table.lengths);
                let grown_count = bin.members.len();

                if bin_manager.is_good_bin(grown_bp, grown_count, self.config.min_size) {
                    info!(
                        "round {round_number}: bin {bin_id} accepted ({grown_count} contigs, {grown_bp} bp)"
                    );
                    num_below_cutoff = 0;
                    made_good_bin_this_round = true;
                } else {
                    // Every member was already pulled out of the density map
                    // (at seed time or during `grow`); just relabel them.
                    let members: Vec<usize> = bin.members.iter().copied().collect();
                    bin_manager.delete_bins(&[bin_id], true);
                    for &i in &members {
                        assignment[i] = Assignment::Restricted;
                    }
                    num_below_cutoff += 1;
                }
            }

            if !made_good_bin_this_round {
                debug!("round {round_number}: produced no bin passing quality");
            }

            prog.set_position(num_below_cutoff.min(self.config.breakout) as u64);
            prog.set_message(format!("round {round_number}, {} bins so far", bin_manager.bins.len()));
        }
        prog.finish_with_message(format!("{} bins after {round_number} rounds", bin_manager.bins.len()));

        if num_below_cutoff >= self.config.breakout {
            info!("stopping: breakout threshold ({}) reached", self.config.breakout);
        }

        bin_manager.save_bins();

        let mut bin_ids = vec![0u32; n];
        for &bid in &bin_manager.bin_ids() {
            let bin = bin_manager.get(bid).unwrap();
            for &i in &bin.members {
                bin_ids[i] = bid as u32;
            }
        }

        store.write_bins(&table.contig_ids, &bin_ids)?;
        store.mark_clustered()?;

        let contigs_binned = bin_ids.iter().filter(|&&b| b != 0).count();
        let bin_count = bin_manager.bins.len();
        let percent_binned = if n > 0 {
            100.0 * (contigs_binned as f64) / (n as f64)
        } else {
            0.0
        };

        info!("{contigs_binned} contigs across {bin_count} bins ({percent_binned:.2}%)");

        Ok(Summary {
            total_contigs: n,
            contigs_binned,
            bin_count,
            percent_binned,
        })
    }

    fn restrict(
        &self,
        indices: &[usize],
        assignment: &mut [Assignment],
        density_map: &mut DensityMap,
        positions: &[[i64; 3]],
        lengths: &[u64],
    ) {
        for &i in indices {
            if assignment[i] == Assignment::Unassigned {
                assignment[i] = Assignment::Restricted;
                density_map.decrement(i, &positions[i], lengths);
            }
        }
    }
}
