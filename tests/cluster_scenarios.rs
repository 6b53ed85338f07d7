//! End-to-end scenarios from spec.md §8, run through the full pipeline
//! (CoordinateTransformer -> DensityMap -> Partitioner -> Bin -> BinManager)
//! via ClusterEngine, against an in-memory ProfileStore.

mod support;

use densicore::assignment::Assignment;
use densicore::density_map::DensityMap;
use densicore::profile_store::ContigTable;
use densicore::transform::CoordinateTransformer;
use densicore::{ClusterEngine, Config};
use rand::{Rng, SeedableRng};
use support::{make_direction_blob, uniform_ids, MemoryProfileStore};

fn run_scenario(table: ContigTable, config: Config) -> densicore::Summary {
    let store = MemoryProfileStore::new(table);
    let engine = ClusterEngine::new(config);
    engine.make_cores(&store, 0, false).expect("clustering should succeed")
}

#[test]
fn single_tight_blob_forms_one_dominant_bin() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let n = 500;
    let coverage = make_direction_blob(&mut rng, n, &[2.0, 1.0, 1.0, 1.0], 0.03, 40.0);

    let table = ContigTable {
        contig_ids: uniform_ids("blob", n),
        coverage,
        aux: vec![0.5; n],
        lengths: vec![10_000; n],
        colours: vec![(128, 128, 128); n],
    };

    let summary = run_scenario(table, Config::default());
    assert!(summary.bin_count >= 1, "expected at least one bin, got {}", summary.bin_count);
    assert!(
        summary.contigs_binned * 2 >= n,
        "expected a majority binned, got {}/{}",
        summary.contigs_binned,
        n
    );
}

#[test]
fn two_separated_blobs_form_two_bins() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(2);
    let n_each = 500;

    let mut coverage = make_direction_blob(&mut rng, n_each, &[3.0, 1.0, 1.0, 1.0], 0.03, 40.0);
    coverage.extend(make_direction_blob(&mut rng, n_each, &[1.0, 1.0, 1.0, 3.0], 0.03, 40.0));

    let n = coverage.len();
    let table = ContigTable {
        contig_ids: uniform_ids("blob", n),
        coverage,
        aux: vec![0.5; n],
        lengths: vec![10_000; n],
        colours: vec![(128, 128, 128); n],
    };

    let summary = run_scenario(table, Config::default());
    assert!(
        summary.bin_count >= 2,
        "expected at least two bins, got {}",
        summary.bin_count
    );
    assert!(
        summary.contigs_binned * 10 >= n * 7,
        "expected most contigs binned, got {}/{}",
        summary.contigs_binned,
        n
    );
}

#[test]
fn sparse_noise_yields_few_bins_and_terminates() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    let n = 2000;

    let mut coverage = Vec::with_capacity(n);
    for _ in 0..n {
        let row: Vec<f64> = (0..4)
            .map(|_| rng.gen_range(1.0_f64..500.0))
            .collect();
        coverage.push(row);
    }

    let table = ContigTable {
        contig_ids: uniform_ids("noise", n),
        coverage,
        aux: (0..n).map(|_| rng.gen_range(0.0_f64..1.0)).collect(),
        lengths: vec![200; n],
        colours: vec![(128, 128, 128); n],
    };

    let summary = run_scenario(table, Config::default());
    assert!(
        summary.bin_count <= 2,
        "random noise should rarely pass the quality gate, got {} bins",
        summary.bin_count
    );
}

#[test]
fn overlapping_blobs_split_by_aux_axis() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(5);
    let n_each = 500;

    // Same coverage direction for both halves, so they land on (nearly) the
    // same spatial centroid; only the auxiliary signal distinguishes them.
    let mut coverage = make_direction_blob(&mut rng, n_each, &[2.0, 1.0, 1.0, 1.0], 0.02, 40.0);
    coverage.extend(make_direction_blob(&mut rng, n_each, &[2.0, 1.0, 1.0, 1.0], 0.02, 40.0));
    let n = coverage.len();

    let mut aux = vec![0.2; n_each];
    aux.extend(vec![0.8; n_each]);

    let table = ContigTable {
        contig_ids: uniform_ids("overlap", n),
        coverage,
        aux,
        lengths: vec![10_000; n],
        colours: vec![(128, 128, 128); n],
    };

    let summary = run_scenario(table, Config::default());
    assert!(
        summary.bin_count >= 2,
        "expected the Partitioner to split the overlapping blobs along the aux axis, got {} bins",
        summary.bin_count
    );
    assert!(
        summary.contigs_binned * 10 >= n * 7,
        "expected most contigs binned, got {}/{}",
        summary.contigs_binned,
        n
    );
}

#[test]
fn longer_length_cluster_is_discovered_first() {
    // Two equal-count clusters with a 10x length difference; the
    // length-weighted stamping kernel should make the longer-length
    // cluster's column denser, so it is the one a round discovers first.
    let mut rng = rand::rngs::StdRng::seed_from_u64(6);
    let n_each = 200;
    let config = Config::default();

    let mut coverage = make_direction_blob(&mut rng, n_each, &[2.0, 1.0, 1.0, 1.0], 0.02, 40.0);
    coverage.extend(make_direction_blob(&mut rng, n_each, &[1.0, 1.0, 1.0, 2.0], 0.02, 40.0));
    let n = coverage.len();

    let mut lengths = vec![2_000_u64; n_each];
    lengths.extend(vec![20_000_u64; n_each]);

    let transformer = CoordinateTransformer::new(config.scale_factor, config.phi_max);
    let result = transformer.transform(&coverage).expect("transform should succeed");

    let assignment = vec![Assignment::Unassigned; n];
    let mut density_map = DensityMap::new(config.num_img_maps, config.scale_factor);
    density_map.populate(&result.positions, &lengths, &assignment);
    density_map.blur(config.blur_sigma);

    let (peak_value, x0, y0) = density_map.peak();
    assert!(peak_value > 0.0);

    let long_centroid = centroid_xy(&result.positions[n_each..]);
    let short_centroid = centroid_xy(&result.positions[..n_each]);

    let dist_long = dist2(x0, y0, long_centroid);
    let dist_short = dist2(x0, y0, short_centroid);
    assert!(
        dist_long < dist_short,
        "expected the initial peak to land near the longer-length cluster; peak=({x0}, {y0}) long={long_centroid:?} short={short_centroid:?}"
    );
}

fn centroid_xy(positions: &[[i64; 3]]) -> (f64, f64) {
    let n = positions.len() as f64;
    let sx: f64 = positions.iter().map(|p| p[0] as f64).sum();
    let sy: f64 = positions.iter().map(|p| p[1] as f64).sum();
    (sx / n, sy / n)
}

fn dist2(x0: i64, y0: i64, centroid: (f64, f64)) -> f64 {
    let dx = x0 as f64 - centroid.0;
    let dy = y0 as f64 - centroid.1;
    dx * dx + dy * dy
}

#[test]
fn below_threshold_blob_produces_no_bins() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(4);
    let n = 3;
    let coverage = make_direction_blob(&mut rng, n, &[2.0, 1.0, 1.0, 1.0], 0.01, 40.0);

    let table = ContigTable {
        contig_ids: uniform_ids("tiny", n),
        coverage,
        aux: vec![0.5; n],
        lengths: vec![166_667; n],
        colours: vec![(128, 128, 128); n],
    };

    let summary = run_scenario(table, Config::default());
    assert_eq!(summary.bin_count, 0);
    assert_eq!(summary.contigs_binned, 0);
}
