use clap::Parser;

use densicore::cli::Args;
use densicore::config::Config;
use densicore::profile_store::CsvProfileStore;
use densicore::ClusterEngine;

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(args) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), densicore::CoreError> {
    let base_config = match &args.config {
        Some(path) => Config::from_overlay_json(path)?,
        None => Config::default(),
    };
    let config = args.apply_overrides(base_config);

    let store = CsvProfileStore::new(args.input.clone(), args.output.clone());
    let engine = ClusterEngine::new(config);

    let summary = engine.make_cores(&store, args.min_length, args.force)?;

    println!(
        "binned {}/{} contigs ({:.2}%) into {} bins",
        summary.contigs_binned, summary.total_contigs, summary.percent_binned, summary.bin_count
    );

    Ok(())
}
