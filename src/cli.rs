//! Command-line surface (spec.md §7), grounded on the teacher's clap-derive
//! `Args` struct.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "densicore", about = "Density-based contig clustering engine")]
pub struct Args {
    /// Path to the input contig profile (CSV, optionally gzip-compressed).
    #[arg(long)]
    pub input: PathBuf,

    /// Path to write bin assignments to.
    #[arg(long)]
    pub output: PathBuf,

    /// Discard contigs shorter than this many base pairs before clustering.
    #[arg(long, default_value_t = 0)]
    pub min_length: u64,

    /// Re-cluster even if the store carries a prior `.clustered` marker.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Optional JSON file overlaying non-default tunables on top of the
    /// built-in defaults (spec.md §6).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Side length of the density lattice.
    #[arg(long)]
    pub scale_factor: Option<i64>,

    /// Number of orthogonal projection views stamped per contig.
    #[arg(long)]
    pub num_img_maps: Option<usize>,

    /// Half-width, in lattice cells, of the initial candidate box.
    #[arg(long)]
    pub span: Option<i64>,

    /// Gaussian blur standard deviation applied to density maps.
    #[arg(long)]
    pub blur_sigma: Option<f64>,

    /// Maximum rotation angle, in degrees, toward the coverage diagonal.
    #[arg(long)]
    pub phi_max: Option<f64>,

    /// Minimum contig count for a bin to be considered well formed.
    #[arg(long)]
    pub min_size: Option<usize>,

    /// Minimum total base pairs for a bin to be considered well formed.
    #[arg(long)]
    pub min_vol: Option<u64>,

    /// Number of consecutive unproductive rounds before stopping.
    #[arg(long)]
    pub breakout: Option<usize>,
}

impl Args {
    /// Apply any CLI overrides on top of a loaded config.
    pub fn apply_overrides(&self, mut config: crate::config::Config) -> crate::config::Config {
        if let Some(v) = self.scale_factor {
            config.scale_factor = v;
        }
        if let Some(v) = self.num_img_maps {
            config.num_img_maps = v;
        }
        if let Some(v) = self.span {
            config.span = v;
        }
        if let Some(v) = self.blur_sigma {
            config.blur_sigma = v;
        }
        if let Some(v) = self.phi_max {
            config.phi_max = v;
        }
        if let Some(v) = self.min_size {
            config.min_size = v;
        }
        if let Some(v) = self.min_vol {
            config.min_vol = v;
        }
        if let Some(v) = self.breakout {
            config.breakout = v;
        }
        config
    }
}
