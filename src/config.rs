use serde::{Deserialize, Serialize};

/// Tunable constants for the clustering pipeline (spec.md §6).
///
/// Every field has the default the original system shipped with; `--config`
/// overlays a JSON document with the same field names on top of these.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scale_factor: i64,
    pub num_img_maps: usize,

    pub span: i64,
    pub blur_sigma: f64,
    pub phi_max: f64,

    pub min_size: usize,
    pub min_vol: u64,

    pub primary_tolerance: f64,
    pub aux_tolerance: f64,
    pub tolerance_decay: f64,

    pub partition_stdev_cut: f64,
    pub partition_spread: f64,

    pub breakout: usize,
    pub bounce: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scale_factor: 1000,
            num_img_maps: 1,

            span: 30,
            blur_sigma: 8.0,
            phi_max: 15.0,

            min_size: 5,
            min_vol: 1_000_000,

            primary_tolerance: 3.0,
            aux_tolerance: 3.0,
            tolerance_decay: 0.8,

            partition_stdev_cut: 0.04,
            partition_spread: 0.15,

            breakout: 100,
            bounce: 0.1,
        }
    }
}

impl Config {
    /// Load a config, overlaying a JSON file's fields on top of the defaults.
    pub fn from_overlay_json(path: &std::path::Path) -> Result<Self, crate::error::CoreError> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&text)?;
        Ok(cfg)
    }
}
