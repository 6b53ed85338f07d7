//! ProfileStore: the external collaborator that supplies contig attributes
//! and receives bin assignments back. Spec.md treats this as out-of-core;
//! this module ships one concrete, file-backed implementation so the crate
//! is runnable end to end, plus the trait the engine is generic over.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::CoreError;

/// Everything the clustering pipeline needs about a population of contigs,
/// filtered by a length cutoff. The lattice side length is a clustering
/// tunable, not a per-store attribute, so it lives on `Config` only.
pub struct ContigTable {
    pub contig_ids: Vec<String>,
    /// N x D coverage matrix, one row per contig.
    pub coverage: Vec<Vec<f64>>,
    /// Auxiliary scalar (typically a k-mer signature score), normalized to
    /// [0, 1] by the upstream store.
    pub aux: Vec<f64>,
    pub lengths: Vec<u64>,
    pub colours: Vec<(u8, u8, u8)>,
}

impl ContigTable {
    pub fn len(&self) -> usize {
        self.contig_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contig_ids.is_empty()
    }

    pub fn coverage_dim(&self) -> usize {
        self.coverage.first().map_or(0, |row| row.len())
    }
}

/// Read access to contig attributes, write access for bin assignments.
pub trait ProfileStore {
    fn load(&self, length_cutoff: u64) -> Result<ContigTable, CoreError>;
    fn write_bins(&self, contig_ids: &[String], bin_ids: &[u32]) -> Result<(), CoreError>;
    fn mark_clustered(&self) -> Result<(), CoreError>;
    /// True if this store has already been clustered at least once.
    fn is_clustered(&self) -> bool;
}

/// A CSV-backed ProfileStore.
///
/// Input schema: header row with `contig_id`, `length`, `aux`, one or more
/// `cov_<k>` columns (k = 0..D), and optional `colour_r`/`colour_g`/`colour_b`.
/// Output is written to `output_path` as `contig_id,bin_id`, gzip-compressed
/// when the path ends in `.gz`.
pub struct CsvProfileStore {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl CsvProfileStore {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        CsvProfileStore {
            input_path: input_path.into(),
            output_path: output_path.into(),
        }
    }

    fn marker_path(&self) -> PathBuf {
        let mut p = self.output_path.clone();
        let mut name = p
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".clustered");
        p.set_file_name(name);
        p
    }

    fn open_reader(&self) -> Result<csv::Reader<Box<dyn std::io::Read>>, CoreError> {
        let file = std::fs::File::open(&self.input_path)?;
        let reader: Box<dyn std::io::Read> = if is_gzip_path(&self.input_path) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(csv::Reader::from_reader(reader))
    }
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

impl ProfileStore for CsvProfileStore {
    fn load(&self, length_cutoff: u64) -> Result<ContigTable, CoreError> {
        let mut reader = self.open_reader()?;
        let headers = reader.headers()?.clone();

        let col_index = |name: &str| -> Result<usize, CoreError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| CoreError::MissingColumn {
                    column: name.to_string(),
                })
        };

        let id_col = col_index("contig_id")?;
        let len_col = col_index("length")?;
        let aux_col = col_index("aux")?;

        let mut cov_cols: Vec<(usize, usize)> = Vec::new();
        for (idx, h) in headers.iter().enumerate() {
            if let Some(rest) = h.strip_prefix("cov_") {
                if let Ok(k) = rest.parse::<usize>() {
                    cov_cols.push((k, idx));
                }
            }
        }
        cov_cols.sort_unstable_by_key(|(k, _)| *k);
        let dim = cov_cols.len();
        if dim < 2 {
            return Err(CoreError::CoverageDimensionTooSmall { dim });
        }

        let colour_cols = [
            headers.iter().position(|h| h == "colour_r"),
            headers.iter().position(|h| h == "colour_g"),
            headers.iter().position(|h| h == "colour_b"),
        ];

        let mut contig_ids = Vec::new();
        let mut coverage = Vec::new();
        let mut aux = Vec::new();
        let mut lengths = Vec::new();
        let mut colours = Vec::new();

        for (row_index, record) in reader.records().enumerate() {
            let record = record?;
            let length: u64 = record[len_col].parse().unwrap_or(0);
            if length < length_cutoff {
                continue;
            }

            let mut row = Vec::with_capacity(dim);
            for &(_, idx) in &cov_cols {
                let v: f64 = record[idx].parse().unwrap_or(0.0);
                row.push(v);
            }
            if row.len() != dim {
                return Err(CoreError::RaggedCoverageRow {
                    row_index,
                    expected: dim,
                    actual: row.len(),
                });
            }

            let a: f64 = record[aux_col].parse().unwrap_or(0.0);
            let colour = (
                colour_cols[0]
                    .and_then(|i| record[i].parse::<u8>().ok())
                    .unwrap_or(128),
                colour_cols[1]
                    .and_then(|i| record[i].parse::<u8>().ok())
                    .unwrap_or(128),
                colour_cols[2]
                    .and_then(|i| record[i].parse::<u8>().ok())
                    .unwrap_or(128),
            );

            contig_ids.push(record[id_col].to_string());
            coverage.push(row);
            aux.push(a);
            lengths.push(length);
            colours.push(colour);
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

    fn write_bins(&self, contig_ids: &[String], bin_ids: &[u32]) -> Result<(), CoreError> {
        let file = std::fs::File::create(&self.output_path)?;
        let writer: Box<dyn Write> = if is_gzip_path(&self.output_path) {
            Box::new(GzEncoder::new(file, Compression::default()))
        } else {
            Box::new(BufWriter::new(file))
        };
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["contig_id", "bin_id"])?;
        for (id, bid) in contig_ids.iter().zip(bin_ids.iter()) {
            csv_writer.write_record([id.as_str(), &bid.to_string()])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    fn mark_clustered(&self) -> Result<(), CoreError> {
        let mut f = std::fs::File::create(self.marker_path())?;
        writeln!(f, "clustered")?;
        Ok(())
    }

    fn is_clustered(&self) -> bool {
        self.marker_path().exists()
    }
}
