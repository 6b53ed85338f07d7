//! CoordinateTransformer: maps an N x D coverage matrix onto a hypersphere
//! and projects it into a 3D lattice (spec.md §4.1).

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rayon::prelude::*;
use std::f64::consts::PI;

use crate::error::CoreError;

/// N x 3 lattice positions plus the per-row coverage norm, which several
/// downstream steps (length-weighted stamping excepted) also consult.
pub struct TransformResult {
    pub positions: Vec<[i64; 3]>,
    pub norms: Vec<f64>,
}

pub struct CoordinateTransformer {
    pub scale: i64,
    pub phi_max: f64,
}

impl CoordinateTransformer {
    pub fn new(scale: i64, phi_max: f64) -> Self {
        CoordinateTransformer { scale, phi_max }
    }

    pub fn transform(&self, coverage: &[Vec<f64>]) -> Result<TransformResult, CoreError> {
        if coverage.is_empty() {
            return Err(CoreError::EmptyCoverageMatrix);
        }
        let dim = coverage[0].len();
        if dim < 2 {
            return Err(CoreError::CoverageDimensionTooSmall { dim });
        }

        let n = coverage.len();
        let r_x = coverage
            .iter()
            .flat_map(|row| row.iter().copied())
            .fold(f64::MIN, f64::max)
            .max(1.0 + 1e-9);
        let r_d = median_flat(coverage);

        let unit_diag = DVector::from_element(dim, 1.0 / (dim as f64).sqrt());
        let theta_a = (1.0 / (dim as f64).sqrt()).acos();

        // rotate-and-rescale each row (embarrassingly parallel per spec.md §5)
        let rotated: Result<Vec<(DVector<f64>, f64)>, CoreError> = (0..n)
            .into_par_iter()
            .map(|i| {
                let row = &coverage[i];
                if row.len() != dim {
                    return Err(CoreError::RaggedCoverageRow {
                        row_index: i,
                        expected: dim,
                        actual: row.len(),
                    });
                }
                let v = DVector::from_row_slice(row);
                let norm_v = v.norm();
                if norm_v == 0.0 {
                    return Err(CoreError::ZeroNormCoverageRow { row_index: i });
                }

                let dot: f64 = v.iter().sum();
                let cos_theta = (dot / (norm_v * (dim as f64).sqrt())).clamp(-1.0, 1.0);
                let theta = cos_theta.acos();

                let exponent = -(2.0 * PI / theta_a) * theta + PI;
                let phi = (PI / self.phi_max) * (1.0 / (1.0 + exponent.exp()));

                let rotated_v = if theta.abs() < 1e-12 {
                    v.clone()
                } else {
                    (v.normalize() * (theta - phi) + unit_diag.clone() * phi) / theta
                };

                let r_i = norm_v;
                let s = (r_d / 2.0) + (r_d / 2.0) * r_i.ln() / r_x.ln();
                let rn = rotated_v.norm();
                let scaled = if rn > 0.0 {
                    rotated_v * (s / rn)
                } else {
                    rotated_v
                };

                Ok((scaled, r_i))
            })
            .collect();
        let rotated = rotated?;

        let norms: Vec<f64> = rotated.iter().map(|(_, r)| *r).collect();

        let mut xyz = vec![[0.0_f64; 3]; n];
        if dim == 2 {
            for (i, (p, r)) in rotated.iter().enumerate() {
                xyz[i] = [p[0], p[1], r.ln()];
            }
        } else {
            let mean = {
                let mut m = DVector::from_element(dim, 0.0);
                for (p, _) in &rotated {
                    m += p;
                }
                m / (n as f64)
            };
            let mut cov = DMatrix::from_element(dim, dim, 0.0);
            for (p, _) in &rotated {
                let c = p - &mean;
                cov += &c * c.transpose();
            }
            cov /= n as f64;

            let eig = SymmetricEigen::new(cov);
            let mut order: Vec<usize> = (0..dim).collect();
            order.sort_unstable_by(|&a, &b| {
                eig.eigenvalues[b]
                    .partial_cmp(&eig.eigenvalues[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let pc1 = eig.eigenvectors.column(order[0]).clone_owned();
            let pc2 = eig.eigenvectors.column(order[1]).clone_owned();

            for (i, (p, r)) in rotated.iter().enumerate() {
                let c = p - &mean;
                let x = c.dot(&pc1);
                let y = c.dot(&pc2);
                let z = r.ln().max(0.0).sqrt();
                xyz[i] = [x, y, z];
            }
        }

        let positions = normalize_to_lattice(&xyz, self.scale);
        Ok(TransformResult { positions, norms })
    }
}

fn median_flat(matrix: &[Vec<f64>]) -> f64 {
    let mut values: Vec<f64> = matrix.iter().flat_map(|row| row.iter().copied()).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Normalize each of the 3 columns independently into [0, scale - 1] and
/// round to the integer lattice. A constant column (numerical saturation,
/// spec.md §7) falls back to a unit divisor instead of dividing by zero.
fn normalize_to_lattice(xyz: &[[f64; 3]], scale: i64) -> Vec<[i64; 3]> {
    let n = xyz.len();
    let mut mins = [f64::MAX; 3];
    let mut maxs = [f64::MIN; 3];
    for p in xyz {
        for d in 0..3 {
            mins[d] = mins[d].min(p[d]);
            maxs[d] = maxs[d].max(p[d]);
        }
    }

    let mut divisors = [1.0_f64; 3];
    for d in 0..3 {
        let range = maxs[d] - mins[d];
        divisors[d] = if range > 0.0 {
            range / ((scale - 1) as f64)
        } else {
            1.0
        };
    }

    let mut out = Vec::with_capacity(n);
    for p in xyz {
        let mut cell = [0_i64; 3];
        for d in 0..3 {
            let v = ((p[d] - mins[d]) / divisors[d]).round() as i64;
            cell[d] = v.clamp(0, scale - 1);
        }
        out.push(cell);
    }
    out
}
