//! DensityMap: length-weighted 2D/3D stamping, Gaussian blur, peak lookup,
//! and decrement (spec.md §4.2).

use std::collections::HashMap;

use crate::assignment::Assignment;

const EPS_FLOAT: f64 = f64::EPSILON;

/// A single S x S view, stored row-major.
#[derive(Clone)]
struct View {
    cells: Vec<f64>,
    scale: i64,
}

impl View {
    fn new(scale: i64) -> Self {
        View {
            cells: vec![0.0; (scale * scale) as usize],
            scale,
        }
    }

    #[inline]
    fn idx(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.scale || y >= self.scale {
            None
        } else {
            Some((x * self.scale + y) as usize)
        }
    }

    fn add(&mut self, x: i64, y: i64, value: f64) {
        if let Some(i) = self.idx(x, y) {
            self.cells[i] += value;
        }
    }

    fn sub_clamped(&mut self, x: i64, y: i64, value: f64) {
        if let Some(i) = self.idx(x, y) {
            self.cells[i] -= value;
            if self.cells[i] < EPS_FLOAT {
                self.cells[i] = 0.0;
            }
        }
    }

    /// Stamp the 3x3 length-weighted kernel centred on (x, y).
    fn stamp(&mut self, x: i64, y: i64, multiplier: f64) {
        let val_p = 1.0 * multiplier;
        let val_s = 0.6 * multiplier;
        let val_c = 0.2 * multiplier;
        for dx in -1..=1_i64 {
            for dy in -1..=1_i64 {
                let w = match (dx, dy) {
                    (0, 0) => val_p,
                    (0, _) | (_, 0) => val_s,
                    _ => val_c,
                };
                self.add(x + dx, y + dy, w);
            }
        }
    }

    fn unstamp(&mut self, x: i64, y: i64, multiplier: f64) {
        let val_p = 1.0 * multiplier;
        let val_s = 0.6 * multiplier;
        let val_c = 0.2 * multiplier;
        for dx in -1..=1_i64 {
            for dy in -1..=1_i64 {
                let w = match (dx, dy) {
                    (0, 0) => val_p,
                    (0, _) | (_, 0) => val_s,
                    _ => val_c,
                };
                self.sub_clamped(x + dx, y + dy, w);
            }
        }
    }

    fn blur(&self, sigma: f64) -> View {
        let blurred_rows = gaussian_blur_2d(&self.cells, self.scale as usize, self.scale as usize, sigma);
        View {
            cells: blurred_rows,
            scale: self.scale,
        }
    }

    fn argmax(&self) -> (f64, i64, i64) {
        let mut best_val = f64::MIN;
        let mut best_idx = 0usize;
        for (i, &v) in self.cells.iter().enumerate() {
            if v > best_val {
                best_val = v;
                best_idx = i;
            }
        }
        let x = (best_idx as i64) / self.scale;
        let y = (best_idx as i64) % self.scale;
        (best_val, x, y)
    }
}

/// Separable Gaussian blur over a row-major `rows x cols` buffer. Edge
/// handling clamps to the border sample (the source system leaves this
/// choice to its ndimage dependency's default; spec.md constrains only
/// sigma, not boundary handling).
fn gaussian_blur_2d(data: &[f64], rows: usize, cols: usize, sigma: f64) -> Vec<f64> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;

    let mut tmp = vec![0.0; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let cc = clamp_index(c as i64 + (k as i64 - radius), cols);
                acc += w * data[r * cols + cc];
            }
            tmp[r * cols + c] = acc;
        }
    }

    let mut out = vec![0.0; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let rr = clamp_index(r as i64 + (k as i64 - radius), rows);
                acc += w * tmp[rr * cols + c];
            }
            out[r * cols + c] = acc;
        }
    }
    out
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i64;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    let mut sum = 0.0;
    for i in -radius..=radius {
        let x = i as f64;
        let w = (-x * x / (2.0 * sigma * sigma)).exp();
        kernel.push(w);
        sum += w;
    }
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

fn clamp_index(i: i64, len: usize) -> usize {
    i.clamp(0, len as i64 - 1) as usize
}

pub struct DensityMap {
    pub scale: i64,
    pub num_views: usize,
    views: Vec<View>,
    blurred: Vec<View>,
    pub reverse_index: HashMap<(i64, i64, i64), Vec<usize>>,
}

impl DensityMap {
    pub fn new(num_views: usize, scale: i64) -> Self {
        DensityMap {
            scale,
            num_views,
            views: (0..num_views).map(|_| View::new(scale)).collect(),
            blurred: (0..num_views).map(|_| View::new(scale)).collect(),
            reverse_index: HashMap::new(),
        }
    }

    fn view_points(&self, p: &[i64; 3]) -> Vec<(i64, i64)> {
        let s = self.scale;
        let mut points = vec![(p[0], p[1])];
        if self.num_views > 1 {
            points.push((s - 1 - p[2], p[1]));
            points.push((s - 1 - p[2], s - 1 - p[0]));
        }
        points
    }

    pub fn populate(
        &mut self,
        positions: &[[i64; 3]],
        lengths: &[u64],
        assignment: &[Assignment],
    ) {
        for v in self.views.iter_mut() {
            v.cells.iter_mut().for_each(|c| *c = 0.0);
        }
        self.reverse_index.clear();

        for (i, p) in positions.iter().enumerate() {
            if assignment[i] != Assignment::Unassigned {
                continue;
            }
            let multiplier = (lengths[i] as f64).log10();
            let key = (p[0], p[1], p[2]);
            self.reverse_index.entry(key).or_default().push(i);

            for (view_idx, (x, y)) in self.view_points(p).into_iter().enumerate() {
                self.views[view_idx].stamp(x, y, multiplier);
            }
        }
    }

    pub fn blur(&mut self, sigma: f64) {
        for (i, v) in self.views.iter().enumerate() {
            self.blurred[i] = v.blur(sigma);
        }
    }

    /// Global argmax of the blurred top view (view 0).
    pub fn peak(&self) -> (f64, i64, i64) {
        self.blurred[0].argmax()
    }

    fn make_coord_range(&self, pos: i64, span: i64) -> (i64, i64) {
        let lower = (pos - span).max(0);
        let upper = (pos + span + 1).min(self.scale);
        (lower, upper)
    }

    /// Re-densify the 3D column above (x0, y0) at finer granularity and
    /// return the refined peak lifted back to the global lattice.
    pub fn column_densify(
        &self,
        x0: i64,
        y0: i64,
        span: i64,
        lengths: &[u64],
        sigma: f64,
    ) -> (i64, i64, i64) {
        let start_span = (1.5 * span as f64).floor() as i64;
        let span_len = 2 * start_span + 1;
        let (x_lower, x_upper) = self.make_coord_range(x0, start_span);
        let (y_lower, y_upper) = self.make_coord_range(y0, start_span);

        let mut block = vec![0.0_f64; (span_len * span_len * self.scale) as usize];
        let block_idx = |x: i64, y: i64, z: i64| -> Option<usize> {
            if x < 0 || y < 0 || x >= span_len || y >= span_len || z < 0 || z >= self.scale {
                None
            } else {
                Some((x * span_len * self.scale + y * self.scale + z) as usize)
            }
        };

        let weights = [6.4_f64, 4.9, 2.5, 1.6];
        let stamp_slice = |block: &mut Vec<f64>, px: i64, py: i64, pz: i64, offset: usize, multiplier: f64| {
            let point = weights[offset] * multiplier;
            let side = weights[offset + 1] * multiplier;
            let corner = weights[offset + 2] * multiplier;
            for dx in -1..=1_i64 {
                for dy in -1..=1_i64 {
                    let w = match (dx, dy) {
                        (0, 0) => point,
                        (0, _) | (_, 0) => side,
                        _ => corner,
                    };
                    if let Some(i) = block_idx(px + dx, py + dy, pz) {
                        block[i] += w;
                    }
                }
            }
        };

        for (&(x, y, z), rows) in self.reverse_index.iter() {
            if x < x_lower || x >= x_upper || y < y_lower || y >= y_upper {
                continue;
            }
            let bx = x - x_lower;
            let by = y - y_lower;
            for &row_index in rows {
                let multiplier = (lengths[row_index] as f64).log10();
                if z < self.scale - 1 {
                    stamp_slice(&mut block, bx, by, z + 1, 1, multiplier);
                }
                stamp_slice(&mut block, bx, by, z, 0, multiplier);
                if z > 0 {
                    stamp_slice(&mut block, bx, by, z - 1, 1, multiplier);
                }
            }
        }

        let blurred = gaussian_blur_3d(&block, span_len as usize, span_len as usize, self.scale as usize, sigma);

        let mut best_val = f64::MIN;
        let mut best = (0_i64, 0_i64, 0_i64);
        for x in 0..span_len {
            for y in 0..span_len {
                for z in 0..self.scale {
                    let v = blurred[(x * span_len * self.scale + y * self.scale + z) as usize];
                    if v > best_val {
                        best_val = v;
                        best = (x, y, z);
                    }
                }
            }
        }

        (best.0 + x_lower, best.1 + y_lower, best.2)
    }

    pub fn decrement(&mut self, row_index: usize, p: &[i64; 3], lengths: &[u64]) {
        let multiplier = (lengths[row_index] as f64).log10();
        for (view_idx, (x, y)) in self.view_points(p).into_iter().enumerate() {
            self.views[view_idx].unstamp(x, y, multiplier);
        }
        let key = (p[0], p[1], p[2]);
        if let Some(bucket) = self.reverse_index.get_mut(&key) {
            bucket.retain(|&r| r != row_index);
            if bucket.is_empty() {
                self.reverse_index.remove(&key);
            }
        }
    }

    /// The minimum cell value across every view — should never go negative
    /// (spec.md §3 invariant I3); exposed for diagnostics and testing.
    pub fn min_cell_value(&self) -> f64 {
        self.views
            .iter()
            .flat_map(|v| v.cells.iter().copied())
            .fold(f64::MAX, f64::min)
    }

    pub fn unassigned_in_box(
        &self,
        center: (i64, i64, i64),
        xy_span: i64,
        z_span: i64,
    ) -> Vec<usize> {
        let (x_lower, x_upper) = self.make_coord_range(center.0, xy_span);
        let (y_lower, y_upper) = self.make_coord_range(center.1, xy_span);
        let (z_lower, z_upper) = self.make_coord_range(center.2, z_span);
        let mut out = Vec::new();
        for (&(x, y, z), rows) in self.reverse_index.iter() {
            if x >= x_lower && x < x_upper && y >= y_lower && y < y_upper && z >= z_lower && z < z_upper {
                out.extend(rows.iter().copied());
            }
        }
        out
    }
}

fn gaussian_blur_3d(data: &[f64], nx: usize, ny: usize, nz: usize, sigma: f64) -> Vec<f64> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let idx = |x: usize, y: usize, z: usize| x * ny * nz + y * nz + z;

    let mut tmp = vec![0.0; nx * ny * nz];
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let xx = clamp_index(x as i64 + (k as i64 - radius), nx);
                    acc += w * data[idx(xx, y, z)];
                }
                tmp[idx(x, y, z)] = acc;
            }
        }
    }
    let mut tmp2 = vec![0.0; nx * ny * nz];
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let yy = clamp_index(y as i64 + (k as i64 - radius), ny);
                    acc += w * tmp[idx(x, yy, z)];
                }
                tmp2[idx(x, y, z)] = acc;
            }
        }
    }
    let mut out = vec![0.0; nx * ny * nz];
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let zz = clamp_index(z as i64 + (k as i64 - radius), nz);
                    acc += w * tmp2[idx(x, y, zz)];
                }
                out[idx(x, y, z)] = acc;
            }
        }
    }
    out
}
