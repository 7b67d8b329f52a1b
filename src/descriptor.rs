// This implementation of SIFT is derived from works by Rob Hess and Willow Garage Inc.
// It is made available under the terms of the MIT license included in the root of this repository.
//
// Copyright 2006-2010 Rob Hess
// Copyright 2009 Willow Garage Inc.
// Copyright 2024 Thomas Nibler

//! Keypoint descriptors. See Section 4.2 in [4].

use itertools::{izip, Itertools};
use ndarray::{s, Array3, ArrayView2};

use crate::config::{DescMode, NormMode};

const LAMBDA_DESCR: f32 = 3.0;

// See Section 4.2 in [4]
const DESCRIPTOR_N_HISTOGRAMS: usize = 4;
// See Section 4.2 in [4]
const DESCRIPTOR_N_BINS: usize = 8;
pub const DESCRIPTOR_SIZE: usize =
    DESCRIPTOR_N_HISTOGRAMS * DESCRIPTOR_N_HISTOGRAMS * DESCRIPTOR_N_BINS;

/// Samples per histogram cell along each axis in the grid modes.
const GRID_SAMPLES_PER_CELL: usize = 4;

const BIN_ANGLE_STEP: f32 = DESCRIPTOR_N_BINS as f32 / 360.0;

const DESCRIPTOR_MAGNITUDE_CAP: f32 = 0.2;

/// One gradient sample in the keypoint's rotated frame.
struct Sample {
    /// Position in units of histogram cells, shifted so that cells span [0, n_hist).
    row_bin: f32,
    col_bin: f32,
    dx: f32,
    dy: f32,
    /// Squared distance from the keypoint in units of histogram cells.
    dist_sq: f32,
}

/// Raw (unnormalized) descriptor of a keypoint at `(x, y)` in `img` with the given scale
/// and orientation (degrees), both in `img` pixel units.
pub(crate) fn compute_descriptor(
    img: &ArrayView2<f32>,
    x: f32,
    y: f32,
    scale: f32,
    orientation: f32,
    mode: DescMode,
) -> Vec<f32> {
    let samples = match mode {
        DescMode::Loop | DescMode::NoTile => window_samples(img, x, y, scale, orientation, false),
        DescMode::ILoop => window_samples(img, x, y, scale, orientation, true),
        DescMode::Grid => grid_samples(img, x, y, scale, orientation, false),
        DescMode::IGrid => grid_samples(img, x, y, scale, orientation, true),
    };
    histogram(samples, orientation, mode != DescMode::NoTile)
}

/// Every pixel in a square window large enough to cover the rotated 4x4 cell patch.
fn window_samples(
    img: &ArrayView2<f32>,
    x: f32,
    y: f32,
    scale: f32,
    orientation: f32,
    subpixel_center: bool,
) -> Vec<Sample> {
    let n_hist = DESCRIPTOR_N_HISTOGRAMS;
    let height = img.shape()[0];
    let width = img.shape()[1];
    let x_center = x.round();
    let y_center = y.round();
    // offset of the rotation center from the pixel the window is centered on
    let (cx, cy) = if subpixel_center {
        (x - x_center, y - y_center)
    } else {
        (0.0, 0.0)
    };
    let hist_width = LAMBDA_DESCR * scale;
    let radius = (LAMBDA_DESCR * scale * 2_f32.sqrt() * (n_hist + 1) as f32 * 0.5).round() as i32;
    let (sin_ori, cos_ori) = orientation.to_radians().sin_cos();
    let (sin_ori_scaled, cos_ori_scaled) = (sin_ori / hist_width, cos_ori / hist_width);

    (-radius..=radius)
        .flat_map(|y_in_window| {
            (-radius..=radius).filter_map(move |x_in_window| {
                let xw = x_in_window as f32 - cx;
                let yw = y_in_window as f32 - cy;
                // row and col in the keypoint's coordinates wrt its reference orientation
                let col_rotated: f32 = xw * cos_ori_scaled - yw * sin_ori_scaled;
                let row_rotated: f32 = xw * sin_ori_scaled + yw * cos_ori_scaled;
                // Bin here means which of the 4*4 histograms the gradient at this point will
                // contribute to. It is not a bin within a histogram.
                let row_bin = row_rotated + (n_hist / 2) as f32;
                let col_bin = col_rotated + (n_hist / 2) as f32;

                // coordinates to read pixels from. No resampling here
                let abs_y = y_center as i32 + y_in_window;
                let abs_x = x_center as i32 + x_in_window;

                // +/- 0.5 to check if the sample would contribute anything to the 4*4 histograms
                // of interest with interpolation.
                if row_bin > -0.5
                    && row_bin < n_hist as f32 + 0.5
                    && col_bin > -0.5
                    && col_bin < n_hist as f32 + 0.5
                    && abs_y > 0
                    && abs_y < (height - 1) as i32
                    && abs_x > 0
                    && abs_x < (width - 1) as i32
                {
                    let abs_y = abs_y as usize;
                    let abs_x = abs_x as usize;
                    Some(Sample {
                        row_bin,
                        col_bin,
                        dx: img[(abs_y, abs_x + 1)] - img[(abs_y, abs_x - 1)],
                        dy: img[(abs_y - 1, abs_x)] - img[(abs_y + 1, abs_x)],
                        dist_sq: col_rotated.powi(2) + row_rotated.powi(2),
                    })
                } else {
                    None
                }
            })
        })
        .collect()
}

/// A regular grid of `4 * GRID_SAMPLES_PER_CELL` samples per axis, laid out in the keypoint's
/// rotated frame and mapped back into the image.
fn grid_samples(
    img: &ArrayView2<f32>,
    x: f32,
    y: f32,
    scale: f32,
    orientation: f32,
    bilinear: bool,
) -> Vec<Sample> {
    let n_hist = DESCRIPTOR_N_HISTOGRAMS;
    let height = img.shape()[0] as f32;
    let width = img.shape()[1] as f32;
    let hist_width = LAMBDA_DESCR * scale;
    let (sin_ori, cos_ori) = orientation.to_radians().sin_cos();
    let n = n_hist * GRID_SAMPLES_PER_CELL;
    // sample centers in cell units, in [-n_hist / 2, n_hist / 2)
    let coords = (0..n)
        .map(|k| (k as f32 + 0.5) / GRID_SAMPLES_PER_CELL as f32 - (n_hist / 2) as f32)
        .collect_vec();

    coords
        .iter()
        .cartesian_product(coords.iter())
        .filter_map(|(&v, &u)| {
            // inverse of the rotation used in `window_samples`
            let px = x + hist_width * (u * cos_ori + v * sin_ori);
            let py = y + hist_width * (v * cos_ori - u * sin_ori);
            let (dx, dy) = if bilinear {
                if px < 1.0 || px > width - 2.0 || py < 1.0 || py > height - 2.0 {
                    return None;
                }
                (
                    bilinear_at(img, px + 1.0, py) - bilinear_at(img, px - 1.0, py),
                    bilinear_at(img, px, py - 1.0) - bilinear_at(img, px, py + 1.0),
                )
            } else {
                let (xi, yi) = (px.round(), py.round());
                if xi < 1.0 || xi > width - 2.0 || yi < 1.0 || yi > height - 2.0 {
                    return None;
                }
                let (xi, yi) = (xi as usize, yi as usize);
                (
                    img[(yi, xi + 1)] - img[(yi, xi - 1)],
                    img[(yi - 1, xi)] - img[(yi + 1, xi)],
                )
            };
            Some(Sample {
                row_bin: v + (n_hist / 2) as f32,
                col_bin: u + (n_hist / 2) as f32,
                dx,
                dy,
                dist_sq: u * u + v * v,
            })
        })
        .collect()
}

fn bilinear_at(img: &ArrayView2<f32>, x: f32, y: f32) -> f32 {
    let max_x = img.shape()[1] - 1;
    let max_y = img.shape()[0] - 1;
    let x0 = (x.floor().max(0.0) as usize).min(max_x);
    let y0 = (y.floor().max(0.0) as usize).min(max_y);
    let x1 = (x0 + 1).min(max_x);
    let y1 = (y0 + 1).min(max_y);
    let ax = x - x0 as f32;
    let ay = y - y0 as f32;
    let top = img[(y0, x0)] * (1.0 - ax) + img[(y0, x1)] * ax;
    let bottom = img[(y1, x0)] * (1.0 - ax) + img[(y1, x1)] * ax;
    top * (1.0 - ay) + bottom * ay
}

/// Spread each sample's contribution over the 4x4x8 histogram.
fn histogram(samples: Vec<Sample>, orientation: f32, spatial_interpolation: bool) -> Vec<f32> {
    let n_hist = DESCRIPTOR_N_HISTOGRAMS;
    let n_bins = DESCRIPTOR_N_BINS;
    // Instead of 4*4 histograms, we work with 6*6 here so that the interpolation works out simpler
    // at the borders (surely possible to do differently as well).
    // The outermost histograms will be discarded.
    let mut hist: Array3<f32> = Array3::zeros((n_hist + 2, n_hist + 2, n_bins));

    // Different weighting than in [4]
    let weight_scale = -2. / (n_hist.pow(2) as f32);
    let weights = samples.iter().map(|s| (s.dist_sq * weight_scale).exp());
    // Gradient orientations in patch normalized wrt to the keypoint's reference orientation.
    let normalized_orientations = samples.iter().map(|s| {
        let x: f64 = s.dx as f64;
        let y: f64 = s.dy as f64;
        ((y.atan2(x).to_degrees() + 360.0) % 360.0) as f32 - orientation
    });
    // Gradient magnitudes
    let magnitudes = samples.iter().map(|s| (s.dx * s.dx + s.dy * s.dy).sqrt());

    izip!(&samples, normalized_orientations, magnitudes, weights).for_each(
        |(sample, orientation, mag, weight)| {
            let mag = mag * weight;
            let obin = orientation * BIN_ANGLE_STEP;
            let ori_floor = obin.floor();
            let ori_frac = obin - ori_floor;
            // Histogram bin indices wrap around because angles
            let ori_floor = if ori_floor < 0. {
                ori_floor + n_bins as f32
            } else if ori_floor >= n_bins as f32 {
                ori_floor - n_bins as f32
            } else {
                ori_floor
            } as usize;
            let ori_floor_p1 = if ori_floor + 1 >= n_bins {
                // wrap around to ori_floor + 1 - n_bins, can only be 0
                0
            } else {
                ori_floor + 1
            };

            if !spatial_interpolation {
                let row = (sample.row_bin.floor() + 1.) as usize;
                let col = (sample.col_bin.floor() + 1.) as usize;
                hist[(row, col, ori_floor)] += mag * (1. - ori_frac);
                hist[(row, col, ori_floor_p1)] += mag * ori_frac;
                return;
            }

            // Subtracting 0.5 here because the trilinear interpolation (the reverse actually)
            // below works on the {-0.5, 0.5}^3 cube, but our histograms are located in {0, 1}^ cubes.
            let row_bin = sample.row_bin - 0.5;
            let col_bin = sample.col_bin - 0.5;
            let row_floor = row_bin.floor();
            let col_floor = col_bin.floor();
            let row_frac = row_bin - row_floor;
            let col_frac = col_bin - col_floor;

            // The numbers are to be seen as coordinates on a cube.
            // Notation taken from https://en.wikipedia.org/wiki/Trilinear_interpolation.
            let c1 = mag * row_frac;
            let c0 = mag - c1;
            let c11 = c1 * col_frac;
            let c10 = c1 - c11;
            let c01 = c0 * col_frac;
            let c00 = c0 - c01;
            let c111 = c11 * ori_frac;
            let c110 = c11 - c111;
            let c101 = c10 * ori_frac;
            let c100 = c10 - c101;
            let c011 = c01 * ori_frac;
            let c010 = c01 - c011;
            let c001 = c00 * ori_frac;
            let c000 = c00 - c001;

            let row_floor_p1 = (row_floor + 1.) as usize;
            let col_floor_p1 = (col_floor + 1.) as usize;
            let row_floor_p2 = (row_floor + 2.) as usize;
            let col_floor_p2 = (col_floor + 2.) as usize;

            hist[(row_floor_p1, col_floor_p1, ori_floor)] += c000;
            hist[(row_floor_p1, col_floor_p1, ori_floor_p1)] += c001;
            hist[(row_floor_p1, col_floor_p2, ori_floor)] += c010;
            hist[(row_floor_p1, col_floor_p2, ori_floor_p1)] += c011;
            hist[(row_floor_p2, col_floor_p1, ori_floor)] += c100;
            hist[(row_floor_p2, col_floor_p1, ori_floor_p1)] += c101;
            hist[(row_floor_p2, col_floor_p2, ori_floor)] += c110;
            hist[(row_floor_p2, col_floor_p2, ori_floor_p1)] += c111;
        },
    );

    #[allow(clippy::reversed_empty_ranges)]
    let inner = hist.slice(s![1..-1, 1..-1, ..]);
    inner.iter().copied().collect()
}

/// Normalize a raw descriptor in place and scale it by `2^norm_multi`.
/// All-zero descriptors stay zero.
pub(crate) fn normalize(desc: &mut [f32], mode: NormMode, norm_multi: i32) {
    match mode {
        NormMode::Classic => {
            let l2 = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
            if l2 <= f32::EPSILON {
                return;
            }
            // Components of the vector can not be larger than 0.2 * l2_norm
            let component_cap = l2 * DESCRIPTOR_MAGNITUDE_CAP;
            desc.iter_mut().for_each(|v| *v = v.min(component_cap));
            let l2_capped = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
            let normalizer = 1.0 / l2_capped.max(f32::EPSILON);
            desc.iter_mut().for_each(|v| *v *= normalizer);
        }
        NormMode::RootSift => {
            let l1: f32 = desc.iter().map(|v| v.abs()).sum();
            if l1 <= f32::EPSILON {
                return;
            }
            desc.iter_mut().for_each(|v| *v = (*v / l1).sqrt());
        }
    }
    let multiplier = 2_f32.powi(norm_multi);
    desc.iter_mut().for_each(|v| *v *= multiplier);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Smooth, non-symmetric test pattern.
    fn pattern() -> Array2<f32> {
        Array2::from_shape_fn((64, 64), |(y, x)| {
            let (x, y) = (x as f32, y as f32);
            (0.5 + 0.3 * (x * 0.21).sin() * (y * 0.13).cos() + 0.002 * x * y / 64.0).clamp(0., 1.)
        })
    }

    fn l2(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn every_mode_produces_full_descriptor() {
        let img = pattern();
        for mode in DescMode::ALL {
            let desc = compute_descriptor(&img.view(), 31.3, 30.8, 2.5, 47.0, *mode);
            assert_eq!(desc.len(), DESCRIPTOR_SIZE, "{mode}");
            assert!(desc.iter().all(|v| *v >= 0.0), "{mode}");
            assert!(l2(&desc) > 0.0, "{mode}");
        }
    }

    #[test]
    fn flat_patch_gives_zero_descriptor() {
        let img = Array2::from_elem((40, 40), 0.3_f32);
        let mut desc = compute_descriptor(&img.view(), 20.0, 20.0, 2.0, 0.0, DescMode::Loop);
        assert!(desc.iter().all(|v| *v == 0.0));
        normalize(&mut desc, NormMode::Classic, 0);
        assert!(desc.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn classic_norm_caps_components() {
        let mut desc = vec![0.0; DESCRIPTOR_SIZE];
        desc[0] = 10.0;
        desc[1..20].iter_mut().for_each(|v| *v = 1.0);
        normalize(&mut desc, NormMode::Classic, 0);
        assert!((l2(&desc) - 1.0).abs() < 1e-5);
        // the dominant component was capped, so it's no longer 10x the others
        assert!(desc[0] / desc[1] < 10.0);
    }

    #[test]
    fn root_sift_has_unit_l2_norm() {
        let mut desc = (0..DESCRIPTOR_SIZE).map(|i| (i % 7) as f32).collect_vec();
        normalize(&mut desc, NormMode::RootSift, 0);
        assert!((l2(&desc) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn norm_multi_scales_descriptor() {
        let img = pattern();
        let raw = compute_descriptor(&img.view(), 30.0, 30.0, 2.0, 90.0, DescMode::Loop);
        for multi in [0, 3, 9] {
            let mut desc = raw.clone();
            normalize(&mut desc, NormMode::Classic, multi);
            assert!((l2(&desc) - 2_f32.powi(multi)).abs() < 1e-3 * 2_f32.powi(multi));
        }
    }

    #[test]
    fn notile_keeps_spatial_cells_separate() {
        // gradient only in a thin vertical stripe right of the keypoint
        let img = Array2::from_shape_fn((64, 64), |(_y, x)| if x >= 34 { 1.0 } else { 0.0 });
        let interp = compute_descriptor(&img.view(), 32.0, 32.0, 2.0, 0.0, DescMode::Loop);
        let tiled = compute_descriptor(&img.view(), 32.0, 32.0, 2.0, 0.0, DescMode::NoTile);
        let nonzero = |d: &[f32]| d.iter().filter(|v| **v > 0.0).count();
        assert!(nonzero(&tiled) > 0);
        assert!(nonzero(&tiled) <= nonzero(&interp));
    }
}
