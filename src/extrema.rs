// This implementation of SIFT is derived from works by Rob Hess and Willow Garage Inc.
// It is made available under the terms of the MIT license included in the root of this repository.
//
// Copyright 2006-2010 Rob Hess
// Copyright 2009 Willow Garage Inc.
// Copyright 2024 Thomas Nibler

//! Scale space extrema detection, refinement and orientation assignment.
//! See Section 3 and 4.1 in [4].

use std::f32::consts::PI as PI32;

use itertools::{izip, Itertools};
use ndarray::{s, Array3, ArrayView2, ArrayView3, Axis};

use crate::config::{Config, SiftMode};

/// λori in [4], radius around a keypoint considered for the gradient orientation histogram.
const ORIENTATION_HISTOGRAM_RADIUS: f32 = 1.5;
/// 3λori rounded up. For points closer to the image bounds than this, no gradient orientation
/// histogram can be computed.
const IMAGE_BORDER: i32 = 5;

const ORIENTATION_HISTOGRAM_BINS: usize = 36;
/// λ_ori in Eq. (19) in [4]
const LAMBDA_ORI: f32 = 1.5;
/// t in Section 4.1.C
const ORIENTATION_HISTOGRAM_LOCALMAX_RATIO: f32 = 0.8;
/// Extrema with more dominant orientations than this keep only the strongest ones.
pub(crate) const MAX_ORIENTATIONS: usize = 4;

const MAX_INTERPOLATION_STEPS: usize = 5;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct ScaleSpacePoint {
    pub scale: usize,
    pub x: usize,
    pub y: usize,
}

/// A refined scale space extremum. Coordinates and sigma are in pixels of its octave.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Extremum {
    pub octave: usize,
    pub scale: usize,
    /// Discrete position the refinement converged to.
    pub xi: usize,
    pub yi: usize,
    pub x: f32,
    pub y: f32,
    pub sigma: f32,
    pub response: f32,
}

/// Mode dependent knobs of detection and refinement.
#[derive(Debug, Copy, Clone)]
pub(crate) struct ExtremaParams {
    pub levels: usize,
    pub sigma: f32,
    pub contrast_threshold: f32,
    pub edge_limit: f32,
    /// Discard extrema with values below this threshold before any refinement.
    pub pre_threshold: f32,
    /// Largest sub-pixel offset accepted as converged.
    pub max_offset: f32,
    /// Drop extrema whose refinement does not converge within the iteration limit.
    pub reject_unconverged: bool,
}

impl ExtremaParams {
    pub fn new(config: &Config) -> Self {
        let levels = config.levels;
        let (pre_threshold, max_offset, reject_unconverged) = match config.sift_mode {
            // This is taken from OpenCV, which works on 0..255 intensities.
            // Section 3.3 in [4] uses different values.
            SiftMode::OpenCV => (
                (0.5 * config.threshold / levels as f32 * 255.0).floor() / 255.0,
                0.5,
                true,
            ),
            SiftMode::PopSift | SiftMode::VLFeat => {
                (0.8 * config.threshold / levels as f32, 0.6, false)
            }
        };
        ExtremaParams {
            levels,
            sigma: config.sigma,
            contrast_threshold: config.threshold,
            edge_limit: config.edge_limit,
            pre_threshold,
            max_offset,
            reject_unconverged,
        }
    }
}

pub(crate) fn find_extrema<'a>(
    dogs: &'a [Array3<f32>],
    params: &'a ExtremaParams,
) -> impl Iterator<Item = Extremum> + 'a {
    dogs.iter().enumerate().flat_map(move |(octave, dog)| {
        assert!(dog.shape()[0] == params.levels + 2);
        (1..=params.levels)
            .flat_map(move |scale_in_octave| find_extrema_in_dog_img(dog, octave, scale_in_octave, params))
    })
}

fn find_extrema_in_dog_img(
    dog: &Array3<f32>,
    octave: usize,
    scale_in_octave: usize,
    params: &ExtremaParams,
) -> Vec<Extremum> {
    assert!(scale_in_octave > 0);
    assert!(scale_in_octave < dog.shape()[0] - 1);
    let dogslice = dog.slice(s![scale_in_octave - 1..scale_in_octave + 2, .., ..]);
    let curr = dogslice.index_axis(Axis(0), 1);

    let height = curr.nrows() as i32;
    let width = curr.ncols() as i32;

    if height <= 2 * IMAGE_BORDER || width <= 2 * IMAGE_BORDER {
        return Vec::new();
    }

    let candidates = (IMAGE_BORDER..height - IMAGE_BORDER).flat_map(|y| {
        (IMAGE_BORDER..width - IMAGE_BORDER)
            .filter(move |x| {
                point_is_local_extremum(dogslice, *x as usize, y as usize, params.pre_threshold)
            })
            .map(move |x| (x as usize, y as usize))
    });

    candidates
        .filter_map(|(x, y)| {
            let InterpolateResult {
                offset_scale,
                offset_x,
                offset_y,
                point,
            } = interpolate_extremum(
                dog.view(),
                ScaleSpacePoint {
                    scale: scale_in_octave,
                    x,
                    y,
                },
                params,
            )?;

            let dogslice = dog.slice(s![(point.scale - 1)..(point.scale + 2), .., ..]);
            let curr = dogslice.index_axis(Axis(0), 1);
            // discard low contrast extrema
            let contrast =
                extremum_contrast(dogslice, point.x, point.y, offset_scale, offset_x, offset_y)
                    .abs();
            if contrast * params.levels as f32 <= params.contrast_threshold {
                return None;
            }

            // Discard extrema located on edges
            if extremum_is_on_edge(curr, point, params.edge_limit) {
                return None;
            }

            // Called sigma in [4], relative to this octave's pixels
            let sigma = params.sigma
                * 2_f32.powf((point.scale as f32 + offset_scale) / params.levels as f32);
            Some(Extremum {
                octave,
                scale: point.scale,
                xi: point.x,
                yi: point.y,
                x: point.x as f32 + offset_x,
                y: point.y as f32 + offset_y,
                sigma,
                response: contrast,
            })
        })
        .collect()
}

fn point_is_local_extremum(dogslice: ArrayView3<f32>, x: usize, y: usize, threshold: f32) -> bool {
    #[inline(always)]
    fn values_around(arr: &ArrayView2<f32>, y: usize, x: usize) -> impl Iterator<Item = f32> {
        [
            arr[(y - 1, x - 1)],
            arr[(y - 1, x)],
            arr[(y - 1, x + 1)],
            arr[(y, x - 1)],
            arr[(y, x + 1)],
            arr[(y + 1, x - 1)],
            arr[(y + 1, x)],
            arr[(y + 1, x + 1)],
        ]
        .into_iter()
    }

    assert!(dogslice.shape()[0] == 3);
    let prev = dogslice.index_axis(Axis(0), 0);
    let curr = dogslice.index_axis(Axis(0), 1);
    let next = dogslice.index_axis(Axis(0), 2);

    assert!(x > 0 && y > 0 && x < curr.shape()[1] - 1 && y < curr.shape()[0] - 1);

    let val = curr[(y, x)];
    if val.abs() <= threshold {
        return false;
    }
    let neighbours = || {
        values_around(&curr, y, x)
            .chain(values_around(&prev, y, x))
            .chain(values_around(&next, y, x))
            .chain([prev[(y, x)], next[(y, x)]])
    };
    if val > 0.0 {
        neighbours().all(|v| val >= v)
    } else {
        neighbours().all(|v| val <= v)
    }
}

#[derive(Copy, Clone)]
struct InterpolateResult {
    pub point: ScaleSpacePoint,
    pub offset_scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Scale space extrema are initially identified on the grid of discrete pixels in a particular
/// image in the scale space. The real DoG function approximated by the stack of DoG images is continous
/// though, and the actual extremum may not fall exactly on a sampling point (scale, row, column).
/// To get a better approximation of the extremum's location, the second order Taylor expansion is
/// used to fit the DoG function around a point and the local extremum of this quadratic is used as
/// a keypoint.
/// See P18-19 in [4].
fn interpolate_extremum(
    dog: ArrayView3<f32>,
    ScaleSpacePoint {
        mut scale,
        mut x,
        mut y,
    }: ScaleSpacePoint,
    params: &ExtremaParams,
) -> Option<InterpolateResult> {
    let height = dog.shape()[1];
    let width = dog.shape()[2];
    let mut last = None;
    for _ in 0..MAX_INTERPOLATION_STEPS {
        let prev = &dog.slice(s![scale - 1, .., ..]);
        let curr = &dog.slice(s![scale, .., ..]);
        let next = &dog.slice(s![scale + 1, .., ..]);

        // 3D Gradient
        let g1 = (next[(y, x)] - prev[(y, x)]) / 2.;
        let g2 = (curr[(y + 1, x)] - curr[(y - 1, x)]) / 2.;
        let g3 = (curr[(y, x + 1)] - curr[(y, x - 1)]) / 2.;

        // Hessian matrix
        let value2x = curr[(y, x)] * 2.;
        let h11 = next[(y, x)] + prev[(y, x)] - value2x;
        let h12 = (next[(y + 1, x)] - next[(y - 1, x)] - prev[(y + 1, x)] + prev[(y - 1, x)]) / 4.;
        let h13 = (next[(y, x + 1)] - next[(y, x - 1)] - prev[(y, x + 1)] + prev[(y, x - 1)]) / 4.;
        let h22 = curr[(y + 1, x)] + curr[(y - 1, x)] - value2x;
        let h33 = curr[(y, x + 1)] + curr[(y, x - 1)] - value2x;
        let h23 = (curr[(y + 1, x + 1)] - curr[(y + 1, x - 1)] - curr[(y - 1, x + 1)]
            + curr[(y - 1, x - 1)])
            / 4.;

        // Solve for α* as shown in Eq. (14) by inverting the hessian
        let det = h11 * h22 * h33 - h11 * h23 * h23 - h12 * h12 * h33 + 2. * h12 * h13 * h23
            - h13 * h13 * h22;
        let hinv11 = (h22 * h33 - h23 * h23) / det;
        let hinv12 = (h13 * h23 - h12 * h33) / det;
        let hinv13 = (h12 * h23 - h13 * h22) / det;
        let hinv22 = (h11 * h33 - h13 * h13) / det;
        let hinv23 = (h12 * h13 - h11 * h23) / det;
        let hinv33 = (h11 * h22 - h12 * h12) / det;

        // dot product of gradient vector with hessian inverse.
        // Solution vector α* is (offset_scale, offset_row, offset_col)
        let offset_scale = -(hinv11 * g1 + hinv12 * g2 + hinv13 * g3);
        let offset_x = -(hinv13 * g1 + hinv23 * g2 + hinv33 * g3);
        let offset_y = -(hinv12 * g1 + hinv22 * g2 + hinv23 * g3);
        if !(offset_scale.is_finite() && offset_x.is_finite() && offset_y.is_finite()) {
            return None;
        }

        // If offsets are outside the interval [-max_offset; max_offset] the extremum belongs
        // to a different pixel or scale and should be rejected here.
        let bound = params.max_offset;
        if offset_scale.abs() < bound && offset_x.abs() < bound && offset_y.abs() < bound {
            // extremum of quadratic function is valid
            return Some(InterpolateResult {
                offset_scale,
                offset_y,
                offset_x,
                point: ScaleSpacePoint { scale, y, x },
            });
        }
        last = Some(InterpolateResult {
            offset_scale: offset_scale.clamp(-bound, bound),
            offset_y: offset_y.clamp(-bound, bound),
            offset_x: offset_x.clamp(-bound, bound),
            point: ScaleSpacePoint { scale, y, x },
        });

        // Interpolation step rejected, update discrete extremum coordinates
        // and retry interpolation.
        let next_x = x as f32 + offset_x.round();
        let next_y = y as f32 + offset_y.round();
        let next_scale = scale as f32 + offset_scale.round();
        if next_scale < 1.0
            || next_scale > params.levels as f32
            || next_x < IMAGE_BORDER as f32
            || next_x >= (width as i32 - IMAGE_BORDER) as f32
            || next_y < IMAGE_BORDER as f32
            || next_y >= (height as i32 - IMAGE_BORDER) as f32
        {
            return None;
        }
        x = next_x as usize;
        y = next_y as usize;
        scale = next_scale as usize;
    }
    // did not converge within iteration limit
    if params.reject_unconverged {
        None
    } else {
        last
    }
}

/// Based on P11, Eq. (2) and (3) in [2]. This step is not mentioned in [4].
fn extremum_contrast(
    dogslice: ArrayView3<f32>,
    x: usize,
    y: usize,
    interp_offset_scale: f32,
    interp_offset_x: f32,
    interp_offset_y: f32,
) -> f32 {
    assert!(dogslice.shape()[0] == 3);
    let prev = dogslice.index_axis(Axis(0), 0);
    let curr = dogslice.index_axis(Axis(0), 1);
    let next = dogslice.index_axis(Axis(0), 2);
    // 3D Gradient
    let g1 = (next[(y, x)] - prev[(y, x)]) / 2.;
    let g2 = (curr[(y + 1, x)] - curr[(y - 1, x)]) / 2.;
    let g3 = (curr[(y, x + 1)] - curr[(y, x - 1)]) / 2.;
    // Value of the interpolating function at x̂ in [2], or α* in [4].
    let interp = interp_offset_scale * g1 + interp_offset_y * g2 + interp_offset_x * g3;
    curr[(y, x)] + interp / 2.
}

/// Measures "edgeness" of a point the ratio between eigenvalues of the Hessian matrix.
/// P382, Eq. (17) and Eq. (18) in [4]
fn extremum_is_on_edge(
    dog_curr: ArrayView2<f32>,
    ScaleSpacePoint { scale: _, y, x }: ScaleSpacePoint,
    edge_limit: f32,
) -> bool {
    assert!(x > 0 && x < dog_curr.shape()[1] - 1);
    assert!(y > 0 && y < dog_curr.shape()[0] - 1);
    let val2x = dog_curr[(y, x)] * 2.0;
    let h11 = dog_curr[(y + 1, x)] + dog_curr[(y - 1, x)] - val2x;
    let d22 = dog_curr[(y, x + 1)] + dog_curr[(y, x - 1)] - val2x;

    let h12 = (dog_curr[(y + 1, x + 1)] - dog_curr[(y + 1, x - 1)] - dog_curr[(y - 1, x + 1)]
        + dog_curr[(y - 1, x - 1)])
        / 4.;

    let tr = d22 + h11;
    let det = d22 * h11 - h12 * h12;
    if det <= 0. {
        return true;
    }
    // edgeness = tr^2 / det
    //     edgeness > (C_edge + 1)^2 / C_edge
    // <=> tr^2 * C_edge > (C_edge + 1)^2 * det
    (tr * tr * edge_limit) > (edge_limit + 1.0).powi(2) * det
}

/// Reference orientations of an extremum in degrees, strongest first.
/// See Section 4.1.C in [4].
pub(crate) fn orientations(scale_space: &[Array3<f32>], extremum: &Extremum) -> Vec<f32> {
    // Side length of patch over which gradient orientation histogram is computed.
    // See Eq. (19) in [4]
    let radius: i32 = (3. * ORIENTATION_HISTOGRAM_RADIUS * extremum.sigma).round() as i32;
    let hist = gradient_direction_histogram(
        scale_space[extremum.octave].slice(s![extremum.scale, .., ..]),
        extremum.xi as u32,
        extremum.yi as u32,
        radius,
        LAMBDA_ORI * extremum.sigma,
        ORIENTATION_HISTOGRAM_BINS,
    );
    let histogram_max = hist
        .iter()
        .copied()
        .max_by(f32::total_cmp)
        .expect("vec is not empty");
    let localmax_threshold = histogram_max * ORIENTATION_HISTOGRAM_LOCALMAX_RATIO;

    (0..hist.len())
        .filter_map(|k| {
            // h_k- and h_k+ in [4].
            // Histogram indices wrap around since bins correspond to angles.
            let k_minus = if k > 0 { k - 1 } else { hist.len() - 1 };
            let k_plus = if k < hist.len() - 1 { k + 1 } else { 0 };
            let is_local_max = hist[k] > hist[k_minus] && hist[k] > hist[k_plus];
            let is_close_to_global_max = hist[k] >= localmax_threshold;
            if !(is_local_max && is_close_to_global_max) {
                return None;
            }
            // argmax of the quadratic function interpolating h_k-, h_k, h_k+
            // See Eq. (23) in [4]
            let interp =
                (hist[k_minus] - hist[k_plus]) / (hist[k_minus] - 2.0 * hist[k] + hist[k_plus]);
            let bin: f32 = k as f32 + 0.5 * interp;
            let bin = if bin < 0.0 {
                hist.len() as f32 + bin
            } else if bin >= hist.len() as f32 {
                bin - hist.len() as f32
            } else {
                bin
            };
            // The angles are shuffled around to match OpenCV
            let angle: f32 = 360.0 - (360.0 / hist.len() as f32) * bin;
            Some((hist[k], angle))
        })
        .sorted_by(|a, b| b.0.total_cmp(&a.0))
        .take(MAX_ORIENTATIONS)
        .map(|(_, angle)| angle)
        .collect()
}

/// Histogram of gradient directions in square patch of side length 2*radius around (row, col).
/// See Section 4.1 in [4].
fn gradient_direction_histogram(
    img: ArrayView2<f32>,
    x: u32,
    y: u32,
    radius: i32,
    sigma: f32,
    n_bins: usize,
) -> Vec<f32> {
    assert!(n_bins >= 2);
    // Denominator of exponent in Eq. (20) in [4], used to compute weights
    let grad_weight_scale = -1.0 / (2.0 * sigma * sigma);

    // x/y gradients are weighted by their distance from the point at (row, col).
    // weights holds the exponent of the weighting factor in Eq. (20) in [4]
    let (grads_x, grads_y, grad_weights): (Vec<f32>, Vec<f32>, Vec<f32>) = (-radius..=radius)
        .filter_map(|y_patch| {
            let y: i64 = i64::from(y) + i64::from(y_patch);
            if y <= 0 || y as usize >= img.shape()[0] - 1 {
                return None;
            }
            Some((y as usize, y_patch))
        })
        .flat_map(|(y_img, y_patch)| {
            (-radius..=radius)
                .filter_map(|x_patch| {
                    let x = x as isize + x_patch as isize;
                    if x <= 0 || x as usize >= img.shape()[1] - 1 {
                        return None;
                    }
                    Some((x as usize, x_patch))
                })
                .map(move |(x_img, x_patch)| {
                    let dx = img[(y_img, x_img + 1)] - img[(y_img, x_img - 1)];
                    let dy = img[(y_img - 1, x_img)] - img[(y_img + 1, x_img)];
                    // squared euclidian distance from (row, col) * weighting factor
                    let w = (y_patch * y_patch + x_patch * x_patch) as f32 * grad_weight_scale;
                    (dx, dy, w)
                })
        })
        .multiunzip();

    // Finalizing the term in Eq. (20) in [4]
    let grad_weights = grad_weights.into_iter().map(|x| x.exp());
    // gradient magnitudes
    let magnitudes = grads_x
        .iter()
        .zip(&grads_y)
        .map(|(x, y)| (x * x + y * y).sqrt());
    let orientations = grads_x
        .iter()
        .copied()
        .zip(&grads_y)
        .map(|(x, y)| f64::from(*y).atan2(x.into()) as f32);

    // Range of angles (radians) assigned to one histogram bin
    let bin_angle_step = n_bins as f32 / (PI32 * 2.);
    // Histogram bin index as given by Eq. (21) in [4]
    let hist_bin = orientations.into_iter().map(|ori| {
        let raw_bin = bin_angle_step * ori;
        // raw_bin is in range [-n_bins / 2; n_bins / 2];
        let bin: i32 = raw_bin.round() as i32;
        if bin >= n_bins as i32 {
            (bin - n_bins as i32) as usize
        } else if bin < 0 {
            (bin + n_bins as i32) as usize
        } else {
            bin as usize
        }
    });

    // The gradient orientation histogram undergoes a final smoothing step.
    // In [4], smoothing is done by convolving 6 times with a kernel of [1/3, 1/3, 1/3].
    // In OpenCV, the kernel [1/16, 4/16, 6/16, 4/16, 1/16] is instead used one time only.
    // raw_hist has length n_bins + 4 because the convolution is circular/cyclic and  wraps around,
    // so we copy the first and last 2 values to the other end of the histogram to get this wrapping.
    let mut raw_hist = vec![0.0; n_bins + 4];
    izip!(hist_bin, magnitudes, grad_weights).for_each(|(bin, mag, weight)| {
        raw_hist[bin + 2] += weight * mag;
    });
    raw_hist[1] = raw_hist[n_bins + 1];
    raw_hist[0] = raw_hist[n_bins];
    raw_hist[n_bins + 2] = raw_hist[2];
    raw_hist[n_bins + 3] = raw_hist[3];
    let mut hist = vec![0.; n_bins];
    for i in 2..n_bins + 2 {
        hist[i - 2] = (raw_hist[i - 2] + raw_hist[i + 2]) * (1. / 16.)
            + (raw_hist[i - 1] + raw_hist[i + 1]) * (4. / 16.)
            + raw_hist[i] * 6. / 16.;
    }
    hist
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn params(mode: SiftMode) -> ExtremaParams {
        ExtremaParams::new(&Config {
            sift_mode: mode,
            ..Config::default()
        })
    }

    #[test]
    fn mode_specific_refinement() {
        let opencv = params(SiftMode::OpenCV);
        assert_eq!(opencv.pre_threshold, 1.0 / 255.0);
        assert_eq!(opencv.max_offset, 0.5);
        assert!(opencv.reject_unconverged);

        let vlfeat = params(SiftMode::VLFeat);
        assert!((vlfeat.pre_threshold - 0.8 * 0.04 / 3.0).abs() < 1e-7);
        assert_eq!(vlfeat.max_offset, 0.6);
        assert!(!vlfeat.reject_unconverged);
    }

    /// Isotropic blob in the middle scale of a 3 level DoG stack.
    fn blob_dog(peak_scale: usize) -> Array3<f32> {
        Array3::from_shape_fn((5, 32, 32), |(s, y, x)| {
            let dy = y as f32 - 16.0;
            let dx = x as f32 - 15.0;
            let ds = s as f32 - peak_scale as f32;
            -(dx * dx + dy * dy) * 0.01 - ds * ds * 0.05 + 0.5
        })
    }

    #[test]
    fn finds_and_refines_blob_maximum() {
        let dogs = vec![blob_dog(2)];
        let params = params(SiftMode::PopSift);
        let found: Vec<_> = find_extrema(&dogs, &params).collect();
        assert_eq!(found.len(), 1);
        let e = &found[0];
        assert_eq!((e.xi, e.yi, e.scale), (15, 16, 2));
        assert!((e.x - 15.0).abs() < 1e-3);
        assert!((e.y - 16.0).abs() < 1e-3);
        assert!((e.sigma - 1.6 * 2_f32.powf(2.0 / 3.0)).abs() < 1e-3);
        assert!((e.response - 0.5).abs() < 1e-4);
    }

    #[test]
    fn flat_dog_has_no_extrema() {
        let dogs = vec![Array3::zeros((5, 32, 32))];
        for mode in SiftMode::ALL {
            assert_eq!(find_extrema(&dogs, &params(*mode)).count(), 0);
        }
    }

    #[test]
    fn edges_are_rejected() {
        // elongated ridge along the y axis: curvature in x is 100 times the one in y
        let dogs = vec![Array3::from_shape_fn((5, 32, 32), |(s, y, x)| {
            let dx = x as f32 - 15.0;
            let dy = y as f32 - 16.0;
            let ds = s as f32 - 2.0;
            -dx * dx * 0.05 - dy * dy * 0.0005 - ds * ds * 0.05 + 0.5
        })];
        let mut lenient = params(SiftMode::OpenCV);
        lenient.edge_limit = 1000.0;
        assert_eq!(find_extrema(&dogs, &lenient).count(), 1);
        assert_eq!(find_extrema(&dogs, &params(SiftMode::OpenCV)).count(), 0);
    }

    #[test]
    fn single_dominant_orientation() {
        // intensity ramp increasing with x: all gradients point the same way
        let level = Array2::from_shape_fn((32, 32), |(_y, x)| x as f32 / 32.0);
        let mut octave = Array3::zeros((6, 32, 32));
        for mut l in octave.outer_iter_mut() {
            l.assign(&level);
        }
        let extremum = Extremum {
            octave: 0,
            scale: 2,
            xi: 16,
            yi: 16,
            x: 16.0,
            y: 16.0,
            sigma: 2.0,
            response: 1.0,
        };
        let angles = orientations(&[octave], &extremum);
        assert_eq!(angles.len(), 1);
        // gradient along +x maps to 360 degrees in OpenCV's convention
        assert!((angles[0] - 360.0).abs() < 1.0 || angles[0].abs() < 1.0);
    }
}
