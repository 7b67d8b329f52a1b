// This implementation of SIFT is derived from works by Rob Hess and Willow Garage Inc.
// It is made available under the terms of the MIT license included in the root of this repository.
//
// Copyright 2006-2010 Rob Hess
// Copyright 2009 Willow Garage Inc.
// Copyright 2024 Thomas Nibler

//! Gaussian scale space and difference of Gaussians.
//! See Section 2 and 3.1 in [4] (Anatomy of the SIFT Method).

use std::cmp::min;
use std::fmt;
use std::path::Path;

use image::buffer::ConvertBuffer;
use image::{GrayImage, Luma};
use ndarray::{s, Array3};
use nshare::AsNdarray2;
use tracing::debug;

use crate::config::{Config, GaussMode, ScalingMode, SiftMode};
use crate::processing::{gaussian_kernel, upscale_corner_aligned, LumaFImage, Processing};

/// Smallest blur the seed image receives, in input pixels. Same floor as OpenCV.
const MIN_SEED_BLUR_SQ: f32 = 0.01;

/// Kernel radius for a given blur, depending on the configured Gauss mode.
fn kernel_radius(mode: GaussMode, sigma: f32) -> usize {
    match mode {
        GaussMode::VLFeat | GaussMode::Relative => (4.0 * sigma).ceil().max(1.0) as usize,
        GaussMode::OpenCV => (3.0 * sigma).round().max(1.0) as usize,
        GaussMode::Fixed9 => 4,
        GaussMode::Fixed15 => 7,
    }
}

fn kernel_for(mode: GaussMode, sigma: f32) -> Vec<f32> {
    gaussian_kernel(sigma, kernel_radius(mode, sigma))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussLevel {
    pub level: usize,
    /// Total blur of this level relative to the octave's pixel grid.
    pub absolute_sigma: f32,
    /// Blur applied to the source image of this level.
    pub applied_sigma: f32,
    pub kernel: Vec<f32>,
}

/// Per-level blur parameters of one octave. The same table is used for every octave.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussTable {
    pub mode: GaussMode,
    pub levels: Vec<GaussLevel>,
}

impl GaussTable {
    pub fn new(config: &Config) -> Self {
        let n_levels = config.levels;
        // Geometric series of blur sigmas within an octave as given in Eq. (7).
        // Each octave contains 3 additional images 0, levels+1, levels+2,
        // hence the +3 here and everywhere else.
        let absolute: Vec<f32> = (0..n_levels + 3)
            .map(|s| config.sigma * 2_f32.powf(s as f32 / n_levels as f32))
            .collect();
        let levels = (1..n_levels + 3)
            .map(|s| {
                let previous = match config.gauss_mode {
                    GaussMode::Relative => absolute[0],
                    _ => absolute[s - 1],
                };
                let applied_sigma = (absolute[s].powi(2) - previous.powi(2)).sqrt();
                GaussLevel {
                    level: s,
                    absolute_sigma: absolute[s],
                    applied_sigma,
                    kernel: kernel_for(config.gauss_mode, applied_sigma),
                }
            })
            .collect();
        GaussTable {
            mode: config.gauss_mode,
            levels,
        }
    }
}

impl fmt::Display for GaussTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Gauss tables ({} mode)", self.mode)?;
        for level in &self.levels {
            write!(
                f,
                "level {}: sigma {:.4} (applied {:.4}), {} taps:",
                level.level,
                level.absolute_sigma,
                level.applied_sigma,
                level.kernel.len()
            )?;
            for tap in &level.kernel {
                write!(f, " {tap:.5}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub(crate) struct ScaleSpace {
    /// One array of shape `(levels + 3, height, width)` per octave.
    pub octaves: Vec<Array3<f32>>,
    /// One array of shape `(levels + 2, height, width)` per octave.
    pub dog: Vec<Array3<f32>>,
}

impl ScaleSpace {
    pub fn build<P: Processing>(img: &GrayImage, config: &Config) -> Self {
        let table = GaussTable::new(config);
        let seed = create_seed_image::<P>(img, config);
        let min_axis = min(seed.width(), seed.height());
        let max_octaves: usize = ((min_axis as f32).log2() - 2.0).round().max(0.0) as usize + 1;
        let n_octaves = config.octaves.map_or(max_octaves, |n| n.min(max_octaves));
        debug!(
            seed_width = seed.width(),
            seed_height = seed.height(),
            n_octaves,
            "building scale space"
        );

        let octaves = build_gaussian_scale_space::<P>(seed, n_octaves, &table, config);
        let dog = build_dog(&octaves, config.levels);
        ScaleSpace { octaves, dog }
    }

    pub fn n_octaves(&self) -> usize {
        self.octaves.len()
    }

    /// Write every level of every octave as an 8-bit PNG into `dir`.
    pub fn dump(&self, dir: &Path) -> Result<(), image::ImageError> {
        std::fs::create_dir_all(dir)?;
        for (o, octave) in self.octaves.iter().enumerate() {
            for (s, level) in octave.outer_iter().enumerate() {
                let (height, width) = level.dim();
                let img = GrayImage::from_fn(width as u32, height as u32, |x, y| {
                    Luma([(level[(y as usize, x as usize)] * 255.0).round().clamp(0.0, 255.0) as u8])
                });
                img.save(dir.join(format!("octave-{o}-level-{s}.png")))?;
            }
        }
        Ok(())
    }
}

/// Compute the rescaled and blurred seed image as described in [4], Eq. (6).
fn create_seed_image<P: Processing>(img: &GrayImage, config: &Config) -> LumaFImage {
    // float image with pixel values [0; 1];
    let img_f32: LumaFImage = img.convert();
    let delta = config.delta_min();
    let width = ((img.width() as f32 / delta).round() as u32).max(1);
    let height = ((img.height() as f32 / delta).round() as u32).max(1);

    let rescaled = if (width, height) == img.dimensions() {
        img_f32
    } else if delta < 1.0 && config.sift_mode != SiftMode::OpenCV {
        upscale_corner_aligned(&img_f32, width, height)
    } else {
        P::resize_linear(&img_f32, width, height)
    };

    // Blur in input pixels the seed should end up with, minus what the input already has.
    let target = config.sigma * delta;
    let sigma = (target * target - config.initial_blur * config.initial_blur)
        .max(MIN_SEED_BLUR_SQ)
        .sqrt()
        / delta;
    P::gaussian_blur(&rescaled, &kernel_for(config.gauss_mode, sigma))
}

/// See Section 2.2 in [4]
fn build_gaussian_scale_space<P: Processing>(
    seed_img: LumaFImage,
    n_octaves: usize,
    table: &GaussTable,
    config: &Config,
) -> Vec<Array3<f32>> {
    let create_octave = |initial: LumaFImage| {
        let mut imgs: Vec<LumaFImage> = Vec::with_capacity(config.levels + 3);
        imgs.push(initial);
        for level in &table.levels {
            let source = match table.mode {
                GaussMode::Relative => &imgs[0],
                _ => &imgs[imgs.len() - 1],
            };
            let blurred = P::gaussian_blur(source, &level.kernel);
            imgs.push(blurred);
        }
        imgs
    };

    let mut scale_space: Vec<Vec<LumaFImage>> = Vec::with_capacity(n_octaves);
    for octave in 0..n_octaves {
        let initial = if octave == 0 {
            seed_img.clone()
        } else {
            match config.scaling_mode {
                // The first image of each octave is the last (ignoring the two additional
                // posterior ones) image of the previous octave subsampled by a factor of 2.
                // See Eq. (8) in [4].
                ScalingMode::Default => {
                    let last_octave = &scale_space[octave - 1];
                    let initial = &last_octave[last_octave.len() - 3];
                    P::resize_nearest(initial, initial.width() / 2, initial.height() / 2)
                }
                // Downsampling the seed by 2^o divides its blur by 2^o as well.
                ScalingMode::Direct => {
                    let factor = 1_u32 << octave;
                    let scaled = P::resize_linear(
                        &seed_img,
                        (seed_img.width() / factor).max(1),
                        (seed_img.height() / factor).max(1),
                    );
                    let remaining = config.sigma * (1.0 - 4_f32.powi(-(octave as i32))).sqrt();
                    P::gaussian_blur(&scaled, &kernel_for(config.gauss_mode, remaining))
                }
            }
        };
        scale_space.push(create_octave(initial));
    }
    assert_eq!(scale_space.len(), n_octaves);

    scale_space
        .iter()
        .map(|octave| {
            assert!(octave
                .windows(2)
                .all(|w| w[0].width() == w[1].width() && w[0].height() == w[1].height()));
            let width = octave[0].width() as usize;
            let height = octave[0].height() as usize;
            let mut mat: Array3<f32> = Array3::zeros((octave.len(), height, width));
            octave.iter().enumerate().for_each(|(i, img)| {
                mat.slice_mut(s![i, .., ..]).assign(&img.as_ndarray2());
            });
            mat
        })
        .collect()
}

/// Difference of Gaussians, woof.
/// See Section 3.1 in [4]
fn build_dog(scale_space: &[Array3<f32>], levels: usize) -> Vec<Array3<f32>> {
    let dog: Vec<Array3<f32>> = scale_space
        .iter()
        .map(|octave| &octave.slice(s![1.., .., ..]) - &octave.slice(s![..-1, .., ..]))
        .collect();
    assert!(dog.iter().all(|d| d.shape()[0] == levels + 2));
    dog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ImageprocProcessing;

    #[test]
    fn gauss_table_sigmas_double_per_octave() {
        let config = Config::default();
        let table = GaussTable::new(&config);
        assert_eq!(table.levels.len(), config.levels + 2);
        let level = &table.levels[config.levels - 1];
        assert_eq!(level.level, config.levels);
        assert!((level.absolute_sigma - 2.0 * config.sigma).abs() < 1e-4);
    }

    #[test]
    fn gauss_table_radius_follows_mode() {
        for (mode, taps) in [(GaussMode::Fixed9, 9), (GaussMode::Fixed15, 15)] {
            let config = Config {
                gauss_mode: mode,
                ..Config::default()
            };
            let table = GaussTable::new(&config);
            assert!(table.levels.iter().all(|l| l.kernel.len() == taps));
        }
        let vlfeat = GaussTable::new(&Config::default());
        let opencv = GaussTable::new(&Config {
            gauss_mode: GaussMode::OpenCV,
            ..Config::default()
        });
        for (a, b) in vlfeat.levels.iter().zip(&opencv.levels) {
            assert!(a.kernel.len() >= b.kernel.len());
        }
    }

    #[test]
    fn relative_mode_blurs_from_first_level() {
        let config = Config {
            gauss_mode: GaussMode::Relative,
            ..Config::default()
        };
        let table = GaussTable::new(&config);
        for level in &table.levels {
            let expected = (level.absolute_sigma.powi(2) - config.sigma.powi(2)).sqrt();
            assert!((level.applied_sigma - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn gauss_table_display_lists_all_levels() {
        let table = GaussTable::new(&Config::default());
        let text = table.to_string();
        assert!(text.starts_with("Gauss tables (vlfeat mode)"));
        assert_eq!(text.lines().count(), table.levels.len() + 1);
    }

    #[test]
    fn scale_space_shapes() {
        let img = GrayImage::from_pixel(64, 48, Luma([128]));
        for scaling_mode in [ScalingMode::Default, ScalingMode::Direct] {
            let config = Config {
                scaling_mode,
                ..Config::default()
            };
            let ss = ScaleSpace::build::<ImageprocProcessing>(&img, &config);
            // seed is upscaled 2x: 128x96, log2(96) - 2 rounds to 5 -> 6 octaves
            assert_eq!(ss.n_octaves(), 6);
            assert_eq!(ss.octaves[0].dim(), (config.levels + 3, 96, 128));
            assert_eq!(ss.octaves[1].dim(), (config.levels + 3, 48, 64));
            assert_eq!(ss.dog[0].dim(), (config.levels + 2, 96, 128));
        }
    }

    #[test]
    fn explicit_octave_count_is_clamped() {
        let img = GrayImage::from_pixel(32, 32, Luma([0]));
        let config = Config {
            octaves: Some(2),
            downsampling: 0,
            ..Config::default()
        };
        assert_eq!(
            ScaleSpace::build::<ImageprocProcessing>(&img, &config).n_octaves(),
            2
        );
        let config = Config {
            octaves: Some(40),
            downsampling: 0,
            ..Config::default()
        };
        // log2(32) - 2 = 3 -> 4 octaves at most
        assert_eq!(
            ScaleSpace::build::<ImageprocProcessing>(&img, &config).n_octaves(),
            4
        );
    }

    #[test]
    fn uniform_image_has_flat_dog() {
        let img = GrayImage::from_pixel(40, 40, Luma([200]));
        let ss = ScaleSpace::build::<ImageprocProcessing>(&img, &Config::default());
        assert!(ss.dog.iter().all(|d| d.iter().all(|v| v.abs() < 1e-5)));
    }

    #[test]
    fn dump_writes_every_level() {
        let dir = tempfile::tempdir().unwrap();
        let img = GrayImage::from_pixel(16, 16, Luma([10]));
        let config = Config {
            downsampling: 0,
            ..Config::default()
        };
        let ss = ScaleSpace::build::<ImageprocProcessing>(&img, &config);
        ss.dump(dir.path()).unwrap();
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, ss.n_octaves() * (config.levels + 3));
    }
}
