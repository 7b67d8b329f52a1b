// This implementation of SIFT is derived from works by Rob Hess and Willow Garage Inc.
// It is made available under the terms of the MIT license included in the root of this repository.
//
// Copyright 2006-2010 Rob Hess
// Copyright 2009 Willow Garage Inc.
// Copyright 2024 Thomas Nibler

use image::imageops::{resize, FilterType};
use image::{ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;

pub type LumaFImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Basic image operations used by the extraction pipeline.
/// For testing or benchmarking, it's useful to swap in different blur and interpolation
/// procedures while keeping the rest of the pipeline identical.
pub trait Processing {
    /// Convolve with a normalized, odd-length 1D kernel along both axes.
    fn gaussian_blur(img: &LumaFImage, kernel: &[f32]) -> LumaFImage;
    fn resize_linear(img: &LumaFImage, width: u32, height: u32) -> LumaFImage;
    fn resize_nearest(img: &LumaFImage, width: u32, height: u32) -> LumaFImage;
}

/// Uses `imageproc` for convolution and `image` for resizing.
pub struct ImageprocProcessing;

impl Processing for ImageprocProcessing {
    fn gaussian_blur(img: &LumaFImage, kernel: &[f32]) -> LumaFImage {
        separable_filter_equal(img, kernel)
    }

    fn resize_linear(img: &LumaFImage, width: u32, height: u32) -> LumaFImage {
        resize(img, width, height, FilterType::Triangle)
    }

    fn resize_nearest(img: &LumaFImage, width: u32, height: u32) -> LumaFImage {
        resize(img, width, height, FilterType::Nearest)
    }
}

/// Sampled and normalized Gaussian with `2 * radius + 1` taps.
pub(crate) fn gaussian_kernel(sigma: f32, radius: usize) -> Vec<f32> {
    let radius = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Bilinear upsampling that maps pixel corners onto each other, i.e. source pixel `i` lands
/// on destination pixel `i * factor` exactly.
pub(crate) fn upscale_corner_aligned(img: &LumaFImage, width: u32, height: u32) -> LumaFImage {
    let fx = img.width() as f32 / width as f32;
    let fy = img.height() as f32 / height as f32;
    ImageBuffer::from_fn(width, height, |x, y| {
        Luma([sample_bilinear(img, x as f32 * fx, y as f32 * fy)])
    })
}

/// Bilinear lookup with coordinates clamped to the image.
pub(crate) fn sample_bilinear(img: &LumaFImage, x: f32, y: f32) -> f32 {
    let max_x = (img.width() - 1) as f32;
    let max_y = (img.height() - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor();
    let y0 = y.floor();
    let x1 = (x0 + 1.0).min(max_x);
    let y1 = (y0 + 1.0).min(max_y);
    let ax = x - x0;
    let ay = y - y0;
    let px = |x: f32, y: f32| img.get_pixel(x as u32, y as u32)[0];
    let top = px(x0, y0) * (1.0 - ax) + px(x1, y0) * ax;
    let bottom = px(x0, y1) * (1.0 - ax) + px(x1, y1) * ax;
    top * (1.0 - ay) + bottom * ay
}
