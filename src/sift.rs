// This implementation of SIFT is derived from works by Rob Hess and Willow Garage Inc.
// It is made available under the terms of the MIT license included in the root of this repository.
//
// Copyright 2006-2010 Rob Hess
// Copyright 2009 Willow Garage Inc.
// Copyright 2024 Thomas Nibler

//! The extraction pipeline a worker runs for every job.

use std::path::Path;
use std::time::Instant;

use image::GrayImage;
use ndarray::{Array2, Axis};
use tracing::{debug, warn};

use crate::config::Config;
use crate::descriptor::{compute_descriptor, normalize, DESCRIPTOR_SIZE};
use crate::engine::ProcessingMode;
use crate::error::ConfigError;
use crate::extrema::{find_extrema, orientations, ExtremaParams, Extremum};
use crate::features::{Feature, FeatureCollection};
use crate::filter::{filter_extrema, FilterParams};
use crate::processing::{ImageprocProcessing, Processing};
use crate::pyramid::ScaleSpace;

/// Extract features from a single image on the calling thread, without an engine.
/// The result is in [`ProcessingMode::ExtractingMode`].
pub fn extract(img: &GrayImage, config: &Config) -> Result<FeatureCollection, ConfigError> {
    config.validate()?;
    Ok(extract_with_processing::<ImageprocProcessing>(
        img,
        config,
        ProcessingMode::ExtractingMode,
        None,
    ))
}

/// Extract features using the provided blur and resize implementations.
/// If `dump_dir` is set, every scale space level is written there as a PNG.
pub fn extract_with_processing<P: Processing>(
    img: &GrayImage,
    config: &Config,
    mode: ProcessingMode,
    dump_dir: Option<&Path>,
) -> FeatureCollection {
    let start = Instant::now();
    let scale_space = ScaleSpace::build::<P>(img, config);
    if let Some(dir) = dump_dir {
        if let Err(err) = scale_space.dump(dir) {
            warn!(dir = %dir.display(), %err, "failed to write scale space images");
        }
    }

    let params = ExtremaParams::new(config);
    let extrema: Vec<Extremum> = find_extrema(&scale_space.dog, &params).collect();
    let n_found = extrema.len();
    let extrema = filter_extrema(
        extrema,
        &FilterParams {
            max_extrema: config.filter_max_extrema,
            grid: config.filter_grid,
            sort: config.filter_sort,
            width: img.width(),
            height: img.height(),
            delta_min: config.delta_min(),
        },
    );
    debug!(found = n_found, kept = extrema.len(), "extrema");

    let (features, descriptors) = describe(&scale_space, &extrema, config);
    FeatureCollection::new(features, descriptors, mode, start.elapsed())
}

/// Orientations and descriptors of every extremum, with positions converted to input pixels.
fn describe(
    scale_space: &ScaleSpace,
    extrema: &[Extremum],
    config: &Config,
) -> (Vec<Feature>, Array2<f32>) {
    let mut features = Vec::with_capacity(extrema.len());
    let mut rows: Vec<f32> = Vec::with_capacity(extrema.len() * DESCRIPTOR_SIZE);
    let mut n_rows = 0;

    for extremum in extrema {
        let angles = orientations(&scale_space.octaves, extremum);
        if angles.is_empty() {
            continue;
        }
        let img = scale_space.octaves[extremum.octave].index_axis(Axis(0), extremum.scale);
        for angle in &angles {
            let mut desc = compute_descriptor(
                &img,
                extremum.x,
                extremum.y,
                extremum.sigma,
                360.0 - angle,
                config.desc_mode,
            );
            normalize(&mut desc, config.norm_mode, config.norm_multi);
            rows.extend(desc);
        }

        // Undo the octave subsampling and the seed image rescaling
        let to_input = 2_f32.powi(extremum.octave as i32) * config.delta_min();
        features.push(Feature {
            x: extremum.x * to_input,
            y: extremum.y * to_input,
            sigma: extremum.sigma * to_input,
            response: extremum.response,
            octave: extremum.octave,
            descriptor_offset: n_rows,
            orientations: angles,
        });
        n_rows = rows.len() / DESCRIPTOR_SIZE;
    }

    let descriptors = Array2::from_shape_vec((n_rows, DESCRIPTOR_SIZE), rows)
        .expect("rows are pushed in chunks of DESCRIPTOR_SIZE");
    (features, descriptors)
}
