// This implementation of SIFT is derived from works by Rob Hess and Willow Garage Inc.
// It is made available under the terms of the MIT license included in the root of this repository.
//
// Copyright 2006-2010 Rob Hess
// Copyright 2009 Willow Garage Inc.
// Copyright 2024 Thomas Nibler

//! SIFT feature extraction on a pool of background workers, and matching of the results.
//!
//! Images are submitted to an [`Engine`] which returns a [`JobHandle`] right away. Resolving a
//! handle blocks until a worker has built the scale space, detected and refined extrema,
//! assigned orientations and computed descriptors. Two [`FeatureCollection`]s produced in
//! [`ProcessingMode::MatchingMode`] can be matched with Lowe's ratio test.
//!
//! ```rust,no_run
//! use sift_match::{Config, Engine, ProcessingMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(Config::default(), ProcessingMode::MatchingMode)?;
//! let left = engine.enqueue(image::open("left.png")?.to_luma8())?;
//! let right = engine.enqueue(image::open("right.png")?.to_luma8())?;
//! let mut left = left.features()?;
//! let right = right.features()?;
//! let matches = left.match_with(&right, 0.8)?;
//! println!("{} matches", matches.len());
//! # Ok(())
//! # }
//! ```
//!
//! Useful resources:
//! - [1]: [Lowe 1999](https://www.cs.ubc.ca/~lowe/papers/iccv99.pdf)
//! - [2]: [Lowe 2004](https://www.cs.ubc.ca/~lowe/papers/ijcv04.pdf)
//! - [3]: [Mikolajczyk 2004](https://robots.ox.ac.uk/~vgg/research/affine/det_eval_files/mikolajczyk_ijcv2004.pdf)
//! - [4]: [Rey-Otero 2014](https://www.ipol.im/pub/art/2014/82/article.pdf)
//!
//! The extraction follows [4] (Anatomy of the SIFT Method) in particular, with switches for
//! the places where OpenCV, VLFeat and PopSift differ: how histograms are smoothed, angle
//! computations, kernel sizes and some details of the final descriptor vector.

pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod loader;
pub mod matching;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod pyramid;
pub mod sift;

mod descriptor;
mod extrema;
mod filter;
mod pgm;

pub use config::{
    Config, DescMode, FilterSort, GaussMode, LogMode, NormMode, ScalingMode, SiftMode,
};
pub use descriptor::DESCRIPTOR_SIZE;
pub use engine::{Engine, JobHandle, JobStatus, ProcessingMode};
pub use error::{ConfigError, EngineError, FeatureError, LoadError, OutputError, Result, SiftError};
pub use features::{Feature, FeatureCollection};
pub use loader::{load_image, validate_input, LoaderStrategy};
pub use matching::Match;
pub use pipeline::{run_pair, PairReport, RunOptions};
pub use processing::{ImageprocProcessing, Processing};
pub use pyramid::GaussTable;
pub use sift::{extract, extract_with_processing};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
