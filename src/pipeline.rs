//! Extracting and matching a left/right image pair on an engine.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;

use crate::engine::Engine;
use crate::error::Result;
use crate::features::FeatureCollection;
use crate::loader::{load_image, validate_input, LoaderStrategy};

/// Application level switches that are not engine parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub left: PathBuf,
    pub right: PathBuf,
    pub loader: LoaderStrategy,
    pub print_dev_info: bool,
    pub print_time_info: bool,
    pub write_as_uchar: bool,
    pub dont_write: bool,
    pub output_dir: PathBuf,
}

impl RunOptions {
    pub fn new(left: impl Into<PathBuf>, right: impl Into<PathBuf>) -> Self {
        RunOptions {
            left: left.into(),
            right: right.into(),
            loader: LoaderStrategy::default(),
            print_dev_info: false,
            print_time_info: false,
            write_as_uchar: false,
            dont_write: false,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Both collections of a processed pair. `left` carries the matches against `right`.
#[derive(Debug)]
pub struct PairReport {
    pub left: FeatureCollection,
    pub right: FeatureCollection,
    /// Time from the first load until both results were available.
    pub extraction_time: Duration,
    pub matching_time: Duration,
}

impl PairReport {
    pub fn match_count(&self) -> usize {
        self.left.matches().len()
    }

    pub fn feature_count(&self) -> usize {
        self.left.feature_count() + self.right.feature_count()
    }

    pub fn descriptor_count(&self) -> usize {
        self.left.descriptor_count() + self.right.descriptor_count()
    }

    /// Free both collections.
    pub fn release(&mut self) -> Result<()> {
        self.left.release()?;
        self.right.release()?;
        Ok(())
    }
}

/// Validate both inputs, submit them one after the other, wait for both results and match
/// left against right.
pub fn run_pair(engine: &Engine, options: &RunOptions) -> Result<PairReport> {
    validate_input(&options.left)?;
    validate_input(&options.right)?;

    let start = Instant::now();
    let left = engine.enqueue(load_image(&options.left, options.loader)?)?;
    let right = engine.enqueue(load_image(&options.right, options.loader)?)?;
    let mut left = left.features()?;
    let right = right.features()?;
    let extraction_time = start.elapsed();

    let start = Instant::now();
    let n_matches = left.match_with(&right, engine.config().match_ratio)?.len();
    let matching_time = start.elapsed();
    info!(
        left = left.feature_count(),
        right = right.feature_count(),
        matches = n_matches,
        "pair processed"
    );

    Ok(PairReport {
        left,
        right,
        extraction_time,
        matching_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::ProcessingMode;
    use crate::error::{FeatureError, LoadError, SiftError};
    use image::{GrayImage, Luma};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Blurred random texture, so that descriptors are distinctive.
    fn texture(seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = GrayImage::from_fn(80, 80, |_, _| Luma([rng.gen::<u8>()]));
        imageproc::filter::gaussian_blur_f32(&noise, 2.0)
    }

    fn engine(mode: ProcessingMode) -> Engine {
        Engine::new(
            Config {
                workers: Some(2),
                ..Config::default()
            },
            mode,
        )
        .unwrap()
    }

    #[test]
    fn identical_images_match_themselves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("texture.png");
        texture(1).save(&path).unwrap();

        let mut report = run_pair(&engine(ProcessingMode::MatchingMode), &RunOptions::new(&path, &path))
            .unwrap();
        assert!(report.left.feature_count() > 0);
        assert_eq!(report.left.feature_count(), report.right.feature_count());
        assert!(report.match_count() > 0);
        let exact = report
            .left
            .matches()
            .iter()
            .filter(|m| m.distance == 0.0)
            .count();
        assert!(exact * 2 > report.match_count());

        report.release().unwrap();
        assert!(matches!(
            report.release(),
            Err(SiftError::Feature(FeatureError::AlreadyReleased))
        ));
    }

    #[test]
    fn missing_input_fails_before_submission() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.png");
        texture(2).save(&present).unwrap();
        let options = RunOptions::new(&present, dir.path().join("absent.png"));
        let err = run_pair(&engine(ProcessingMode::MatchingMode), &options).unwrap_err();
        assert!(matches!(err, SiftError::Load(LoadError::NotFound(_))));
    }

    #[test]
    fn extraction_mode_cannot_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("texture.png");
        texture(3).save(&path).unwrap();
        let err = run_pair(
            &engine(ProcessingMode::ExtractingMode),
            &RunOptions::new(&path, &path),
        )
        .unwrap_err();
        assert!(matches!(err, SiftError::Feature(FeatureError::NotMatchable)));
    }
}
