//! Extraction results handed back to the caller.

use std::time::Duration;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::descriptor::DESCRIPTOR_SIZE;
use crate::engine::ProcessingMode;
use crate::error::FeatureError;
use crate::matching::{ratio_match, Match};

/// A keypoint. Position and sigma are in input image pixels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Feature {
    pub x: f32,
    pub y: f32,
    pub sigma: f32,
    pub response: f32,
    pub octave: usize,
    /// Reference orientations in degrees, strongest first. Between 1 and 4 entries.
    pub orientations: Vec<f32>,
    /// Row of the descriptor of the first orientation. The others follow directly.
    pub descriptor_offset: usize,
}

/// Features and descriptors of one image.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    features: Vec<Feature>,
    /// One row of 128 values per orientation of every feature.
    descriptors: Array2<f32>,
    /// Feature index of every descriptor row.
    owners: Vec<usize>,
    mode: ProcessingMode,
    processing_time: Duration,
    matches: Vec<Match>,
    released: bool,
}

impl FeatureCollection {
    pub(crate) fn new(
        features: Vec<Feature>,
        descriptors: Array2<f32>,
        mode: ProcessingMode,
        processing_time: Duration,
    ) -> Self {
        debug_assert_eq!(descriptors.ncols(), DESCRIPTOR_SIZE);
        let owners: Vec<usize> = features
            .iter()
            .enumerate()
            .flat_map(|(i, f)| std::iter::repeat(i).take(f.orientations.len()))
            .collect();
        debug_assert_eq!(owners.len(), descriptors.nrows());
        FeatureCollection {
            features,
            descriptors,
            owners,
            mode,
            processing_time,
            matches: Vec::new(),
            released: false,
        }
    }

    pub fn empty(mode: ProcessingMode) -> Self {
        Self::new(
            Vec::new(),
            Array2::zeros((0, DESCRIPTOR_SIZE)),
            mode,
            Duration::ZERO,
        )
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Number of descriptors, one per orientation of every feature.
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.nrows()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn descriptors(&self) -> ArrayView2<'_, f32> {
        self.descriptors.view()
    }

    pub fn descriptor(&self, index: usize) -> ArrayView1<'_, f32> {
        self.descriptors.row(index)
    }

    /// The feature a descriptor row belongs to, and the orientation of that row.
    pub fn descriptor_owner(&self, index: usize) -> (&Feature, f32) {
        let feature = &self.features[self.owners[index]];
        let orientation = feature.orientations[index - feature.descriptor_offset];
        (feature, orientation)
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Wall clock time the worker spent on this image.
    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    /// Matches found by the last call to [`FeatureCollection::match_with`].
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Match every descriptor of `self` against `other` and remember the result.
    /// `Match::left` indexes into `self`, `Match::right` into `other`.
    pub fn match_with(
        &mut self,
        other: &FeatureCollection,
        ratio: f32,
    ) -> Result<&[Match], FeatureError> {
        if self.released || other.released {
            return Err(FeatureError::Released);
        }
        if self.mode != ProcessingMode::MatchingMode || other.mode != ProcessingMode::MatchingMode
        {
            return Err(FeatureError::NotMatchable);
        }
        self.matches = ratio_match(self.descriptors.view(), other.descriptors.view(), ratio);
        Ok(&self.matches)
    }

    /// Free features, descriptors and matches. Counts read 0 afterwards.
    pub fn release(&mut self) -> Result<(), FeatureError> {
        if self.released {
            return Err(FeatureError::AlreadyReleased);
        }
        self.features = Vec::new();
        self.descriptors = Array2::zeros((0, DESCRIPTOR_SIZE));
        self.owners = Vec::new();
        self.matches = Vec::new();
        self.released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two features, the second one with two orientations.
    fn collection(mode: ProcessingMode) -> FeatureCollection {
        let features = vec![
            Feature {
                x: 10.0,
                y: 12.0,
                sigma: 2.0,
                response: 0.1,
                octave: 0,
                orientations: vec![45.0],
                descriptor_offset: 0,
            },
            Feature {
                x: 30.0,
                y: 5.0,
                sigma: 3.5,
                response: 0.2,
                octave: 1,
                orientations: vec![90.0, 270.0],
                descriptor_offset: 1,
            },
        ];
        let descriptors = Array2::from_shape_fn((3, DESCRIPTOR_SIZE), |(r, c)| {
            if c % 3 == r {
                1.0
            } else {
                0.0
            }
        });
        FeatureCollection::new(features, descriptors, mode, Duration::from_millis(3))
    }

    #[test]
    fn counts_and_owners() {
        let c = collection(ProcessingMode::MatchingMode);
        assert_eq!(c.feature_count(), 2);
        assert_eq!(c.descriptor_count(), 3);
        let (feature, orientation) = c.descriptor_owner(2);
        assert_eq!(feature.x, 30.0);
        assert_eq!(orientation, 270.0);
        assert_eq!(c.descriptor_owner(0).1, 45.0);
    }

    #[test]
    fn self_match_is_identity() {
        let mut a = collection(ProcessingMode::MatchingMode);
        let b = collection(ProcessingMode::MatchingMode);
        let matches = a.match_with(&b, 0.8).unwrap();
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|m| m.left == m.right && m.distance == 0.0));
        assert_eq!(a.matches().len(), 3);
    }

    #[test]
    fn extraction_mode_is_not_matchable() {
        let mut a = collection(ProcessingMode::ExtractingMode);
        let b = collection(ProcessingMode::MatchingMode);
        assert_eq!(a.match_with(&b, 0.8), Err(FeatureError::NotMatchable));
    }

    #[test]
    fn matching_against_empty_collection() {
        let mut a = collection(ProcessingMode::MatchingMode);
        let empty = FeatureCollection::empty(ProcessingMode::MatchingMode);
        assert!(a.match_with(&empty, 0.8).unwrap().is_empty());
        let mut empty = empty;
        assert!(empty.match_with(&a, 0.8).unwrap().is_empty());
    }

    #[test]
    fn release_twice_fails() {
        let mut a = collection(ProcessingMode::MatchingMode);
        assert_eq!(a.release(), Ok(()));
        assert!(a.is_released());
        assert_eq!(a.feature_count(), 0);
        assert_eq!(a.descriptor_count(), 0);
        assert_eq!(a.release(), Err(FeatureError::AlreadyReleased));
    }

    #[test]
    fn released_collection_cannot_match() {
        let mut a = collection(ProcessingMode::MatchingMode);
        let mut b = collection(ProcessingMode::MatchingMode);
        b.release().unwrap();
        assert_eq!(a.match_with(&b, 0.8), Err(FeatureError::Released));
        a.release().unwrap();
        assert_eq!(a.match_with(&b, 0.8), Err(FeatureError::Released));
    }
}
