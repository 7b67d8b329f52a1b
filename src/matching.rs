//! Brute force descriptor matching with Lowe's ratio test.

use ndarray::{ArrayView1, ArrayView2, Axis};

/// A descriptor correspondence between two feature collections.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Match {
    /// Descriptor row in the collection `match_with` was called on.
    pub left: usize,
    /// Descriptor row in the other collection.
    pub right: usize,
    /// Euclidean distance to the nearest descriptor.
    pub distance: f32,
    /// Euclidean distance to the second nearest descriptor, infinite if there is none.
    pub second_distance: f32,
}

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the nearest row of `train` together with the distances to the nearest and second
/// nearest rows. `None` if `train` has no rows.
pub fn nearest_two(query: ArrayView1<f32>, train: ArrayView2<f32>) -> Option<(usize, f32, f32)> {
    let mut best: Option<(usize, f32)> = None;
    let mut second = f32::INFINITY;
    for (i, row) in train.axis_iter(Axis(0)).enumerate() {
        let d = squared_distance(query, row);
        match best {
            Some((_, best_d)) if d >= best_d => second = second.min(d),
            Some((_, best_d)) => {
                second = best_d;
                best = Some((i, d));
            }
            None => best = Some((i, d)),
        }
    }
    best.map(|(i, d)| (i, d.sqrt(), second.sqrt()))
}

/// Match every row of `left` against `right`. A match is accepted when the nearest distance is
/// below `ratio` times the second nearest. With a single row in `right` every query matches it.
pub(crate) fn ratio_match(left: ArrayView2<f32>, right: ArrayView2<f32>, ratio: f32) -> Vec<Match> {
    if right.nrows() == 0 {
        return Vec::new();
    }
    left.axis_iter(Axis(0))
        .enumerate()
        .filter_map(|(l, query)| {
            let (r, distance, second_distance) = nearest_two(query, right)?;
            let accepted = right.nrows() == 1 || distance < ratio * second_distance;
            accepted.then_some(Match {
                left: l,
                right: r,
                distance,
                second_distance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn nearest_two_finds_closest_rows() {
        let train = array![[0.0, 0.0], [3.0, 4.0], [1.0, 0.0], [10.0, 0.0]];
        let (idx, d1, d2) = nearest_two(array![0.9, 0.0].view(), train.view()).unwrap();
        assert_eq!(idx, 2);
        assert!((d1 - 0.1).abs() < 1e-6);
        assert!((d2 - 0.9).abs() < 1e-6);
    }

    #[test]
    fn nearest_two_of_empty_train() {
        let train = Array2::<f32>::zeros((0, 4));
        assert_eq!(nearest_two(array![1.0, 2.0, 3.0, 4.0].view(), train.view()), None);
    }

    #[test]
    fn ratio_test_rejects_ambiguous_matches() {
        let left = array![[0.0, 0.0], [5.0, 5.0]];
        // first query is unambiguous, second one is equally close to two rows
        let right = array![[0.1, 0.0], [4.0, 5.0], [6.0, 5.0]];
        let matches = ratio_match(left.view(), right.view(), 0.8);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].left, 0);
        assert_eq!(matches[0].right, 0);
        assert!(matches[0].distance < matches[0].second_distance);
    }

    #[test]
    fn single_train_row_always_matches() {
        let left = array![[0.0, 0.0], [100.0, 100.0]];
        let right = array![[1.0, 1.0]];
        let matches = ratio_match(left.view(), right.view(), 0.5);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.right == 0 && m.second_distance.is_infinite()));
    }

    #[test]
    fn empty_sides_give_no_matches() {
        let empty = Array2::<f32>::zeros((0, 2));
        let some = array![[1.0, 2.0]];
        assert!(ratio_match(empty.view(), some.view(), 0.8).is_empty());
        assert!(ratio_match(some.view(), empty.view(), 0.8).is_empty());
    }
}
