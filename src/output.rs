//! Plain text dumps of features and matches.
//!
//! Feature files have one line per descriptor: `x y sigma angle d0 ... d127`.
//! Match files have one line per match: `lx ly rx ry distance`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::OutputError;
use crate::features::FeatureCollection;

pub const LEFT_FEATURES_FILE: &str = "output-features-left.txt";
pub const RIGHT_FEATURES_FILE: &str = "output-features-right.txt";
pub const MATCHES_FILE: &str = "output-matches.txt";

/// Write one line per descriptor. With `as_uchar` the descriptor values are rounded and
/// saturated to `0..=255`.
pub fn write_features<W: Write>(
    mut writer: W,
    features: &FeatureCollection,
    as_uchar: bool,
) -> io::Result<()> {
    for (index, desc) in features.descriptors().rows().into_iter().enumerate() {
        let (feature, angle) = features.descriptor_owner(index);
        write!(writer, "{} {} {} {}", feature.x, feature.y, feature.sigma, angle)?;
        for value in desc {
            if as_uchar {
                write!(writer, " {}", value.round().clamp(0.0, 255.0) as u8)?;
            } else {
                write!(writer, " {value}")?;
            }
        }
        writeln!(writer)?;
    }
    writer.flush()
}

/// Write the matches stored on `left` by [`FeatureCollection::match_with`] against `right`.
pub fn write_matches<W: Write>(
    mut writer: W,
    left: &FeatureCollection,
    right: &FeatureCollection,
) -> io::Result<()> {
    for m in left.matches() {
        let (l, _) = left.descriptor_owner(m.left);
        let (r, _) = right.descriptor_owner(m.right);
        writeln!(writer, "{} {} {} {} {}", l.x, l.y, r.x, r.y, m.distance)?;
    }
    writer.flush()
}

fn create(path: &Path) -> Result<BufWriter<File>, OutputError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| OutputError {
            path: path.to_path_buf(),
            source,
        })
}

/// Write both feature files and the match file into `dir`. Returns the written paths.
pub fn write_pair(
    dir: &Path,
    left: &FeatureCollection,
    right: &FeatureCollection,
    as_uchar: bool,
) -> Result<Vec<PathBuf>, OutputError> {
    std::fs::create_dir_all(dir).map_err(|source| OutputError {
        path: dir.to_path_buf(),
        source,
    })?;
    let targets = [
        dir.join(LEFT_FEATURES_FILE),
        dir.join(RIGHT_FEATURES_FILE),
        dir.join(MATCHES_FILE),
    ];
    let [left_path, right_path, matches_path] = &targets;
    let annotate = |path: &Path| {
        let path = path.to_path_buf();
        move |source| OutputError { path, source }
    };

    write_features(create(left_path)?, left, as_uchar).map_err(annotate(left_path))?;
    write_features(create(right_path)?, right, as_uchar).map_err(annotate(right_path))?;
    write_matches(create(matches_path)?, left, right).map_err(annotate(matches_path))?;
    debug!(dir = %dir.display(), "wrote features and matches");
    Ok(targets.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DESCRIPTOR_SIZE;
    use crate::engine::ProcessingMode;
    use crate::features::Feature;
    use ndarray::Array2;
    use std::time::Duration;

    fn collection(x: f32, fill: f32) -> FeatureCollection {
        let feature = Feature {
            x,
            y: 2.0,
            sigma: 1.5,
            response: 0.1,
            octave: 0,
            orientations: vec![10.0, 200.0],
            descriptor_offset: 0,
        };
        let descriptors = Array2::from_shape_fn((2, DESCRIPTOR_SIZE), |(r, c)| {
            if c == r {
                fill
            } else {
                0.0
            }
        });
        FeatureCollection::new(
            vec![feature],
            descriptors,
            ProcessingMode::MatchingMode,
            Duration::ZERO,
        )
    }

    #[test]
    fn one_line_per_descriptor() {
        let mut out = Vec::new();
        write_features(&mut out, &collection(1.0, 0.5), false).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1 2 1.5 10 0.5 0"));
        assert!(lines[1].starts_with("1 2 1.5 200 0 0.5"));
        assert_eq!(lines[0].split(' ').count(), 4 + DESCRIPTOR_SIZE);
    }

    #[test]
    fn uchar_values_are_rounded_and_saturated() {
        let mut out = Vec::new();
        write_features(&mut out, &collection(1.0, 300.0), true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().next().unwrap().starts_with("1 2 1.5 10 255 0"));
    }

    #[test]
    fn pair_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut left = collection(1.0, 0.5);
        let right = collection(7.0, 0.5);
        left.match_with(&right, 0.8).unwrap();
        let paths = write_pair(dir.path(), &left, &right, false).unwrap();
        assert_eq!(paths.len(), 3);
        let matches = std::fs::read_to_string(dir.path().join(MATCHES_FILE)).unwrap();
        assert_eq!(matches.lines().count(), 2);
        assert!(matches.lines().all(|l| l.starts_with("1 2 7 2 0")));
    }

    #[test]
    fn unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let c = collection(1.0, 0.5);
        let err = write_pair(&blocker.join("sub"), &c, &c, false).unwrap_err();
        assert!(err.path.starts_with(&blocker));
    }
}
