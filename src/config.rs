//! Engine configuration and the mode selectors accepted on the command line.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Defines a mode enum together with its `FromStr`/`Display` names and a usage line.
macro_rules! mode_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, default = $default:ident,
        { $( $(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)* ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            const NAMES: &'static str = concat!($($text, " "),+);

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(ConfigError::UnknownMode {
                        kind: $kind,
                        value: s.to_string(),
                        expected: $name::NAMES.trim_end(),
                    }),
                }
            }
        }
    };
}

mode_enum! {
    /// Overall flavour of the extraction pipeline.
    ///
    /// The modes differ in how the input is upscaled, how far an extremum may move during
    /// sub-pixel refinement, whether unconverged extrema are dropped and in the pre-threshold
    /// applied before the 26-neighbour test.
    SiftMode, "sift mode", default = PopSift,
    {
        PopSift => "popsift",
        OpenCV => "opencv",
        VLFeat => "vlfeat",
    }
}

mode_enum! {
    /// How Gaussian kernels are sized and which image a level is blurred from.
    GaussMode, "gauss mode", default = VLFeat,
    {
        /// Incremental blur from the previous level, kernel radius `ceil(4σ)`.
        VLFeat => "vlfeat",
        /// Every level is blurred directly from the first level of its octave.
        Relative => "relative",
        /// Incremental blur, kernel radius `round(3σ)`.
        OpenCV => "opencv",
        /// Incremental blur, fixed 9 tap kernel.
        Fixed9 => "fixed9",
        /// Incremental blur, fixed 15 tap kernel.
        Fixed15 => "fixed15",
    }
}

mode_enum! {
    /// How gradient samples are gathered into the descriptor histogram.
    DescMode, "descriptor mode", default = Loop,
    {
        /// Every pixel in a window around the rounded keypoint position.
        Loop => "loop",
        /// Every pixel in the window, rotated about the sub-pixel keypoint position.
        ILoop => "iloop",
        /// A regular 16x16 grid in the keypoint frame, nearest pixel gradients.
        Grid => "grid",
        /// A regular 16x16 grid in the keypoint frame, bilinear gradients.
        IGrid => "igrid",
        /// Like `loop`, without spreading samples over neighbouring cells.
        NoTile => "notile",
    }
}

mode_enum! {
    /// Descriptor normalization.
    NormMode, "norm mode", default = Classic,
    {
        /// L2 normalization, components clamped at 0.2, normalized again.
        Classic => "classic" | "l2",
        /// L1 normalization followed by an element-wise square root.
        RootSift => "root-sift" | "rootsift",
    }
}

mode_enum! {
    /// Order in which extrema in a grid cell are kept when filtering.
    FilterSort, "filter sort", default = Random,
    {
        Random => "random",
        /// Smallest scale first.
        Up => "up",
        /// Largest scale first.
        Down => "down",
    }
}

/// How the first image of every octave after the first is produced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalingMode {
    /// Downsample a blurred level of the previous octave.
    #[default]
    Default,
    /// Downsample the seed image directly and blur it to the base sigma.
    Direct,
}

/// Debug image output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogMode {
    #[default]
    None,
    /// Write every scale space level of every job to the log directory.
    All,
}

/// Parameters of the extraction engine.
///
/// A config is handed to [`crate::Engine::new`] by value and is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Number of octaves. `None` picks as many as the image size allows.
    pub octaves: Option<usize>,
    /// Scales per octave that are searched for extrema.
    pub levels: usize,
    /// Blur of the first level of every octave, in units of that octave's pixels.
    pub sigma: f32,
    /// Contrast threshold, divided by `levels` before it is applied.
    pub threshold: f32,
    /// Maximum ratio of principal curvatures for an extremum not to count as an edge.
    pub edge_limit: f32,
    /// The input is scaled by `2^-downsampling` before building the scale space.
    pub downsampling: i32,
    /// Blur assumed to be present in the input image.
    pub initial_blur: f32,
    pub sift_mode: SiftMode,
    pub gauss_mode: GaussMode,
    pub desc_mode: DescMode,
    pub scaling_mode: ScalingMode,
    pub norm_mode: NormMode,
    /// Descriptors are multiplied by `2^norm_multi` after normalization.
    pub norm_multi: i32,
    /// Approximate upper bound on the number of extrema. 0 disables filtering.
    pub filter_max_extrema: usize,
    /// Edge length of the filtering grid.
    pub filter_grid: usize,
    pub filter_sort: FilterSort,
    pub log_mode: LogMode,
    pub log_dir: PathBuf,
    pub print_gauss_tables: bool,
    /// Worker threads. `None` uses the available parallelism, capped at 4.
    pub workers: Option<usize>,
    /// Lowe's ratio used when matching descriptors.
    pub match_ratio: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            octaves: None,
            levels: 3,
            sigma: 1.6,
            threshold: 0.04,
            edge_limit: 10.0,
            downsampling: -1,
            initial_blur: 0.5,
            sift_mode: SiftMode::default(),
            gauss_mode: GaussMode::default(),
            desc_mode: DescMode::default(),
            scaling_mode: ScalingMode::default(),
            norm_mode: NormMode::default(),
            norm_multi: 0,
            filter_max_extrema: 0,
            filter_grid: 1,
            filter_sort: FilterSort::default(),
            log_mode: LogMode::default(),
            log_dir: PathBuf::from("dir-octave"),
            print_gauss_tables: false,
            workers: None,
            match_ratio: 0.8,
        }
    }
}

const MAX_WORKERS: usize = 4;
/// Gaussian levels per octave; each octave holds `levels + 3` images.
const MAX_LEVELS: usize = 12;
/// Edge length of the filtering grid, giving at most 4096 cells.
const MAX_FILTER_GRID: usize = 64;

impl Config {
    /// Check that all values are within ranges the pipeline can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(name: &'static str, message: impl Into<String>) -> ConfigError {
            ConfigError::InvalidValue {
                name,
                message: message.into(),
            }
        }

        if self.octaves == Some(0) {
            return Err(invalid("octaves", "must be > 0"));
        }
        if !(1..=MAX_LEVELS).contains(&self.levels) {
            return Err(invalid("levels", format!("must be between 1 and {MAX_LEVELS}")));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(invalid("sigma", "must be a positive number"));
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(invalid("threshold", "must be a non-negative number"));
        }
        if !(self.edge_limit.is_finite() && self.edge_limit > 0.0) {
            return Err(invalid("edge-limit", "must be a positive number"));
        }
        if !(-3..=4).contains(&self.downsampling) {
            return Err(invalid("downsampling", "must be between -3 and 4"));
        }
        if !(self.initial_blur.is_finite() && self.initial_blur >= 0.0) {
            return Err(invalid("initial-blur", "must be a non-negative number"));
        }
        if !(-16..=16).contains(&self.norm_multi) {
            return Err(invalid("norm-multi", "must be between -16 and 16"));
        }
        if !(1..=MAX_FILTER_GRID).contains(&self.filter_grid) {
            return Err(invalid(
                "filter-grid",
                format!("must be between 1 and {MAX_FILTER_GRID}"),
            ));
        }
        if self.workers == Some(0) {
            return Err(invalid("workers", "must be > 0"));
        }
        if !(self.match_ratio > 0.0 && self.match_ratio <= 1.0) {
            return Err(invalid("match-ratio", "must be in (0, 1]"));
        }
        Ok(())
    }

    /// Factor between seed image pixels and input image pixels.
    pub(crate) fn delta_min(&self) -> f32 {
        2_f32.powi(self.downsampling)
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(MAX_WORKERS)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_levels() {
        let config = Config {
            levels: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("levels"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cases = [
            Config {
                sigma: -1.0,
                ..Config::default()
            },
            Config {
                edge_limit: 0.0,
                ..Config::default()
            },
            Config {
                downsampling: 7,
                ..Config::default()
            },
            Config {
                filter_grid: 0,
                ..Config::default()
            },
            Config {
                filter_grid: usize::MAX,
                filter_max_extrema: 1,
                ..Config::default()
            },
            Config {
                filter_grid: MAX_FILTER_GRID + 1,
                ..Config::default()
            },
            Config {
                levels: usize::MAX,
                ..Config::default()
            },
            Config {
                levels: MAX_LEVELS + 1,
                ..Config::default()
            },
            Config {
                octaves: Some(0),
                ..Config::default()
            },
            Config {
                match_ratio: 1.5,
                ..Config::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{config:?} should be invalid");
        }
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in GaussMode::ALL {
            assert_eq!(mode.to_string().parse::<GaussMode>(), Ok(*mode));
        }
        for mode in DescMode::ALL {
            assert_eq!(mode.to_string().parse::<DescMode>(), Ok(*mode));
        }
        for mode in NormMode::ALL {
            assert_eq!(mode.to_string().parse::<NormMode>(), Ok(*mode));
        }
        for mode in FilterSort::ALL {
            assert_eq!(mode.to_string().parse::<FilterSort>(), Ok(*mode));
        }
        for mode in SiftMode::ALL {
            assert_eq!(mode.to_string().parse::<SiftMode>(), Ok(*mode));
        }
    }

    #[test]
    fn mode_aliases_and_case() {
        assert_eq!("RootSift".parse::<NormMode>(), Ok(NormMode::RootSift));
        assert_eq!("L2".parse::<NormMode>(), Ok(NormMode::Classic));
        assert_eq!(" IGRID ".parse::<DescMode>(), Ok(DescMode::IGrid));
    }

    #[test]
    fn unknown_mode_lists_alternatives() {
        let err = "sideways".parse::<FilterSort>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sideways"));
        assert!(msg.contains("random up down"));
    }

    #[test]
    fn explicit_worker_count_is_used() {
        let config = Config {
            workers: Some(3),
            ..Config::default()
        };
        assert_eq!(config.worker_count(), 3);
        assert!(Config::default().worker_count() >= 1);
    }
}
