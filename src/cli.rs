//! Command line arguments and the `sift-match` run.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use sift_match::{
    output, run_pair, validate_input, Config, DescMode, Engine, FeatureCollection, FilterSort,
    GaussMode, LoaderStrategy, LogMode, NormMode, ProcessingMode, RunOptions, ScalingMode,
    SiftMode,
};

const GAUSS_MODE_USAGE: &str = "Gauss filter mode: vlfeat (default, incremental, radius ceil(4 sigma)), \
     relative (every level from the octave's first), opencv (incremental, radius round(3 sigma)), \
     fixed9, fixed15";
const DESC_MODE_USAGE: &str = "Descriptor sampling: loop (default), iloop (sub-pixel centred window), \
     grid (16x16 grid, nearest pixel), igrid (16x16 grid, bilinear), notile (no spatial interpolation)";
const NORM_MODE_USAGE: &str = "Descriptor normalization: classic (default, L2 with clamping) or \
     root-sift (L1 followed by square root)";

/// Extract SIFT features from two images on a pool of workers and match them.
#[derive(Parser, Debug)]
#[command(name = "sift-match")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("sift_mode").multiple(false)))]
pub struct Args {
    /// "Left" input file
    #[arg(short, long)]
    pub left: PathBuf,

    /// "Right" input file
    #[arg(short, long)]
    pub right: PathBuf,

    /// Raise the log level, -v for debug and -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write every scale space level of every image as PNG files
    #[arg(long)]
    pub log: bool,

    /// Directory for the files written by --log
    #[arg(long, default_value = "dir-octave")]
    pub log_dir: PathBuf,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Number of octaves
    #[arg(long, help_heading = "Parameters")]
    pub octaves: Option<usize>,

    /// Number of levels per octave
    #[arg(long, default_value_t = 3, help_heading = "Parameters")]
    pub levels: usize,

    /// Initial sigma value
    #[arg(long, default_value_t = 1.6, help_heading = "Parameters")]
    pub sigma: f32,

    /// Contrast threshold
    #[arg(long, default_value_t = 0.04, help_heading = "Parameters")]
    pub threshold: f32,

    /// On-edge threshold
    #[arg(
        long = "edge-limit",
        visible_alias = "edge-threshold",
        default_value_t = 10.0,
        help_heading = "Parameters"
    )]
    pub edge_limit: f32,

    /// Downscale width and height of input by 2^N
    #[arg(
        long,
        default_value_t = -1,
        allow_negative_numbers = true,
        help_heading = "Parameters"
    )]
    pub downsampling: i32,

    /// Assume initial blur, subtract when blurring first time
    #[arg(long, default_value_t = 0.5, help_heading = "Parameters")]
    pub initial_blur: f32,

    #[arg(long, default_value_t = GaussMode::default(), help = GAUSS_MODE_USAGE, help_heading = "Modes")]
    pub gauss_mode: GaussMode,

    #[arg(long, default_value_t = DescMode::default(), help = DESC_MODE_USAGE, help_heading = "Modes")]
    pub desc_mode: DescMode,

    /// Corner aligned upscaling, refinement steps up to 0.6, unconverged extrema are kept,
    /// pre-threshold 0.8 * threshold (default)
    #[arg(long, group = "sift_mode", help_heading = "Modes")]
    pub popsift_mode: bool,

    /// Like --popsift-mode
    #[arg(long, group = "sift_mode", help_heading = "Modes")]
    pub vlfeat_mode: bool,

    /// Centre aligned upscaling, refinement steps up to 0.5, unconverged extrema are rejected,
    /// pre-threshold floor(0.5 * threshold)
    #[arg(long, group = "sift_mode", help_heading = "Modes")]
    pub opencv_mode: bool,

    /// Downscale every octave directly from the upscaled input instead of a blurred level
    #[arg(long, help_heading = "Modes")]
    pub direct_scaling: bool,

    /// Multiply the descriptor by 2^N
    #[arg(
        long,
        default_value_t = 0,
        allow_negative_numbers = true,
        help_heading = "Modes"
    )]
    pub norm_multi: i32,

    #[arg(long, help = NORM_MODE_USAGE, help_heading = "Modes")]
    pub norm_mode: Option<NormMode>,

    /// Shorthand for --norm-mode root-sift
    #[arg(long, conflicts_with = "norm_mode", help_heading = "Modes")]
    pub root_sift: bool,

    /// Approximate max number of extrema, 0 for no limit
    #[arg(long, default_value_t = 0, help_heading = "Modes")]
    pub filter_max_extrema: usize,

    /// Grid edge length for extrema filtering (4 leads to a 4x4 grid)
    #[arg(long, default_value_t = 1, help_heading = "Modes")]
    pub filter_grid: usize,

    /// Sort extrema in each cell by scale: random (default), up or down
    #[arg(long, default_value_t = FilterSort::default(), help_heading = "Modes")]
    pub filter_sort: FilterSort,

    /// Number of worker threads, defaults to the available parallelism (at most 4)
    #[arg(long, help_heading = "Modes")]
    pub workers: Option<usize>,

    /// Ratio for Lowe's ratio test when matching
    #[arg(long, default_value_t = 0.8, help_heading = "Modes")]
    pub match_ratio: f32,

    /// Print Gauss filter sizes and tables
    #[arg(long, help_heading = "Informational")]
    pub print_gauss_tables: bool,

    /// Print information about the worker pool
    #[arg(long, help_heading = "Informational")]
    pub print_dev_info: bool,

    /// Print processing times
    #[arg(long, help_heading = "Informational")]
    pub print_time_info: bool,

    /// Write descriptors rounded to 0..=255, combine with --norm-multi 9 or similar
    #[arg(long, help_heading = "Informational")]
    pub write_as_uchar: bool,

    /// Do not write feature and match files
    #[arg(long, help_heading = "Informational")]
    pub dont_write: bool,

    /// Read PGM files with the built-in reader instead of the general image decoder
    #[arg(long, help_heading = "Informational")]
    pub pgmread_loading: bool,

    /// Directory for the feature and match files
    #[arg(long, default_value = ".", help_heading = "Informational")]
    pub output_dir: PathBuf,
}

impl Args {
    /// Split into engine parameters and application switches.
    pub fn into_parts(self) -> (Config, RunOptions) {
        let sift_mode = if self.opencv_mode {
            SiftMode::OpenCV
        } else if self.vlfeat_mode {
            SiftMode::VLFeat
        } else {
            SiftMode::PopSift
        };
        let norm_mode = if self.root_sift {
            NormMode::RootSift
        } else {
            self.norm_mode.unwrap_or_default()
        };
        let config = Config {
            octaves: self.octaves,
            levels: self.levels,
            sigma: self.sigma,
            threshold: self.threshold,
            edge_limit: self.edge_limit,
            downsampling: self.downsampling,
            initial_blur: self.initial_blur,
            sift_mode,
            gauss_mode: self.gauss_mode,
            desc_mode: self.desc_mode,
            scaling_mode: if self.direct_scaling {
                ScalingMode::Direct
            } else {
                ScalingMode::Default
            },
            norm_mode,
            norm_multi: self.norm_multi,
            filter_max_extrema: self.filter_max_extrema,
            filter_grid: self.filter_grid,
            filter_sort: self.filter_sort,
            log_mode: if self.log { LogMode::All } else { LogMode::None },
            log_dir: self.log_dir,
            print_gauss_tables: self.print_gauss_tables,
            workers: self.workers,
            match_ratio: self.match_ratio,
        };
        let options = RunOptions {
            left: self.left,
            right: self.right,
            loader: if self.pgmread_loading {
                LoaderStrategy::Pgm
            } else {
                LoaderStrategy::Decoder
            },
            print_dev_info: self.print_dev_info,
            print_time_info: self.print_time_info,
            write_as_uchar: self.write_as_uchar,
            dont_write: self.dont_write,
            output_dir: self.output_dir,
        };
        (config, options)
    }
}

fn print_counts(features: &FeatureCollection) {
    println!("Number of features:    {}", features.feature_count());
    println!("Number of descriptors: {}", features.descriptor_count());
}

/// Extract and match one image pair, print the results and write the output files.
pub fn run(config: Config, options: RunOptions) -> anyhow::Result<()> {
    config.validate().context("invalid parameters")?;
    println!("sift-match version: {}", sift_match::VERSION);
    println!("{} <-> {}", options.left.display(), options.right.display());
    validate_input(&options.left)?;
    validate_input(&options.right)?;

    let mut engine =
        Engine::new(config, ProcessingMode::MatchingMode).context("failed to start engine")?;
    if options.print_dev_info {
        let available = std::thread::available_parallelism().map_or(1, |n| n.get());
        println!(
            "CPU engine: {} worker threads, {} hardware threads available",
            engine.worker_count(),
            available
        );
    }

    let mut report = run_pair(&engine, &options)?;
    print_counts(&report.left);
    print_counts(&report.right);
    println!("Number of matches:     {}", report.match_count());
    if options.print_time_info {
        println!(
            "Time to extract left image:  {:.3} ms",
            report.left.processing_time().as_secs_f64() * 1000.0
        );
        println!(
            "Time to extract right image: {:.3} ms",
            report.right.processing_time().as_secs_f64() * 1000.0
        );
        println!(
            "Time to load and extract both: {:.3} ms",
            report.extraction_time.as_secs_f64() * 1000.0
        );
        println!(
            "Time to match: {:.3} ms",
            report.matching_time.as_secs_f64() * 1000.0
        );
    }

    if !options.dont_write {
        let written = output::write_pair(
            &options.output_dir,
            &report.left,
            &report.right,
            options.write_as_uchar,
        )?;
        for path in written {
            tracing::info!(path = %path.display(), "output written");
        }
    }

    report.release()?;
    engine.teardown()?;
    Ok(())
}
