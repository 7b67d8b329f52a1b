//! `sift-match` - extract SIFT features from two images and match them.
//!
//! # Usage
//!
//! ```bash
//! # Match two images, writing features and matches to the current directory
//! sift-match -l left.png -r right.png
//!
//! # OpenCV flavoured extraction from PGM files, only print counts and timings
//! sift-match -l left.pgm -r right.pgm --pgmread-loading --opencv-mode --dont-write --print-time-info
//! ```

use clap::Parser;

mod cli;
mod logging;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    logging::init(logging::level_for(args.verbose), args.json_logs);
    tracing::debug!("sift-match v{}", sift_match::VERSION);

    let (config, options) = args.into_parts();
    cli::run(config, options)
}
