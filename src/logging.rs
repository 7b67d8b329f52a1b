//! Tracing subscriber for the `sift-match` binary.

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level for the number of `-v` flags: info, then debug, then trace.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber. Events go to stderr so that the counts and timings on
/// stdout stay machine readable. `RUST_LOG` takes precedence over `level`.
pub fn init(level: Level, json_format: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    let layer = fmt::layer().with_writer(std::io::stderr);

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        // Worker threads are named sift-worker-N.
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_target(false).with_thread_names(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(level_for(0), Level::INFO);
        assert_eq!(level_for(1), Level::DEBUG);
        assert_eq!(level_for(5), Level::TRACE);
    }
}
