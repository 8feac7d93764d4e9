//! Logging setup shared by the CLI and by library consumers.

use log::LevelFilter;

/// Initializes the logger with the `env_logger` crate, honoring `RUST_LOG`.
pub fn init_logger() {
    env_logger::init();
}

/// Initializes the logger from a `-v` count: 0 warnings only, 1 info,
/// 2 debug (frames), 3 and up trace (raw bytes). `RUST_LOG` still wins when
/// set.
pub fn init_logger_with_verbosity(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder.init();
}
