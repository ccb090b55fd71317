//! Tracing initialization for the binary.
//!
//! Diagnostics go to stderr; the activity log is written separately by the
//! engine. `RUST_LOG` wins when set, otherwise the `-v` count picks the level.

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::util::SubscriberInitExt;

pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

pub fn init_tracing(verbose: u8) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_for_verbosity(verbose).into())
        .from_env_lossy();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    // A subscriber may already be installed (e.g. by a test harness).
    let _ = registry().with(env_filter).with(stderr_layer).try_init();
}
