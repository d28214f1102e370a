use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber.
///
/// `verbose` shows this crate's debug output. Otherwise `RUST_LOG` decides,
/// and nothing is logged when it is unset.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "off" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(app_targets(verbose))
        .with(env_filter)
        .init();
}

// Only narrows output under `--verbose`; without it `RUST_LOG` is left alone.
fn app_targets(verbose: bool) -> Option<Targets> {
    verbose.then(|| Targets::new().with_target("knap", LevelFilter::DEBUG))
}
