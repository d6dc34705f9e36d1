use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. `RUST_LOG` overrides the defaults; sqlx
/// statement logging stays at `warn` unless asked for.
pub fn init_logging(verbose: bool) {
    let (level_filter, level) = if verbose {
        (LevelFilter::DEBUG, "debug,sqlx=info")
    } else {
        (LevelFilter::INFO, "info,sqlx=warn")
    };
    let app_filter = Targets::new()
        .with_target("ratesync", level_filter)
        .with_default(LevelFilter::INFO);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty())
        .with(app_filter)
        .with(env_filter)
        .init();
}
