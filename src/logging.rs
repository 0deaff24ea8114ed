use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a stderr subscriber so tables on stdout stay clean.
///
/// `RUST_LOG` takes precedence; otherwise `level` applies to this crate and
/// everything else is limited to warnings. Calling it twice is harmless.
pub fn init_logging(level: &str) {
    let default_filter = format!("liquidation_risk={level},warn");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init();
}
