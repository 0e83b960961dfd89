use tracing_subscriber::{prelude::*, util::SubscriberInitExt, EnvFilter};

/// Installs a plain-text subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Output goes to stderr so it never mixes with the report.
pub fn init() {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                ),
        )
        .init();
}
