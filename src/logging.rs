use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global console subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,district_pulse=info"));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
