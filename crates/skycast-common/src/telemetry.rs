use tracing_subscriber::EnvFilter;

/// Initialize stdout tracing. `RUST_LOG` controls verbosity; defaults to
/// `info`.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
