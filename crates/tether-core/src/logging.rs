//! Tracing subscriber initialization.
//!
//! Log context (session state, request IDs, close codes) is propagated via
//! tracing spans and structured fields; the host process decides where the
//! output goes by initializing the subscriber once at startup.

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at startup. Subsequent calls are no-ops. `RUST_LOG` takes
/// precedence over the `level` argument.
///
/// # Arguments
///
/// * `level` - Minimum log level to display, e.g. `"info"`.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}
