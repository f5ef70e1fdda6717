use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a stderr subscriber. Intended for binaries and integration
/// harnesses embedding this crate; the library itself only emits events.
pub fn init_stderr(level: &str) {
  let filter = tracing_subscriber::EnvFilter::try_new(level)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .with_target(true);

  // Ignore the error if a global subscriber is already installed.
  let _ = tracing_subscriber::registry()
    .with(filter)
    .with(stderr_layer)
    .try_init();
}
