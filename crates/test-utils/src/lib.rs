pub mod builders;
pub mod descriptors;
pub mod gate;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

pub use descriptors::Recorder;
pub use gate::Gate;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=coopsched=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
///
/// Accepts anything awaitable, including `TaskHandle`s.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::IntoFuture<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// `true` if `f` is still pending after `ms` milliseconds.
pub async fn stays_pending<F>(f: F, ms: u64) -> bool
where
    F: std::future::IntoFuture,
{
    tokio::time::timeout(std::time::Duration::from_millis(ms), f)
        .await
        .is_err()
}
