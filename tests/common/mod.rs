//! Shared test setup.
//!
//! Build with `--features tracing` and set `RUST_LOG` (e.g. `lockfree_skiplist=trace`) to see the
//! library's events interleaved with test output.

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a console subscriber filtered by `RUST_LOG`. Only the first call has an effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_ids(true)
            .try_init();
    });
}
