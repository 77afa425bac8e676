//! wise-testkit
//!
//! In-memory collaborators for scenario tests. [`FakeChain`] stands in for
//! every external service the core talks to: node history, rules index,
//! broadcaster, post metadata and custom RPC endpoints.

mod chain;

pub use chain::{FakeChain, FAKE_GENESIS_BLOCK};

/// Install a `tracing` subscriber honouring `RUST_LOG`. Safe to call from
/// every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
