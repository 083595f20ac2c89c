//! Tracing setup for binaries and tests embedding the ledger.

/// Installs a `fmt` subscriber filtering the ledger crates at `level`.
///
/// Does nothing when a global subscriber is already set.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(format!("engine={level},ledger={level}"))
        .try_init();
}
