//! Shared fixtures for the kestrel test suites: two small abstract domains,
//! example programs, and law checkers that report every violation at once.

mod explicit;
pub mod laws;
mod location;
pub mod programs;

pub use explicit::{
    Cmp, Effect, ExplicitJoin, ExplicitProgramBuilder, ExplicitReducer, ExplicitState,
    ExplicitTransfer, Expr, explicit_cpa,
};
pub use location::{LocationReducer, LocationState, LocationTransfer, location_cpa};

/// Install a fmt subscriber writing to the test output. Safe to call from
/// every test; only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
