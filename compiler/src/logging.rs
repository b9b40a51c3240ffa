//! Logging setup for the lowering pipeline
//!
//! The crate logs through the `log` facade:
//!
//! - `info!` - one line per lowering phase and per compilation unit
//! - `debug!` - every rewrite a phase performs
//! - `trace!` - snippet template text and verifier walks
//!
//! Phase walks and verifier runs are also wrapped in `tracing` spans for
//! subscribers that want structured timing.
//!
//! ```bash
//! RUST_LOG=compiler::lowering=debug cargo test -p compiler
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize at `Warn`. Later calls are no-ops.
pub fn init() {
    init_with_level(LevelFilter::Warn);
}

pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        let _ = Builder::new()
            .filter_level(level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{:5}] {} - {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .try_init();
    });
}

/// Initialize from `RUST_LOG`, defaulting to `warn`
pub fn init_from_env() {
    INIT.call_once(|| {
        let _ = Builder::from_env(env_logger::Env::default().default_filter_or("warn")).try_init();
    });
}

/// Test-friendly logger; output is captured by the test harness
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .try_init();
}

/// Whether one of the `init*` functions above has run
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test();
        init_test();
        init_with_level(LevelFilter::Debug);
        init();
        assert!(is_initialized());
    }
}
