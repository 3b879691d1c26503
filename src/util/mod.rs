use std::thread;
use std::time::{Duration, Instant};

/// Aborts on a broken internal invariant. These are logic errors, never
/// conditions a caller can recover from.
#[macro_export]
macro_rules! unrecoverable {
    ($fmt:expr) => (
        panic!(concat!("unrecoverable: ", $fmt))
    );
    ($fmt:expr, $($arg:tt)+) => (
        panic!(concat!("unrecoverable: ", $fmt), $($arg)+)
    );
}

/// Installs `env_logger` filtered by `PN_LOG` and styled by `PN_LOG_STYLE`.
///
/// Nothing is logged unless `PN_LOG` is set. Calling this twice is harmless.
pub fn init_logger() {
    if std::env::var("PN_LOG").is_ok() {
        let env = env_logger::Env::new()
            .filter("PN_LOG")
            .write_style("PN_LOG_STYLE");
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init();
    }
}

/// Test support: polls `condition` until it holds or `timeout` elapses.
///
/// Used by the unit and integration tests to wait for threads to park.
/// Not part of the engine API.
#[doc(hidden)]
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
