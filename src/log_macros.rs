/// Logging macros with a component target for cleaner log output.
///
/// Engine components log under short targets ("fund", "valuation", "queue",
/// "fees", "ledger") instead of the full module path.

#[macro_export]
macro_rules! log_info {
    ($target:expr, $($arg:tt)*) => {
        log::info!(target: $target, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($target:expr, $($arg:tt)*) => {
        log::error!(target: $target, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($target:expr, $($arg:tt)*) => {
        log::warn!(target: $target, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($target:expr, $($arg:tt)*) => {
        log::debug!(target: $target, $($arg)*)
    };
}
