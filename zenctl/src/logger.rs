//! Logging setup for the binary.

use env_logger::Env;

/// Initializes the env_logger backend behind the `log` facade. `RUST_LOG`
/// still wins when set; `verbose` only raises the default filter.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}
