// reportkeeper/src/logger.rs
//! Logger setup for the reportkeeper binary.

use log::LevelFilter;

/// Initializes the global logger.
///
/// An explicit level overrides `RUST_LOG`; passing `None` leaves the level to
/// the environment with `info` as the default. Safe to call more than once.
pub fn init_logger(level: Option<LevelFilter>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format_timestamp_secs();
    let _ = builder.try_init();
}
