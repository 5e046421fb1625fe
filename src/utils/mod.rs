pub mod logging;

/// Initialize env_logger (reads RUST_LOG, defaults to Info). Call once from
/// the host application's startup.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
