// Logging setup
// Logs go to stderr, stdout carries client frames in the stdio host

use env_logger::{Builder, Env, Target};
use std::io::Write;

/// Filter used when RUST_LOG is not set
pub const DEFAULT_FILTER: &str = "fretbridge=info";

/// Install the global logger (later calls are no-ops)
pub fn init_logger() {
    init_logger_with(DEFAULT_FILTER);
}

pub fn init_logger_with(default_filter: &str) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.target(Target::Stderr);
    builder.format(|buf, record| {
        let module_path = record.module_path().unwrap_or("<unknown>");
        writeln!(
            buf,
            "[{}][{}][{}] {}",
            buf.timestamp_millis(),
            record.level(),
            module_path,
            record.args()
        )
    });

    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_logger();
        init_logger_with("fretbridge=debug");
        log::info!("logger initialised");
    }
}
