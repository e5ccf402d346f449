//! Logging setup for the player binary and embedding applications

use log::LevelFilter;

/// Initialize the logger at INFO for terminal applications.
///
/// The format starts each line with `\r` so it stays readable while the
/// player has the terminal in raw mode. `RUST_LOG` overrides the level.
pub fn init_logger() {
    init_logger_with_level(LevelFilter::Info);
}

/// Like `init_logger` with a different default level.
/// Does nothing if a logger is already installed.
pub fn init_logger_with_level(level: LevelFilter) {
    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "\r[{} {:5} {}] {}",
                buf.timestamp(),
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .try_init();

    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}
