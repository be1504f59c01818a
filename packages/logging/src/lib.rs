#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Console logger setup for the metro binaries.

#[cfg(feature = "macros")]
mod macros;

pub use log;

use thiserror::Error;

#[cfg(debug_assertions)]
const DEFAULT_LOG_LEVEL: &str = "metro=trace";
#[cfg(not(debug_assertions))]
const DEFAULT_LOG_LEVEL: &str = "metro=info";

const NO_LOG: bool = std::option_env!("NO_LOG").is_some();

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

/// Resolves the filter directives: `METRO_LOG`, then `RUST_LOG`, then the
/// build's default level.
#[must_use]
pub fn env_filter() -> String {
    filter_from(
        std::env::var("METRO_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    )
}

fn filter_from(metro_log: Option<String>, rust_log: Option<String>) -> String {
    metro_log
        .filter(|x| !x.trim().is_empty())
        .or_else(|| rust_log.filter(|x| !x.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Installs the global logger.
///
/// Every line is prefixed with a timestamp, the emitting thread, the target
/// and the level so interleaved output from concurrent trains stays readable.
///
/// # Errors
///
/// * If a global logger has already been installed
pub fn init() -> Result<(), InitError> {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_env_logger::env_logger::fmt::Color;

    if NO_LOG {
        return Ok(());
    }

    let filter = env_filter();

    pretty_env_logger::formatted_builder()
        .parse_filters(&filter)
        .format(|buf, record| {
            static MAX_TARGET_PREFIX_LEN: AtomicUsize = AtomicUsize::new(0);

            use std::io::Write as _;

            let target = record.target();
            let level = record.level();

            let mut style = buf.style();
            let level_style = style.set_color(match level {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                log::Level::Info => Color::Green,
                log::Level::Debug => Color::Blue,
                log::Level::Trace => Color::Magenta,
            });

            let thread = std::thread::current();
            let thread_name = thread.name().unwrap_or("unnamed");
            let ts = buf.timestamp_millis();

            let target_prefix_len = "[]".len() + target.len();
            let max_target_prefix_len = MAX_TARGET_PREFIX_LEN
                .fetch_max(target_prefix_len, Ordering::SeqCst)
                .max(target_prefix_len);
            let target_padding = max_target_prefix_len - target_prefix_len;

            writeln!(
                buf,
                "[{ts}] [{thread_name}] [{target}] {empty:<target_padding$}[{level}] {args}",
                empty = "",
                level = level_style.value(level),
                args = record.args(),
            )
        })
        .try_init()?;

    log::debug!("Logger initialized with filter={filter}");

    Ok(())
}
