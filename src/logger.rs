use log::{Record, Metadata, LevelFilter, SetLoggerError};

pub const TARGET: &str = "ticketbot";

#[macro_use]
pub mod macros {
    #[doc(alias = "log::error")]
    #[macro_export]
    macro_rules! log_error {
        ($($arg:tt)*) => {
            ::log::error!(target: $crate::logger::TARGET, $($arg)*)
        };
    }
    #[doc(alias = "log::warn")]
    #[macro_export]
    macro_rules! log_warn {
        ($($arg:tt)*) => {
            ::log::warn!(target: $crate::logger::TARGET, $($arg)*)
        };
    }
    #[doc(alias = "log::info")]
    #[macro_export]
    macro_rules! log_info {
        ($($arg:tt)*) => {
            ::log::info!(target: $crate::logger::TARGET, $($arg)*)
        };
    }
    #[doc(alias = "log::debug")]
    #[macro_export]
    macro_rules! log_debug {
        ($($arg:tt)*) => {
            ::log::debug!(target: $crate::logger::TARGET, $($arg)*)
        };
    }
}

/// Prints the bot records on stdout. Records of other crates are dropped unless the
/// `verbose` feature is enabled.
struct SimpleLogger;

impl log::Log for SimpleLogger {
    #[inline]
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && (cfg!(feature = "verbose") || metadata.target() == TARGET)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{}] [{}] {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.args());
        }
    }
    #[inline]
    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger;

fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) { LevelFilter::Trace } else { LevelFilter::Info }
}

/// Install the logger. `level` is a [`LevelFilter`] name such as `"warn"`; an unknown
/// or missing name falls back to the build default.
pub fn init(level: Option<&str>) -> Result<(), SetLoggerError> {
    let level = level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .unwrap_or_else(default_level);
    log::set_logger(&LOGGER).map(|_| log::set_max_level(level))
}
