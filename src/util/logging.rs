use std::sync::Once;

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        println!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;
static INIT: Once = Once::new();

/// Level used by [`init_default_logger`].
pub fn default_level() -> log::LevelFilter {
    if cfg!(feature = "verbose_logs") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

/// Install the console logger. Only the first call installs it; every call sets the level.
///
/// If the host already installed another logger, that one stays.
pub fn init_logger(level: log::LevelFilter) {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
    });
    log::set_max_level(level);
}

pub fn init_default_logger() {
    init_logger(default_level());
}
