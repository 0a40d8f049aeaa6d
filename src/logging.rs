use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

/// Set up console logging for a pairing run.
///
/// Pairing is a batch computation, so everything goes to stderr; callers
/// that want a log file as well can configure log4rs themselves instead
/// of calling this.
pub fn init_logging(level: log::LevelFilter) {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{h({d(%Y-%m-%d %H:%M:%S)} [{l}] {M})} - {m}{n}",
        )))
        .target(Target::Stderr)
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .expect("Failed to configure logger");

    log4rs::init_config(config).expect("Failed to initialize logger");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging() {
        // The logger is process-global, so this must stay the only test
        // that installs one.
        init_logging(log::LevelFilter::Debug);
        log::debug!("logging initialized for tests");
    }
}
