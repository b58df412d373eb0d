// Logger initialisation shared by host binaries and tests.

/// Map verbosity (1=error, 2=warning, 3=message, 4=debug, 5+=trace)
/// to a `log` level filter.
pub fn level_for_verbosity(verbosity: i32) -> log::LevelFilter {
    match verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Initialise `env_logger` at the given verbosity.
///
/// `RUST_LOG` still applies on top of the level. Calling this twice is
/// harmless: the second initialisation is ignored.
pub fn init_logging(verbosity: i32) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level_for_verbosity(verbosity))
        .format_timestamp(None) // Don't show timestamps
        .format_target(false) // Don't show module names
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(level_for_verbosity(0), log::LevelFilter::Error);
        assert_eq!(level_for_verbosity(1), log::LevelFilter::Error);
        assert_eq!(level_for_verbosity(2), log::LevelFilter::Warn);
        assert_eq!(level_for_verbosity(3), log::LevelFilter::Info);
        assert_eq!(level_for_verbosity(4), log::LevelFilter::Debug);
        assert_eq!(level_for_verbosity(9), log::LevelFilter::Trace);
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(3);
        init_logging(4);
        log::info!("logger initialised");
    }
}
