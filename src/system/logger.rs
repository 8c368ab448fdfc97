// src/system/logger.rs

use crate::constants::LOG_ENV;
use log::LevelFilter;

/// The process logger: the `log` facade backed by `env_logger`.
///
/// Commands log through the `log` macros; this value records the level that
/// was configured for the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    /// `--quiet` keeps warnings and errors only; `--verbose` adds debug lines.
    pub fn for_flags(quiet: bool, verbose: bool) -> Self {
        let level = if quiet {
            LevelFilter::Warn
        } else if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        Self { level }
    }

    /// Installs `env_logger` as the global logger. `IONIC_LOG` may override
    /// the level with a regular env_logger filter string. A second install
    /// in the same process is a no-op.
    pub fn install(self) -> Self {
        let result = env_logger::Builder::new()
            .filter_level(self.level)
            .parse_env(env_logger::Env::new().filter(LOG_ENV))
            .format_timestamp(None)
            .format_target(false)
            .try_init();

        if result.is_err() {
            log::debug!("Logger already installed; keeping the existing one.");
        }
        self
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_selection() {
        assert_eq!(Logger::for_flags(false, false).level(), LevelFilter::Info);
        assert_eq!(Logger::for_flags(true, false).level(), LevelFilter::Warn);
        assert_eq!(Logger::for_flags(false, true).level(), LevelFilter::Debug);
        assert_eq!(Logger::for_flags(true, true).level(), LevelFilter::Warn);
    }
}
