use crate::engine::BuildEngine;
use crate::plugin::ApplyPlugin;
use crate::CoreError;
use forgepack_schema::{InfrastructureLogging, LogLevel};
use tracing::{debug, error, info, warn};

/// Logger for engine infrastructure (plugins, drivers), configured by
/// `infrastructureLogging` and forwarded to `tracing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfrastructureLogger {
    engine: String,
    level: LogLevel,
    debug: Vec<String>,
    colors: bool,
}

impl InfrastructureLogger {
    pub fn from_options(engine: &str, options: &InfrastructureLogging) -> Self {
        Self {
            engine: engine.to_owned(),
            level: options.level.unwrap_or(LogLevel::Info),
            debug: options.debug.clone(),
            colors: options.colors.unwrap_or(false),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn colors(&self) -> bool {
        self.colors
    }

    /// Loggers matched by a `debug` pattern emit everything; others follow `level`.
    pub fn enabled(&self, logger: &str, level: LogLevel) -> bool {
        if level == LogLevel::None {
            return false;
        }
        self.debug.iter().any(|p| pattern_matches(p, logger)) || self.level.allows(level)
    }

    /// Emit `message` if enabled. Returns whether it was emitted.
    pub fn log(&self, logger: &str, level: LogLevel, message: &str) -> bool {
        if !self.enabled(logger, level) {
            return false;
        }
        let engine = self.engine.as_str();
        match level {
            LogLevel::Error => error!(target: "forgepack::infrastructure", engine, logger, "{message}"),
            LogLevel::Warn => warn!(target: "forgepack::infrastructure", engine, logger, "{message}"),
            LogLevel::Info | LogLevel::Log => {
                info!(target: "forgepack::infrastructure", engine, logger, "{message}");
            }
            LogLevel::Verbose => debug!(target: "forgepack::infrastructure", engine, logger, "{message}"),
            LogLevel::None => return false,
        }
        true
    }
}

fn pattern_matches(pattern: &str, logger: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => logger.starts_with(prefix),
        None => pattern == logger,
    }
}

/// Environment setup applied to every engine before any user plugin.
///
/// Installs the infrastructure logger derived from `infrastructureLogging`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentSetup;

impl ApplyPlugin for EnvironmentSetup {
    fn name(&self) -> &str {
        "environment-setup"
    }

    fn apply(&self, engine: &mut BuildEngine) -> Result<(), CoreError> {
        let logger = InfrastructureLogger::from_options(
            engine.display_name(),
            &engine.options().infrastructure_logging,
        );
        engine.set_infrastructure_logger(logger);
        engine.log(
            "forgepack.environment",
            LogLevel::Verbose,
            &format!("context {}", engine.context().display()),
        );
        Ok(())
    }
}
