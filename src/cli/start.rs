use crate::cli::{
    actions::Action,
    commands,
    dispatch::handler,
    globals::{Config, Environment},
    telemetry,
};
use anyhow::Result;

/// Start the CLI: parse arguments, initialize logging/telemetry and resolve
/// the environment-prefixed configuration.
///
/// # Errors
/// Returns an error if telemetry setup or configuration resolution fails.
pub fn start() -> Result<(Action, Config)> {
    let matches = commands::new().get_matches();

    let verbosity_level = match matches.get_one::<u8>("verbosity").map_or(0, |&v| v) {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    telemetry::init(Some(verbosity_level))?;

    let environment: Environment = matches
        .get_one::<String>("environment")
        .map(String::as_str)
        .unwrap_or("dev")
        .parse()?;

    let config = Config::from_env(environment)?;

    let action = handler(&matches)?;

    Ok((action, config))
}
