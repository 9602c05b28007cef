use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn validator_environment() -> ValueParser {
    ValueParser::from(move |env: &str| -> std::result::Result<String, String> {
        match env.to_lowercase().as_str() {
            "dev" | "prod" | "test" => Ok(env.to_lowercase()),
            _ => Err("invalid environment, expected dev, prod or test".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("socialite")
        .about("Social network REST API")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SOCIALITE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("environment")
                .short('e')
                .long("env")
                .help("Environment selecting the DEV_/PROD_/TEST_ variable set")
                .default_value("dev")
                .env("SOCIALITE_ENV")
                .value_parser(validator_environment()),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SOCIALITE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "socialite");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Social network REST API"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_check_port_and_environment() {
        let command = new();
        let matches =
            command.get_matches_from(vec!["socialite", "--port", "8080", "--env", "test"]);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
        assert_eq!(
            matches.get_one::<String>("environment").cloned(),
            Some("test".to_string())
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("SOCIALITE_PORT", Some("443")),
                ("SOCIALITE_ENV", Some("prod")),
                ("SOCIALITE_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["socialite"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("environment").cloned(),
                    Some("prod".to_string())
                );
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_environment_defaults_to_dev() {
        temp_env::with_vars([("SOCIALITE_ENV", None::<String>)], || {
            let command = new();
            let matches = command.get_matches_from(vec!["socialite"]);
            assert_eq!(
                matches.get_one::<String>("environment").cloned(),
                Some("dev".to_string())
            );
        });
    }

    #[test]
    fn test_invalid_environment_rejected() {
        let command = new();
        let result = command.try_get_matches_from(vec!["socialite", "--env", "staging"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("SOCIALITE_LOG_LEVEL", Some(level))], || {
                let command = new();
                let matches = command.get_matches_from(vec!["socialite"]);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    Some(index as u8)
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("SOCIALITE_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["socialite".to_string()];

                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let command = new();
                let matches = command.get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    Some(index as u8)
                );
            });
        }
    }
}
