pub mod auth;
pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_URL: &str = "url";
pub const ARG_TIMEOUT: &str = "timeout";
pub const ARG_METHOD: &str = "method";
pub const ARG_PATH: &str = "path";
pub const ARG_DATA: &str = "data";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("registry-console")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_URL)
                .short('u')
                .long("url")
                .help("Registry base URL, example: https://quay.example.com")
                .env("REGISTRY_CONSOLE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .short('t')
                .long("timeout")
                .help("Request timeout in seconds")
                .default_value("10")
                .env("REGISTRY_CONSOLE_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_METHOD)
                .help("HTTP method")
                .required(true)
                .ignore_case(true)
                .value_parser(["GET", "POST", "PUT", "PATCH", "DELETE"]),
        )
        .arg(
            Arg::new(ARG_PATH)
                .help("API path, example: /api/v1/user/")
                .required(true),
        )
        .arg(
            Arg::new(ARG_DATA)
                .short('d')
                .long("data")
                .help("JSON request body"),
        );

    let command = auth::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "https://quay.example.com";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "registry-console");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            env!("CARGO_PKG_DESCRIPTION")
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_check_request_args() {
        temp_env::with_vars([("REGISTRY_CONSOLE_URL", None::<String>)], || {
            let matches = new().get_matches_from(vec![
                "registry-console",
                "--url",
                URL,
                "post",
                "/api/v1/organization/",
                "--data",
                r#"{"name":"acme"}"#,
            ]);

            assert_eq!(
                matches.get_one::<String>(ARG_URL).map(String::as_str),
                Some(URL)
            );
            assert!(
                matches
                    .get_one::<String>(ARG_METHOD)
                    .is_some_and(|method| method.eq_ignore_ascii_case("POST"))
            );
            assert_eq!(
                matches.get_one::<String>(ARG_PATH).map(String::as_str),
                Some("/api/v1/organization/")
            );
            assert_eq!(
                matches.get_one::<String>(ARG_DATA).map(String::as_str),
                Some(r#"{"name":"acme"}"#)
            );
            assert_eq!(matches.get_one::<u64>(ARG_TIMEOUT).copied(), Some(10));
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("REGISTRY_CONSOLE_URL", Some(URL)),
                ("REGISTRY_CONSOLE_TIMEOUT", Some("30")),
                ("REGISTRY_CONSOLE_TOKEN_COMMAND", Some("oc whoami -t")),
                ("REGISTRY_CONSOLE_LOG_LEVEL", Some("info")),
                ("REGISTRY_CONSOLE_LOG_FORMAT", Some("json")),
            ],
            || {
                let matches = new().get_matches_from(vec!["registry-console", "GET", "/api/v1/user/"]);
                assert_eq!(
                    matches.get_one::<String>(ARG_URL).map(String::as_str),
                    Some(URL)
                );
                assert_eq!(matches.get_one::<u64>(ARG_TIMEOUT).copied(), Some(30));
                assert_eq!(
                    matches
                        .get_one::<String>(auth::ARG_TOKEN_COMMAND)
                        .map(String::as_str),
                    Some("oc whoami -t")
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
                assert_eq!(
                    matches
                        .get_one::<String>(logging::ARG_LOG_FORMAT)
                        .map(String::as_str),
                    Some("json")
                );
            },
        );
    }

    #[test]
    fn test_rejects_unknown_method() {
        temp_env::with_vars([("REGISTRY_CONSOLE_URL", Some(URL))], || {
            let result = new().try_get_matches_from(vec!["registry-console", "TRACE", "/"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_bearer_token_conflicts_with_token_command() {
        temp_env::with_vars(
            [
                ("REGISTRY_CONSOLE_URL", Some(URL)),
                ("REGISTRY_CONSOLE_BEARER_TOKEN", None),
                ("REGISTRY_CONSOLE_TOKEN_COMMAND", None),
            ],
            || {
                let result = new().try_get_matches_from(vec![
                    "registry-console",
                    "--bearer-token",
                    "abc",
                    "--token-command",
                    "oc whoami -t",
                    "GET",
                    "/api/v1/user/",
                ]);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("REGISTRY_CONSOLE_LOG_LEVEL", None::<&str>),
                    ("REGISTRY_CONSOLE_URL", Some(URL)),
                ],
                || {
                    let mut args = vec!["registry-console".to_string()];

                    // Add the appropriate number of "-v" flags based on the index
                    if index > 0 {
                        args.push(format!("-{}", "v".repeat(index)));
                    }
                    args.push("GET".to_string());
                    args.push("/api/v1/user/".to_string());

                    let matches = new().get_matches_from(args);

                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        Some(u8::try_from(index).unwrap())
                    );
                },
            );
        }
    }
}
