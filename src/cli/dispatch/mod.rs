use crate::cli::{
    actions::{Action, request::Args},
    commands::{self, auth},
    globals::GlobalArgs,
};
use crate::client::HttpMethod;
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use serde_json::Value;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing or the request body is not valid JSON.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let url = matches
        .get_one::<String>(commands::ARG_URL)
        .cloned()
        .context("missing required argument: --url")?;

    let mut globals = GlobalArgs::new(url);

    if let Some(seconds) = matches.get_one::<u64>(commands::ARG_TIMEOUT) {
        globals.timeout = Duration::from_secs(*seconds);
    }

    globals.bearer_token = matches
        .get_one::<String>(auth::ARG_BEARER_TOKEN)
        .map(|token| SecretString::from(token.clone()));
    globals.token_command = matches.get_one::<String>(auth::ARG_TOKEN_COMMAND).cloned();
    globals.password = matches
        .get_one::<String>(auth::ARG_PASSWORD)
        .map(|password| SecretString::from(password.clone()));

    let method = matches
        .get_one::<String>(commands::ARG_METHOD)
        .context("missing required argument: METHOD")?
        .parse::<HttpMethod>()
        .map_err(|err| anyhow!(err))?;

    let path = matches
        .get_one::<String>(commands::ARG_PATH)
        .cloned()
        .context("missing required argument: PATH")?;

    let data = matches
        .get_one::<String>(commands::ARG_DATA)
        .map(|raw| serde_json::from_str::<Value>(raw))
        .transpose()
        .context("--data is not valid JSON")?;

    Ok(Action::Request(Args {
        globals,
        method,
        path,
        data,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    fn matches_from(args: &[&str]) -> clap::ArgMatches {
        let mut argv = vec!["registry-console"];
        argv.extend_from_slice(args);
        commands::new().get_matches_from(argv)
    }

    #[test]
    fn test_handler_builds_request_action() {
        temp_env::with_vars(
            [
                ("REGISTRY_CONSOLE_BEARER_TOKEN", None::<&str>),
                ("REGISTRY_CONSOLE_TOKEN_COMMAND", None),
                ("REGISTRY_CONSOLE_PASSWORD", None),
                ("REGISTRY_CONSOLE_TIMEOUT", None),
            ],
            || {
                let matches = matches_from(&[
                    "--url",
                    "https://quay.example.com",
                    "--password",
                    "hunter2",
                    "put",
                    "/api/v1/organization/acme",
                    "-d",
                    r#"{"email":"ops@acme.io"}"#,
                ]);

                let Action::Request(args) = handler(&matches).unwrap();
                assert_eq!(args.method, HttpMethod::Put);
                assert_eq!(args.path, "/api/v1/organization/acme");
                assert_eq!(args.data, Some(json!({"email": "ops@acme.io"})));
                assert_eq!(args.globals.url, "https://quay.example.com");
                assert_eq!(args.globals.timeout, Duration::from_secs(10));
                assert_eq!(
                    args.globals.password.as_ref().map(|p| p.expose_secret().to_string()),
                    Some("hunter2".to_string())
                );
                assert!(!args.globals.is_embedded());
            },
        );
    }

    #[test]
    fn test_handler_embedded_bearer_token() {
        temp_env::with_vars(
            [
                ("REGISTRY_CONSOLE_BEARER_TOKEN", Some("sha256~abc")),
                ("REGISTRY_CONSOLE_TOKEN_COMMAND", None),
            ],
            || {
                let matches = matches_from(&[
                    "--url",
                    "https://quay.example.com",
                    "GET",
                    "/api/v1/user/",
                ]);

                let Action::Request(args) = handler(&matches).unwrap();
                assert!(args.globals.is_embedded());
                assert_eq!(args.data, None);
            },
        );
    }

    #[test]
    fn test_handler_rejects_invalid_json() {
        let matches = matches_from(&[
            "--url",
            "https://quay.example.com",
            "POST",
            "/api/v1/organization/",
            "--data",
            "{not json",
        ]);

        let err = handler(&matches).err().unwrap();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
