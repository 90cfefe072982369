use clap::{Arg, Command};

pub const ARG_BEARER_TOKEN: &str = "bearer-token";
pub const ARG_TOKEN_COMMAND: &str = "token-command";
pub const ARG_PASSWORD: &str = "password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BEARER_TOKEN)
                .long("bearer-token")
                .help("Bearer token issued by the embedding host")
                .env("REGISTRY_CONSOLE_BEARER_TOKEN")
                .hide_env_values(true)
                .conflicts_with(ARG_TOKEN_COMMAND),
        )
        .arg(
            Arg::new(ARG_TOKEN_COMMAND)
                .long("token-command")
                .help("Command that prints a bearer token, example: \"oc whoami -t\"")
                .env("REGISTRY_CONSOLE_TOKEN_COMMAND"),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long("password")
                .help("Password used to answer fresh login challenges (prompted when missing)")
                .env("REGISTRY_CONSOLE_PASSWORD")
                .hide_env_values(true),
        )
}
