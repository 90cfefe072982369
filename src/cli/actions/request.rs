use crate::{
    cli::globals::GlobalArgs,
    client::{ConsoleClient, FreshLoginRequired, HttpMethod, RequestDescriptor},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info, warn};

pub struct Args {
    pub globals: GlobalArgs,
    pub method: HttpMethod,
    pub path: String,
    pub data: Option<Value>,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("globals", &self.globals)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("data", &self.data.as_ref().map(|_| "<json>"))
            .finish()
    }
}

impl Args {
    fn descriptor(&self) -> RequestDescriptor {
        let request = RequestDescriptor::new(self.method, self.path.clone());
        match &self.data {
            Some(body) => request.with_body(body.clone()),
            None => request,
        }
    }
}

/// Send one API call and print the JSON response on stdout.
///
/// Fresh-login challenges are answered with `--password` or an interactive
/// prompt; an empty answer cancels the call.
///
/// # Errors
/// Returns an error if the client cannot be built or the call fails.
pub async fn execute(args: Args) -> Result<()> {
    let (sender, mut events) = mpsc::unbounded_channel::<FreshLoginRequired>();
    let client = args.globals.client(Arc::new(sender))?;

    info!("{} {}", args.method, args.path);

    let descriptor = args.descriptor();
    let call_client = client.clone();
    let mut call = tokio::spawn(async move { call_client.send(descriptor).await });

    let mut round = 0;
    let response = loop {
        tokio::select! {
            joined = &mut call => {
                break joined.context("request task failed")??;
            }
            Some(event) = events.recv() => {
                round += 1;
                debug!("fresh login required (round {round}), queued request {}", event.request_id);
                answer_fresh_login(&client, next_answer(round, args.globals.password.as_ref())).await?;
            }
        }
    };

    debug!("response status {}", response.status);

    if let Some(rendered) = render(&response.body)? {
        println!("{rendered}");
    }

    Ok(())
}

/// Fresh-login rounds answered before the call is cancelled.
const MAX_VERIFY_ROUNDS: u32 = 3;

#[derive(Debug)]
enum Answer {
    Password(SecretString),
    Prompt,
    GiveUp,
}

fn next_answer(round: u32, password: Option<&SecretString>) -> Answer {
    if round > MAX_VERIFY_ROUNDS {
        return Answer::GiveUp;
    }

    match password {
        // A replay asking again means the configured password is not enough.
        Some(_) if round > 1 => Answer::Prompt,
        Some(password) => Answer::Password(password.clone()),
        None => Answer::Prompt,
    }
}

async fn answer_fresh_login(client: &ConsoleClient, answer: Answer) -> Result<()> {
    let password = match answer {
        Answer::Password(password) => password,
        Answer::Prompt => prompt_password().await?,
        Answer::GiveUp => {
            let cancelled = client.cancel_all();
            warn!(
                "fresh login still required after {MAX_VERIFY_ROUNDS} rounds, {cancelled} request(s) rejected"
            );
            return Ok(());
        }
    };

    if password_is_empty(&password) {
        let cancelled = client.cancel_all();
        info!("fresh login cancelled, {cancelled} request(s) rejected");
        return Ok(());
    }

    match client.verify_fresh_login(&password).await {
        Ok(replayed) => info!("fresh login verified, replaying {replayed} request(s)"),
        // The queue is already rejected; the pending call reports the failure.
        Err(err) => warn!("fresh login failed: {err}"),
    }

    Ok(())
}

async fn prompt_password() -> Result<SecretString> {
    eprint!("Please verify your password to continue: ");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read password from stdin")?;

    Ok(SecretString::from(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn password_is_empty(password: &SecretString) -> bool {
    password.expose_secret().is_empty()
}

fn render(body: &Value) -> Result<Option<String>> {
    match body {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        other => Ok(Some(
            serde_json::to_string_pretty(other).context("failed to render response")?,
        )),
    }
}
