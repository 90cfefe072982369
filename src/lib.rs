//! # registry-console
//!
//! Authenticated API client for the container registry console.
//!
//! Every request sent through [`client::ConsoleClient`] carries the session's
//! anti-forgery token (`X-CSRF-Token`) and, when the console runs inside an
//! embedding host, a bearer token. The client keeps those credentials fresh:
//!
//! - the CSRF token is fetched lazily from `/csrf_token` and rotated whenever a
//!   response carries `x-next-csrf-token`;
//! - a plain `401` refreshes the bearer token (embedded) or sends the user to
//!   `/signin` (standalone);
//! - a `401` marked `fresh_login_required` parks the request in a queue until
//!   the user re-verifies their password, then the whole queue is replayed (or
//!   rejected when the user cancels).
//!
//! The `cli` module wires the client to a terminal so a single API call can be
//! made from the shell, answering fresh-login challenges interactively.

pub mod cli;
pub mod client;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
