//! # Aula (authentication & session core)
//!
//! `aula` is the authentication and session core of the Aula e-learning
//! platform. It covers three tightly coupled concerns:
//!
//! - **Session lifecycle & cross-context synchronization** — the [`session`]
//!   module: per-origin storage, a publish/subscribe bus between open
//!   contexts, and the controller that orchestrates login/signup/logout.
//! - **Role-based access gating** — [`session::gate`]: a per-view state
//!   machine deciding, from the freshest stored session and with no network
//!   round trip, whether protected content may render. Advisory only; the
//!   API re-checks every protected call.
//! - **Resilient store connectivity** — the [`store`] module: a process-wide
//!   connection manager that connects, observes driver signals, retries
//!   forever on a fixed delay, and closes cleanly on shutdown.
//!
//! The [`api`] module exposes the HTTP surface (`/api/auth/login`,
//! `/api/auth/signup`, `/api/auth/me`, `/health`) and the [`cli`] module the
//! service binary's configuration.

pub mod api;
pub mod auth;
pub mod cli;
pub mod session;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
