use crate::{
    api,
    cli::globals::GlobalArgs,
    store::{ConnectionConfig, ConnectionManager, PgConnector},
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub environment: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
}

/// Execute the server action.
///
/// The connection manager starts first and keeps retrying on its own; the
/// HTTP surface comes up immediately and fast-fails auth calls until the
/// store is reachable.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let globals = GlobalArgs::new(
        args.environment,
        args.session_secret,
        args.session_ttl_seconds,
    );

    debug!("Global args: {:?}", globals);

    let manager = ConnectionManager::spawn(
        PgConnector::new(args.dsn),
        ConnectionConfig::default(),
    );

    api::serve(args.port, manager, globals).await
}
