//! Persistent-store connectivity.
//!
//! [`ConnectionManager`] owns the lifecycle of the service's connection to
//! the backing store: connect with a bounded attempt timeout, observe driver
//! signals, retry forever on a fixed delay, and close cleanly on shutdown.
//! One supervisor task drives the whole state machine, which makes the
//! invariants structural: at most one attempt in flight, at most one pending
//! retry, and a pending retry is cancelled by shutdown because both live in
//! the same `select`.
//!
//! Consumers never touch the manager directly; they hold it as a
//! [`StoreHandle`] so tests can substitute a stub.

pub mod pg;

pub use pg::PgConnector;

use sqlx::PgPool;
use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{error, info, instrument, warn};

/// Bound on a single connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on acquiring a connection for one operation once connected.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(45);
/// Fixed pause between reconnection attempts. Retries never stop on their
/// own; only shutdown ends the loop.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Connection lifecycle states, as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the manager, cheap to copy out for `/health` and
/// for the fast-fail check in the auth service.
#[derive(Debug, Clone)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub retry_count: u64,
    pub retry_delay: Duration,
}

/// Unsolicited signals a driver can raise once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The driver reported an error that invalidates the connection.
    Error(String),
    /// The connection dropped.
    Lost,
    /// The driver recovered on its own.
    Reconnected,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error(transparent)]
    Driver(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Opens connections to the persistent store.
pub trait StoreConnector: Send + Sync + 'static {
    type Conn: StoreConn;

    /// Human-readable connection descriptor with credentials already
    /// redacted; this is the only form that may be logged.
    fn describe(&self) -> String;

    fn connect(&self) -> impl Future<Output = Result<Self::Conn, StoreError>> + Send;
}

/// An established store connection the supervisor can observe and close.
pub trait StoreConn: Clone + Send + Sync + 'static {
    /// Resolve with the next unsolicited driver signal.
    fn watch(&self) -> impl Future<Output = StoreEvent> + Send;

    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Read-only view of the manager shared with request handlers and the auth
/// service. Observation only: implementations must not probe or establish
/// connections from these calls.
pub trait StoreHandle: Send + Sync {
    fn snapshot(&self) -> ConnectionSnapshot;
    fn pool(&self) -> Option<PgPool>;
}

/// How handlers and the auth service hold the manager.
pub type SharedStoreHandle = Arc<dyn StoreHandle>;

/// Timing knobs, overridable in tests.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub connect_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            retry_delay: RETRY_DELAY,
        }
    }
}

/// Process-wide owner of the store connection. Exactly one per process,
/// created at startup and injected where needed.
pub struct ConnectionManager<C: StoreConnector> {
    connector: C,
    config: ConnectionConfig,
    snapshot: RwLock<ConnectionSnapshot>,
    conn: RwLock<Option<C::Conn>>,
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl<C: StoreConnector> ConnectionManager<C> {
    /// Create the manager and start its supervisor task. The first
    /// connection attempt begins immediately.
    #[must_use]
    pub fn spawn(connector: C, config: ConnectionConfig) -> Arc<Self> {
        let (shutdown, signal) = watch::channel(false);
        let manager = Arc::new(Self {
            connector,
            config: config.clone(),
            snapshot: RwLock::new(ConnectionSnapshot {
                state: ConnectionState::Disconnected,
                last_error: None,
                retry_count: 0,
                retry_delay: config.retry_delay,
            }),
            conn: RwLock::new(None),
            shutdown,
            supervisor: Mutex::new(None),
        });

        let handle = tokio::spawn(Arc::clone(&manager).run(signal));
        *manager
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        manager
    }

    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.snapshot().state
    }

    /// Current connection, if any. Empty while disconnected or between
    /// reconnection attempts.
    #[must_use]
    pub fn connection(&self) -> Option<C::Conn> {
        self.conn
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Signal shutdown and wait for the supervisor to close the connection.
    /// Cancels a pending retry; returns only after the close completed.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn transition(&self, state: ConnectionState, last_error: Option<String>) {
        let mut snapshot = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        snapshot.state = state;
        if last_error.is_some() {
            snapshot.last_error = last_error;
        }
    }

    fn bump_retry(&self) {
        self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retry_count += 1;
    }

    fn reset_retries(&self) {
        let mut snapshot = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        snapshot.retry_count = 0;
        snapshot.last_error = None;
    }

    fn install(&self, conn: C::Conn) {
        *self.conn.write().unwrap_or_else(PoisonError::into_inner) = Some(conn);
    }

    fn take_conn(&self) -> Option<C::Conn> {
        self.conn
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    #[instrument(skip_all)]
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.transition(ConnectionState::Connecting, None);
            info!("connecting to {}", self.connector.describe());

            let attempt = tokio::select! {
                result = timeout(self.config.connect_timeout, self.connector.connect()) => {
                    match result {
                        Ok(Ok(conn)) => Some(conn),
                        Ok(Err(err)) => {
                            error!("store connection failed: {err}");
                            self.transition(ConnectionState::Disconnected, Some(err.to_string()));
                            None
                        }
                        Err(_) => {
                            let err = StoreError::ConnectTimeout(self.config.connect_timeout);
                            error!("store connection failed: {err}");
                            self.transition(ConnectionState::Disconnected, Some(err.to_string()));
                            None
                        }
                    }
                }
                _ = shutdown.changed() => break,
            };

            if let Some(conn) = attempt {
                self.reset_retries();
                self.install(conn.clone());
                self.transition(ConnectionState::Connected, None);
                info!("connected to the persistent store");

                let lost = self.observe(&conn, &mut shutdown).await;
                if !lost {
                    // Shutdown: leave the connection installed so the
                    // teardown below closes it.
                    break;
                }
                self.take_conn();
            }

            // Exactly one pending retry at a time, and it shares a select
            // with the shutdown signal so teardown cancels it.
            info!("retrying store connection in {:?}", self.config.retry_delay);
            tokio::select! {
                () = sleep(self.config.retry_delay) => self.bump_retry(),
                _ = shutdown.changed() => break,
            }
        }

        self.transition(ConnectionState::Disconnecting, None);
        if let Some(conn) = self.take_conn() {
            conn.close().await;
        }
        self.transition(ConnectionState::Disconnected, None);
        info!("store connection closed");
    }

    /// Watch driver signals until the connection is lost (`true`) or
    /// shutdown is requested (`false`).
    async fn observe(&self, conn: &C::Conn, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            tokio::select! {
                event = conn.watch() => match event {
                    StoreEvent::Reconnected => {
                        info!("store driver reconnected");
                        self.transition(ConnectionState::Connected, None);
                    }
                    StoreEvent::Error(message) => {
                        error!("store driver error: {message}");
                        self.transition(ConnectionState::Disconnected, Some(message));
                        return true;
                    }
                    StoreEvent::Lost => {
                        warn!("store connection dropped, scheduling reconnect");
                        self.transition(ConnectionState::Disconnected, None);
                        return true;
                    }
                },
                _ = shutdown.changed() => return false,
            }
        }
    }
}

impl<C> StoreHandle for ConnectionManager<C>
where
    C: StoreConnector<Conn = PgPool>,
{
    fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionManager::snapshot(self)
    }

    fn pool(&self) -> Option<PgPool> {
        self.connection()
    }
}
