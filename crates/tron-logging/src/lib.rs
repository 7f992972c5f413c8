//! # tron-logging
//!
//! Structured logging with `tracing` and optional `SQLite` transport.
//!
//! Provides per-module spans, request/session ID propagation,
//! and batched async writes to the log database.

#![deny(unsafe_code)]

pub mod transport;
pub mod types;

use std::time::Duration;

use rusqlite::Connection;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

pub use transport::{SqliteTransport, TransportConfig, TransportHandle};
pub use types::{LogEntry, LogLevel, LogQueryOptions};

/// Handle to the installed global subscriber.
///
/// Wraps a [`TransportHandle`] so callers can force a flush (e.g. on shutdown)
/// without reaching into the transport layer directly.
#[derive(Clone)]
pub struct LogHandle {
    transport: TransportHandle,
}

impl LogHandle {
    /// Flush any batched log entries to `SQLite` immediately.
    pub fn flush(&self) {
        self.transport.flush();
    }
}

/// Install the global `tracing` subscriber with stdout formatting and a
/// `SQLite` write transport, filtered by `filter_str` (e.g. `"info"`,
/// `"debug,tron_runtime=trace"`).
///
/// `conn` must already have the `logs` and `logs_fts` tables created (via
/// `tron-events` migrations) and should be a dedicated connection separate
/// from any connection pool used elsewhere, since the transport holds it for
/// the process lifetime.
///
/// Returns a [`LogHandle`] for manual flushing; pair with [`spawn_flush_task`]
/// to flush periodically in the background.
#[must_use]
pub fn init_subscriber_with_sqlite(filter_str: &str, conn: Connection) -> LogHandle {
    let transport = SqliteTransport::new(conn, TransportConfig::default());
    let handle = transport.handle();

    let env_filter = EnvFilter::try_new(filter_str).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(transport);

    // init() panics if a global subscriber is already set; acceptable at
    // process startup where this runs exactly once.
    subscriber.init();

    LogHandle { transport: handle }
}

/// Spawn a background task that periodically flushes batched log entries.
///
/// The returned `JoinHandle` should be aborted on shutdown; call
/// [`LogHandle::flush`] once more afterward to persist any entries written
/// between the final tick and the abort.
pub fn spawn_flush_task(handle: LogHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(
            TransportConfig::default().flush_interval_ms,
        ));
        loop {
            interval.tick().await;
            handle.flush();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                level TEXT NOT NULL,
                level_num INTEGER NOT NULL,
                component TEXT NOT NULL DEFAULT '',
                message TEXT DEFAULT '',
                session_id TEXT,
                workspace_id TEXT,
                event_id TEXT,
                turn INTEGER,
                trace_id TEXT,
                parent_trace_id TEXT,
                depth INTEGER,
                data TEXT,
                error_message TEXT,
                error_stack TEXT
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS logs_fts USING fts5(
                log_id UNINDEXED,
                session_id UNINDEXED,
                component,
                message,
                error_message,
                tokenize='porter unicode61'
            );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn log_handle_flush_does_not_panic_on_empty_batch() {
        let conn = create_test_db();
        let transport = SqliteTransport::new(conn, TransportConfig::default());
        let handle = LogHandle { transport: transport.handle() };
        handle.flush();
    }

    #[tokio::test]
    async fn spawn_flush_task_can_be_aborted() {
        let conn = create_test_db();
        let transport = SqliteTransport::new(conn, TransportConfig::default());
        let handle = LogHandle { transport: transport.handle() };

        let task = spawn_flush_task(handle.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
