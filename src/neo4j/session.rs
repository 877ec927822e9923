//! Transactional sessions against Neo4j
//!
//! A [`SessionPool`] owns one `neo4rs::Graph` (which keeps its own Bolt connection
//! pool) plus a semaphore bounding concurrent transactions. Each logical operation
//! calls [`SessionPool::acquire`], does its work on the returned [`StoreSession`],
//! and ends with [`StoreSession::finish`], which commits or rolls back. The
//! semaphore permit is released when the session drops, whichever way the caller
//! leaves.

use super::error::{is_constraint_violation, is_transient, StoreError};
use neo4rs::{query, ConfigBuilder, Graph, Query, Row, Txn};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// How long and how often to retry a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed pause between attempts
    pub interval: Duration,
    /// Give up after this many attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: Some(30),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails permanently, or the policy runs out.
    ///
    /// Permanent failures become [`StoreError::Session`]; an exhausted policy
    /// becomes [`StoreError::Transient`].
    pub async fn retry<T, E, F, Fut>(
        &self,
        what: &str,
        is_transient: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, StoreError>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) => {
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(StoreError::Transient {
                            attempts,
                            message: format!("{}: {}", what, e),
                        });
                    }
                    tracing::warn!(
                        "{} failed transiently (attempt {}): {}; retrying in {:?}",
                        what,
                        attempts,
                        e,
                        self.interval
                    );
                    tokio::time::sleep(self.interval).await;
                }
                Err(e) => return Err(StoreError::Session(format!("{}: {}", what, e))),
            }
        }
    }
}

/// Connection settings for the session pool
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Upper bound on concurrently open transactions
    pub max_sessions: usize,
    pub retry: RetryPolicy,
}

/// Pool of long-lived Bolt connections handing out one transaction per operation
pub struct SessionPool {
    graph: Arc<Graph>,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl SessionPool {
    /// Dial the store and complete the login handshake.
    ///
    /// Transient failures are retried per `settings.retry`; anything else is
    /// returned to the caller.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let max_sessions = settings.max_sessions.max(1);

        let graph = settings
            .retry
            .retry("connect to Neo4j", is_transient, || async {
                let config = ConfigBuilder::default()
                    .uri(settings.uri.as_str())
                    .user(settings.user.as_str())
                    .password(settings.password.as_str())
                    .max_connections(max_sessions)
                    .build()?;
                let graph = Graph::connect(config).await?;
                // Bolt login is lazy; force it so bad credentials surface here
                graph.run(query("RETURN 1")).await?;
                Ok::<_, neo4rs::Error>(graph)
            })
            .await?;

        tracing::info!(
            "Connected to Neo4j at {} (max {} sessions)",
            settings.uri,
            max_sessions
        );

        Ok(Self {
            graph: Arc::new(graph),
            permits: Arc::new(Semaphore::new(max_sessions)),
            retry: settings.retry,
        })
    }

    /// Open a transaction, waiting for a free slot if the pool is saturated
    pub async fn acquire(&self) -> Result<StoreSession, StoreError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Session("session pool closed".to_string()))?;

        let txn = self
            .retry
            .retry("start transaction", is_transient, || {
                let graph = self.graph.clone();
                async move { graph.start_txn().await }
            })
            .await?;

        Ok(StoreSession {
            txn,
            _permit: permit,
        })
    }

    /// Run a single auto-committed statement outside any session (schema DDL)
    pub(crate) async fn run_standalone(&self, q: Query) -> Result<(), neo4rs::Error> {
        self.graph.run(q).await
    }

    pub async fn health_check(&self) -> bool {
        self.graph.run(query("RETURN 1")).await.is_ok()
    }
}

/// One open transaction plus its pool slot
pub struct StoreSession {
    txn: Txn,
    _permit: OwnedSemaphorePermit,
}

impl StoreSession {
    /// Execute a statement whose result rows are not needed
    pub async fn run(&mut self, q: Query) -> Result<(), neo4rs::Error> {
        self.txn.run(q).await
    }

    /// Execute a statement and collect every row
    pub async fn fetch(&mut self, q: Query) -> Result<Vec<Row>, neo4rs::Error> {
        let mut stream = self.txn.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next(self.txn.handle()).await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Commit when `outcome` is `Ok`, roll back otherwise, and hand `outcome` back
    pub async fn finish<T>(self, outcome: Result<T, StoreError>) -> Result<T, StoreError> {
        match outcome {
            Ok(value) => {
                self.txn.commit().await.map_err(|e| {
                    if is_constraint_violation(&e) {
                        StoreError::Conflict(format!("commit: {}", e))
                    } else if is_transient(&e) {
                        StoreError::Transient {
                            attempts: 1,
                            message: format!("commit: {}", e),
                        }
                    } else {
                        StoreError::Write(format!("commit: {}", e))
                    }
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = self.txn.rollback().await {
                    tracing::warn!("Rollback after failed operation also failed: {}", e);
                }
                Err(err)
            }
        }
    }
}
