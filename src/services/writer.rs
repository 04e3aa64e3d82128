use std::future::Future;

use tokio::sync::mpsc;

use crate::database::{self, DbPool};
use crate::models::login_attempt::LoginAttempt;
use crate::utils::error::EtlResult;

pub trait AttemptSink: Send + Sync {
    fn insert(&self, attempt: &LoginAttempt) -> impl Future<Output = EtlResult<()>> + Send;
}

#[derive(Clone)]
pub struct SqlSink {
    pool: DbPool,
}

impl SqlSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AttemptSink for SqlSink {
    async fn insert(&self, attempt: &LoginAttempt) -> EtlResult<()> {
        database::insert_login_attempt(self.pool.as_ref(), attempt).await
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub inserts_succeeded: u64,
    pub inserts_failed: u64,
}

pub async fn write_attempts<S: AttemptSink>(
    sink: &S,
    mut rx: mpsc::Receiver<LoginAttempt>,
) -> WriteStats {
    let mut stats = WriteStats::default();

    while let Some(attempt) = rx.recv().await {
        match sink.insert(&attempt).await {
            Ok(()) => stats.inserts_succeeded += 1,
            Err(e) => {
                stats.inserts_failed += 1;
                tracing::warn!(
                    "Failed to insert login attempt for {} at {}: {}",
                    attempt.username,
                    attempt.timestamp,
                    e
                );
            }
        }
    }

    stats
}
