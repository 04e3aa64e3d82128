use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::{Any, Pool};
use std::sync::Arc;

use crate::models::login_attempt::LoginAttempt;
use crate::utils::error::{EtlError, EtlResult};

pub type DbPool = Arc<Pool<Any>>;

pub const INSERT_LOGIN_ATTEMPT: &str =
    "INSERT INTO logs (username, timestamp, successful) VALUES (?, ?, ?)";

pub async fn create_pool(database_url: &str) -> EtlResult<DbPool> {
    create_pool_with(database_url, 5).await
}

pub async fn create_pool_with(database_url: &str, max_connections: u32) -> EtlResult<DbPool> {
    install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(EtlError::Connection)?;

    Ok(Arc::new(pool))
}

pub async fn insert_login_attempt(pool: &Pool<Any>, attempt: &LoginAttempt) -> EtlResult<()> {
    sqlx::query(INSERT_LOGIN_ATTEMPT)
        .bind(&attempt.username)
        .bind(&attempt.timestamp)
        .bind(attempt.outcome.as_flag())
        .execute(pool)
        .await?;
    Ok(())
}
