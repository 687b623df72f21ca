use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::{NewRequestLog, RequestLog};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

const CREATE_REQUEST_LOGS: &str = "
    CREATE TABLE IF NOT EXISTS request_logs (
        id SERIAL PRIMARY KEY,
        method VARCHAR(10),
        path VARCHAR(255),
        request_body TEXT,
        response_body TEXT,
        status_code INTEGER,
        timestamp TIMESTAMPTZ DEFAULT now()
    )";

/// Connect to PostgreSQL, retrying at a fixed interval while the database
/// comes up. `connect_retries` counts total attempts.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let attempts = config.connect_retries.max(1);
    let strategy = FixedInterval::new(Duration::from_secs(config.retry_interval_seconds))
        .take(attempts - 1);

    let mut attempt = 0usize;
    Retry::spawn(strategy, || {
        attempt += 1;
        let current = attempt;
        let options = PgPoolOptions::new().max_connections(config.max_connections);
        let url = config.url.clone();
        async move {
            options.connect(&url).await.map_err(|e| {
                tracing::warn!(
                    attempt = current,
                    max_attempts = attempts,
                    error = %e,
                    "Database not ready, retrying"
                );
                e
            })
        }
    })
    .await
}

/// Create the request log table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_REQUEST_LOGS).execute(pool).await?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Append one request log row inside its own transaction. Returns the row id.
pub async fn insert_request_log(pool: &PgPool, log: &NewRequestLog) -> Result<i32, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row: (i32,) = sqlx::query_as(
        r#"
        INSERT INTO request_logs (method, path, request_body, response_body, status_code)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&log.method)
    .bind(&log.path)
    .bind(&log.request_body)
    .bind(&log.response_body)
    .bind(log.status_code)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(row.0)
}

/// Newest rows first.
pub async fn recent_request_logs(pool: &PgPool, limit: i64) -> Result<Vec<RequestLog>, sqlx::Error> {
    sqlx::query_as::<_, RequestLog>(
        "SELECT id, method, path, request_body, response_body, status_code, timestamp
         FROM request_logs ORDER BY id DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
