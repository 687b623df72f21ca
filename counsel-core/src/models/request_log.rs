use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted HTTP exchange. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestLog {
    pub id: i32,
    pub method: Option<String>,
    pub path: Option<String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub status_code: Option<i32>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Insert payload; `id` and `timestamp` are assigned by PostgreSQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequestLog {
    pub method: String,
    pub path: String,
    pub request_body: String,
    pub response_body: String,
    pub status_code: i32,
}
