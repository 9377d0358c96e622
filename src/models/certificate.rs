// src/models/certificate.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'certificates' table in the database.
/// At most one row per (user_id, quiz_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    /// File name inside the certificate folder.
    pub file_path: String,
    pub issued_at: Option<chrono::DateTime<chrono::Utc>>,
}
