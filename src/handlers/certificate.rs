// src/handlers/certificate.rs

use axum::{
    Extension,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::certificate::Certificate,
    services::certificate::certificate_path,
    utils::jwt::Claims,
};

/// Streams the certificate PDF to its holder or an admin.
pub async fn download(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let cert = sqlx::query_as::<_, Certificate>(
        "SELECT id, user_id, quiz_id, file_path, issued_at FROM certificates WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Certificate not found".to_string()))?;

    claims.require_view(cert.user_id)?;

    let path = certificate_path(&config.cert_folder, &cert.file_path)
        .ok_or(AppError::NotFound("Certificate file not found".to_string()))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            tracing::warn!(certificate_id = cert.id, path = %path.display(), "Certificate file missing");
            AppError::NotFound("Certificate file not found".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", cert.file_path),
            ),
        ],
        bytes,
    ))
}
