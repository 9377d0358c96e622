// src/services/certificate.rs

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{certificate::Certificate, submission::Submission},
};

// A4 in points, the unit the layout below is written in.
const PAGE_WIDTH_PT: f32 = 595.28;
const PAGE_HEIGHT_PT: f32 = 841.89;
const MM_PER_PT: f32 = 25.4 / 72.0;

// Average glyph advance of Helvetica as a fraction of the font size.
const HELVETICA_ADVANCE: f32 = 0.52;
const HELVETICA_BOLD_ADVANCE: f32 = 0.58;

/// Deterministic file name of the certificate for a (user, quiz) pair.
pub fn certificate_filename(user_id: i64, quiz_id: i64) -> String {
    format!("cert_user{}_quiz{}.pdf", user_id, quiz_id)
}

/// Resolves a stored `file_path` inside the certificate folder. Only the final
/// path component is honored.
pub fn certificate_path(folder: &Path, file_path: &str) -> Option<PathBuf> {
    Path::new(file_path)
        .file_name()
        .map(|name| folder.join(name))
}

/// Data printed on a certificate.
#[derive(Debug, Clone)]
pub struct CertificateContent<'a> {
    pub holder: &'a str,
    pub quiz_title: &'a str,
    pub score: f64,
    pub issued_at: DateTime<Utc>,
}

fn pt(value: f32) -> Mm {
    Mm(value * MM_PER_PT)
}

fn text_width_pt(text: &str, size: f32, advance: f32) -> f32 {
    text.chars().count() as f32 * size * advance
}

fn draw_centered(
    layer: &PdfLayerReference,
    text: &str,
    size: f32,
    y_pt: f32,
    font: &IndirectFontRef,
    advance: f32,
) {
    let x = (PAGE_WIDTH_PT - text_width_pt(text, size, advance)) / 2.0;
    layer.use_text(text, size, pt(x.max(0.0)), pt(y_pt), font);
}

/// Renders the one-page A4 certificate.
pub fn render_certificate(content: &CertificateContent<'_>) -> Result<Vec<u8>, AppError> {
    let (doc, page, layer) = PdfDocument::new(
        "Quiz Certificate",
        pt(PAGE_WIDTH_PT),
        pt(PAGE_HEIGHT_PT),
        "Certificate",
    );
    let layer = doc.get_page(page).get_layer(layer);

    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let top = |offset: f32| PAGE_HEIGHT_PT - offset;

    draw_centered(
        &layer,
        "CERTIFICATE OF ACHIEVEMENT",
        24.0,
        top(120.0),
        &bold,
        HELVETICA_BOLD_ADVANCE,
    );
    draw_centered(
        &layer,
        "This is to certify that",
        16.0,
        top(180.0),
        &regular,
        HELVETICA_ADVANCE,
    );
    draw_centered(
        &layer,
        content.holder,
        20.0,
        top(220.0),
        &bold,
        HELVETICA_BOLD_ADVANCE,
    );
    draw_centered(
        &layer,
        &format!("has successfully completed the quiz '{}'", content.quiz_title),
        14.0,
        top(260.0),
        &regular,
        HELVETICA_ADVANCE,
    );
    draw_centered(
        &layer,
        &format!("Score: {:.1}/10", content.score),
        14.0,
        top(290.0),
        &regular,
        HELVETICA_ADVANCE,
    );

    let issued = format!("Issued at: {}", content.issued_at.format("%d/%m/%Y %H:%M UTC"));
    layer.use_text(issued, 12.0, pt(80.0), pt(100.0), &regular);

    let footer = "Quiz System";
    let footer_x = PAGE_WIDTH_PT - 80.0 - text_width_pt(footer, 12.0, HELVETICA_ADVANCE);
    layer.use_text(footer, 12.0, pt(footer_x), pt(100.0), &regular);

    Ok(doc.save_to_bytes()?)
}

async fn find_certificate(
    pool: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
) -> Result<Option<Certificate>, AppError> {
    let cert = sqlx::query_as::<_, Certificate>(
        "SELECT id, user_id, quiz_id, file_path, issued_at FROM certificates WHERE user_id = ? AND quiz_id = ?",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?;

    Ok(cert)
}

/// Returns the certificate of the submission's (user, quiz) pair, issuing it
/// first if there is none yet.
///
/// The caller checks eligibility (`Quiz::awards_certificate`). The row is
/// claimed before the PDF is written: only the request whose insert lands
/// renders the file, while racing requests wait on the write lock, see the
/// UNIQUE (user_id, quiz_id) conflict and read back the winner's record.
pub async fn ensure_certificate(
    pool: &SqlitePool,
    folder: &Path,
    submission: &Submission,
) -> Result<Certificate, AppError> {
    if let Some(existing) = find_certificate(pool, submission.user_id, submission.quiz_id).await? {
        return Ok(existing);
    }

    let (holder, quiz_title) = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT u.username, q.title
        FROM users u, quizzes q
        WHERE u.id = ? AND q.id = ?
        "#,
    )
    .bind(submission.user_id)
    .bind(submission.quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User or quiz not found".to_string()))?;

    let filename = certificate_filename(submission.user_id, submission.quiz_id);
    let issued_at = Utc::now();

    let mut tx = pool.begin().await?;

    let claimed = sqlx::query(
        r#"
        INSERT INTO certificates (user_id, quiz_id, file_path, issued_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id, quiz_id) DO NOTHING
        "#,
    )
    .bind(submission.user_id)
    .bind(submission.quiz_id)
    .bind(&filename)
    .bind(issued_at)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    if claimed {
        let bytes = render_certificate(&CertificateContent {
            holder: &holder,
            quiz_title: &quiz_title,
            score: submission.score,
            issued_at,
        })?;

        tokio::fs::create_dir_all(folder).await?;

        // Write next to the target and rename so readers never see a partial file.
        let staging = folder.join(format!("{}.{}.tmp", filename, submission.id));
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, folder.join(&filename)).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = submission.user_id,
            quiz_id = submission.quiz_id,
            file = %filename,
            "Certificate issued"
        );
    } else {
        drop(tx);
    }

    find_certificate(pool, submission.user_id, submission.quiz_id)
        .await?
        .ok_or(AppError::InternalServerError(
            "Certificate vanished after insert".to_string(),
        ))
}
