//! Document processing endpoints
//!
//! - `POST /upload`: store an upload in a new session (probing it with MuPDF)
//! - `POST /process`: apply a caller-supplied replacement map
//! - `POST /make-21-plus`: apply the age-up heuristic
//!
//! Processing runs on the blocking pool under the configured timeout.

use std::collections::HashMap;
use std::path::PathBuf;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::age::generate_age_replacements;
use crate::document::{DocumentError, DocumentResult};
use crate::error::{AppError, Result};
use crate::mupdf::{looks_like_pdf, probe_pdf};
use crate::patch::{apply_replacements, replace_in_document, ReplacementDetail, ReplacementMap};
use crate::pdf::{document_text, load_document, open_document};
use crate::session::SessionLease;
use crate::state::AppState;

/// Output prefix for `/process`
const MODIFIED_PREFIX: &str = "modified_";
/// Output prefix for `/make-21-plus`
const AGE_UP_PREFIX: &str = "21plus_";

const NO_REPLACEMENTS_WARNING: &str =
    "No replacements were made. Please check if the numbers exist in the PDF.";

// ============================================================================
// Response Types
// ============================================================================

/// Upload response
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UploadResponse {
    /// Encrypted upload without a password; nothing was stored
    Locked { encrypted: bool, message: String },
    /// Stored upload
    Stored {
        encrypted: bool,
        filename: String,
        session_id: Uuid,
        page_count: usize,
        expires_at: DateTime<Utc>,
    },
}

/// Response for `/process`
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub filename: String,
    pub download_url: String,
    pub total_replacements: u64,
    pub replacement_details: indexmap::IndexMap<String, ReplacementDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Response for `/make-21-plus`
#[derive(Debug, Serialize)]
pub struct AgeUpResponse {
    pub success: bool,
    pub filename: String,
    pub download_url: String,
    pub message: String,
    pub total_replacements: u64,
    pub replacements_made: Vec<(String, String)>,
}

// ============================================================================
// Router
// ============================================================================

/// Create the documents router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/process", post(process))
        .route("/make-21-plus", post(make_21_plus))
}

// ============================================================================
// Multipart Handling
// ============================================================================

/// Fields of a multipart form, with at most one file
#[derive(Default)]
struct FormFields {
    file: Option<(String, Bytes)>,
    text: HashMap<String, String>,
}

impl FormFields {
    /// A text field, treating empty values as missing
    fn optional(&self, name: &str) -> Option<String> {
        self.text
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String> {
        self.optional(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing form field '{}'", name)))
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    tracing::debug!("Failed to read multipart field: {}", err);
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

async fn read_form(mut multipart: Multipart) -> Result<FormFields> {
    let mut fields = FormFields::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let data = field.bytes().await.map_err(multipart_error)?;
            tracing::debug!(filename = %filename, bytes = data.len(), "Received file field");
            fields.file = Some((filename, data));
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            fields.text.insert(name, value);
        }
    }
    Ok(fields)
}

// ============================================================================
// Blocking Work
// ============================================================================

/// Run `job` on the blocking pool under the processing timeout.
///
/// On timeout the partially written `output` is removed; the job itself
/// keeps running until it finishes on its own.
async fn run_blocking<T, F>(state: &AppState, output: Option<PathBuf>, job: F) -> Result<T>
where
    F: FnOnce() -> DocumentResult<T> + Send + 'static,
    T: Send + 'static,
{
    let limit = state.process_timeout();
    let task = tokio::task::spawn_blocking(job);

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(Err(err))) if err.is_input_error() => {
            tracing::info!(error = %err, "Document rejected");
            Err(err.into())
        }
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(join_error)) => Err(AppError::Internal(format!(
            "processing task failed: {}",
            join_error
        ))),
        Err(_) => {
            tracing::warn!(timeout_secs = limit.as_secs(), "Processing timed out");
            if let Some(path) = output {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    tracing::debug!(path = %path.display(), error = %err, "Output not removed");
                }
            }
            Err(AppError::Timeout(limit.as_secs()))
        }
    }
}

fn download_url(session_id: Uuid, filename: &str) -> String {
    format!("/download/{}/{}", session_id, urlencoding::encode(filename))
}

/// Document to patch: the leased handle, or the upload reopened with `password`
fn take_document(
    lease: &mut SessionLease,
    password: Option<String>,
) -> Option<Box<dyn FnOnce() -> DocumentResult<lopdf::Document> + Send>> {
    if let Some(doc) = lease.handle.take() {
        return Some(Box::new(move || Ok(doc)));
    }
    let password = password?;
    let input = lease.input_path.clone();
    Some(Box::new(move || open_document(&input, Some(&password))))
}

// ============================================================================
// Handlers
// ============================================================================

/// Upload a PDF and open a session for it
async fn upload(State(state): State<AppState>, multipart: Multipart) -> Result<Json<UploadResponse>> {
    let fields = read_form(multipart).await?;
    let password = fields.optional("password");
    let (filename, data) = fields
        .file
        .ok_or_else(|| AppError::BadRequest("No file provided. Use field name 'file'".into()))?;

    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(AppError::BadRequest("Only PDF files are allowed".into()));
    }
    if data.len() > state.config().server.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "{} bytes (max: {})",
            data.len(),
            state.config().server.max_upload_bytes
        )));
    }
    if !looks_like_pdf(&data) {
        return Err(AppError::BadRequest("Uploaded file is not a PDF".into()));
    }

    let probe = {
        let data = data.clone();
        let password = password.clone();
        run_blocking(&state, None, move || probe_pdf(&data, password.as_deref())).await?
    };

    if probe.encrypted && password.is_none() {
        tracing::info!(filename = %filename, "Encrypted upload without password");
        return Ok(Json(UploadResponse::Locked {
            encrypted: true,
            message: "PDF is password protected".to_string(),
        }));
    }
    if !probe.is_readable() {
        return Err(DocumentError::InvalidPassword.into());
    }

    let sessions = state.sessions();
    let pending = sessions.prepare().await?;
    if let Err(err) = tokio::fs::write(pending.input_path(), &data).await {
        sessions.discard(pending).await;
        return Err(err.into());
    }

    let handle = if probe.encrypted {
        let data = data.clone();
        match run_blocking(&state, None, move || load_document(&data, password.as_deref())).await {
            Ok(doc) => Some(doc),
            Err(err) => {
                sessions.discard(pending).await;
                return Err(err);
            }
        }
    } else {
        None
    };

    let info = sessions
        .insert(
            pending,
            &filename,
            probe.encrypted,
            probe.page_count.unwrap_or_default(),
            handle,
        )
        .await;

    Ok(Json(UploadResponse::Stored {
        encrypted: info.encrypted,
        filename: info.filename,
        session_id: info.session_id,
        page_count: info.page_count,
        expires_at: info.expires_at,
    }))
}

/// Apply a replacement map to a session's document
async fn process(State(state): State<AppState>, multipart: Multipart) -> Result<Json<ProcessResponse>> {
    let fields = read_form(multipart).await?;
    let session_id = fields.required("session_id")?;
    let replacements: ReplacementMap = serde_json::from_str(&fields.required("replacements")?)?;

    let mut lease = state.sessions().checkout(&session_id).await?;
    let output_name = lease.output_name(MODIFIED_PREFIX);
    let output_path = lease.output_path(MODIFIED_PREFIX);
    let document = take_document(&mut lease, fields.optional("password"));

    tracing::info!(
        session_id = %lease.id,
        keys = replacements.len(),
        with_handle = document.is_some(),
        "Processing replacements"
    );

    let input = lease.input_path.clone();
    let output = output_path.clone();
    let fonts = state.fonts();
    let report = run_blocking(&state, Some(output_path), move || match document {
        Some(open) => {
            let mut doc = open()?;
            apply_replacements(&input, &output, &replacements, Some(&mut doc), &fonts)
        }
        None => apply_replacements(&input, &output, &replacements, None, &fonts),
    })
    .await?;

    let warning = report
        .is_empty()
        .then(|| NO_REPLACEMENTS_WARNING.to_string());

    Ok(Json(ProcessResponse {
        success: true,
        download_url: download_url(lease.id, &output_name),
        filename: output_name,
        total_replacements: report.total_replacements,
        replacement_details: report.replacement_details,
        warning,
    }))
}

/// Replace likely birth years so everyone in the document appears 21+
async fn make_21_plus(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AgeUpResponse>> {
    let fields = read_form(multipart).await?;
    let session_id = fields.required("session_id")?;

    let mut lease = state.sessions().checkout(&session_id).await?;
    let output_name = lease.output_name(AGE_UP_PREFIX);
    let output_path = lease.output_path(AGE_UP_PREFIX);
    let document = take_document(&mut lease, fields.optional("password"));

    let input = lease.input_path.clone();
    let output = output_path.clone();
    let fonts = state.fonts();
    let policy = state.config().age_up;
    let (replacements, report) = run_blocking(&state, Some(output_path), move || {
        let mut doc = match document {
            Some(open) => open()?,
            None => open_document(&input, None)?,
        };
        let replacements = generate_age_replacements(&document_text(&doc)?, &policy);
        let report = replace_in_document(&mut doc, &output, &replacements, &fonts)?;
        Ok((replacements, report))
    })
    .await?;

    let message = if replacements.is_empty() {
        "No dates found to modify. PDF has been processed.".to_string()
    } else {
        format!(
            "Made {} date changes to ensure all individuals are 21+",
            replacements.len()
        )
    };

    Ok(Json(AgeUpResponse {
        success: true,
        download_url: download_url(lease.id, &output_name),
        filename: output_name,
        message,
        total_replacements: report.total_replacements,
        replacements_made: replacements.into_iter().collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::time::Duration;

    #[test]
    fn test_download_url_is_encoded() {
        let id = Uuid::nil();
        assert_eq!(
            download_url(id, "modified_my form.pdf"),
            "/download/00000000-0000-0000-0000-000000000000/modified_my%20form.pdf"
        );
    }

    #[test]
    fn test_form_fields() {
        let mut fields = FormFields::default();
        fields.text.insert("password".into(), "  ".into());
        fields.text.insert("session_id".into(), " abc ".into());

        assert_eq!(fields.optional("password"), None);
        assert_eq!(fields.required("session_id").unwrap(), "abc");
        assert!(matches!(
            fields.required("replacements"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_job_times_out_and_drops_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.work_dir = dir.path().to_path_buf();
        config.processing.font_paths = Vec::new();
        config.processing.timeout_secs = 0;
        let state = AppState::new(config).await.unwrap();

        let output = dir.path().join("modified_form.pdf");
        std::fs::write(&output, b"%PDF-1.7 partial").unwrap();

        let result = run_blocking(&state, Some(output.clone()), || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Timeout(0)));
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(!output.exists());
    }
}
