//! File uploads and CSV material import.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;
use vendorflow_engine::importer::{ensure_csv_upload, import_materials};
use vendorflow_engine::EngineError;

use super::error::ApiError;
use super::state::AppState;

/// Most files accepted by one `/api/upload` request.
pub(crate) const MAX_FILES: usize = 10;

/// Per-file size limit: 10 MB.
pub(crate) const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Multipart field carrying `/api/upload` files.
pub(crate) const UPLOAD_FIELD: &str = "files";

/// Multipart field carrying the `/api/import-materials-csv` file.
pub(crate) const IMPORT_FIELD: &str = "file";

/// Substrings that mark an accepted content type or extension.
const ACCEPTED_TYPES: [&str; 4] = ["csv", "excel", "spreadsheetml", "pdf"];

/// Metadata returned for each stored file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct UploadedFile {
    /// Generated name on disk.
    pub(crate) filename: String,
    /// Name the client sent.
    pub(crate) originalname: String,
    pub(crate) mimetype: String,
    pub(crate) size: usize,
    pub(crate) path: String,
}

/// Writes uploads under one directory with collision-resistant names.
#[derive(Debug, Clone)]
pub(crate) struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    pub(crate) async fn save(
        &self,
        field: &str,
        original_name: &str,
        mimetype: &str,
        data: &[u8],
    ) -> std::io::Result<UploadedFile> {
        let filename = generate_filename(field, original_name);
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, data).await?;
        tracing::info!(
            file = %filename,
            original = %original_name,
            bytes = data.len(),
            "upload stored"
        );
        Ok(UploadedFile {
            filename,
            originalname: original_name.to_string(),
            mimetype: mimetype.to_string(),
            size: data.len(),
            path: path.display().to_string(),
        })
    }

    /// Best-effort removal of files from a failed request.
    pub(crate) async fn discard(&self, files: &[UploadedFile]) {
        for file in files {
            if let Err(err) = tokio::fs::remove_file(self.dir.join(&file.filename)).await {
                tracing::warn!(file = %file.filename, error = %err, "failed to remove partial upload");
            }
        }
    }
}

/// `<field>-<unix millis>-<random><.ext>`, keeping the original extension.
fn generate_filename(field: &str, original_name: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{field}-{millis}-{suffix}{ext}")
}

/// Accept CSV, Excel, and PDF files by content type or extension.
pub(crate) fn is_accepted_type(mimetype: &str, original_name: &str) -> bool {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    ACCEPTED_TYPES
        .iter()
        .any(|marker| mimetype.contains(marker) || ext.contains(marker))
}

async fn read_limited(mut field: Field<'_>, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if data.len() + chunk.len() > limit {
            return Err(ApiError::bad_request("File too large")
                .with_error(format!("files are limited to {limit} bytes")));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn receive_files(
    uploads: &UploadStore,
    multipart: &mut Multipart,
    saved: &mut Vec<UploadedFile>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        // Plain form values are ignored; only file parts count.
        let Some(original) = field.file_name().map(str::to_string) else {
            continue;
        };
        if field.name() != Some(UPLOAD_FIELD) {
            return Err(ApiError::bad_request("Unexpected field")
                .with_error(format!("files must be sent in the '{UPLOAD_FIELD}' field")));
        }
        if saved.len() == MAX_FILES {
            return Err(ApiError::bad_request("Too many files")
                .with_error(format!("at most {MAX_FILES} files per upload")));
        }
        let mimetype = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !is_accepted_type(&mimetype, &original) {
            return Err(ApiError::bad_request(
                "Only CSV, Excel, and PDF files are allowed!",
            )
            .with_error(format!("'{original}' has type {mimetype}")));
        }

        let data = read_limited(field, MAX_FILE_SIZE).await?;
        let file = uploads
            .save(UPLOAD_FIELD, &original, &mimetype, &data)
            .await
            .map_err(|err| ApiError::internal("Error uploading files", err))?;
        saved.push(file);
    }
    Ok(())
}

/// POST /api/upload
pub(crate) async fn handle_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut saved = Vec::new();
    if let Err(err) = receive_files(&state.uploads, &mut multipart, &mut saved).await {
        state.uploads.discard(&saved).await;
        return Err(err);
    }
    if saved.is_empty() {
        return Err(ApiError::bad_request("No files were uploaded."));
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Files uploaded successfully",
        "files": saved,
    })))
}

/// POST /api/import-materials-csv
pub(crate) async fn handle_import_csv(
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMPORT_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        ensure_csv_upload(&file_name, content_type.as_deref()).map_err(EngineError::from)?;
        upload = Some((file_name, read_limited(field, MAX_FILE_SIZE).await?));
        break;
    }
    let (file_name, data) = upload.ok_or_else(|| ApiError::bad_request("No file was uploaded."))?;

    let import = import_materials(data.as_slice()).map_err(EngineError::from)?;
    tracing::info!(
        file = %file_name,
        materials = import.materials.len(),
        certification = %import.certification,
        "csv imported"
    );
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "CSV imported successfully",
        "materials": import.materials,
        "certification": import.certification,
    })))
}
