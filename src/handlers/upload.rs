//! Multipart upload reading shared by the audio endpoints.

use crate::error::{AppError, AppResult};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpRequest};
use futures_util::StreamExt;
use std::collections::BTreeMap;

/// Field names accepted for the audio file.
const AUDIO_FIELDS: &[&str] = &["file", "audio"];

const MAX_TEXT_FIELDS: usize = 16;
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// Parsed `multipart/form-data` upload.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub audio: Option<Vec<u8>>,
    /// Non-file fields as UTF-8 text
    pub fields: BTreeMap<String, String>,
}

impl UploadForm {
    pub fn require_audio(&mut self) -> AppResult<Vec<u8>> {
        self.audio.take().ok_or_else(|| {
            AppError::ValidationError(
                "multipart upload must contain the audio in a field named 'file' (or 'audio')"
                    .to_string(),
            )
        })
    }
}

/// Read a multipart upload, enforcing `max_audio_bytes` on the audio field.
///
/// The body is streamed chunk by chunk so an oversized upload is rejected as
/// soon as it crosses the limit.
pub async fn read_upload(
    req: &HttpRequest,
    payload: web::Payload,
    max_audio_bytes: usize,
) -> AppResult<UploadForm> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut form = UploadForm::default();
    let mut text_fields = 0usize;

    while let Some(item) = multipart.next().await {
        let mut field: Field = item.map_err(|e| {
            AppError::ValidationError(format!("invalid multipart upload: {}", e))
        })?;

        let (name, filename) = {
            let cd = field.content_disposition().ok_or_else(|| {
                AppError::ValidationError("multipart field without Content-Disposition".to_string())
            })?;
            (
                cd.get_name().unwrap_or_default().to_string(),
                cd.get_filename().map(str::to_string),
            )
        };

        if AUDIO_FIELDS.contains(&name.as_str()) {
            if form.audio.is_some() {
                return Err(AppError::ValidationError(
                    "upload contains more than one audio file".to_string(),
                ));
            }
            let bytes = read_field(&mut field, max_audio_bytes, "audio file").await?;
            tracing::debug!(
                field = %name,
                filename = filename.as_deref().unwrap_or("-"),
                bytes = bytes.len(),
                "Received audio upload"
            );
            form.audio = Some(bytes);
        } else {
            text_fields += 1;
            if text_fields > MAX_TEXT_FIELDS {
                return Err(AppError::ValidationError(format!(
                    "upload has more than {} form fields",
                    MAX_TEXT_FIELDS
                )));
            }
            let bytes = read_field(&mut field, MAX_TEXT_FIELD_BYTES, &name).await?;
            let text = String::from_utf8(bytes).map_err(|_| {
                AppError::ValidationError(format!("form field '{}' is not valid UTF-8", name))
            })?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}

async fn read_field(field: &mut Field, limit: usize, what: &str) -> AppResult<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            AppError::ValidationError(format!("failed to read {}: {}", what, e))
        })?;
        if data.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "{} exceeds the {} byte limit",
                what, limit
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}
