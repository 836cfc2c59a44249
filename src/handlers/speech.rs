use super::upload::read_upload;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

/// `POST /stt`: multipart WAV upload in, transcript out.
pub async fn speech_to_text(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let options = state.pipeline_options();
    let max_upload_bytes = state.get_config().limits.max_upload_bytes;

    let mut form = read_upload(&req, payload, max_upload_bytes).await?;
    let audio = form.require_audio()?;

    let result = state.orchestrator.speech_to_text(&audio, &options).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// `POST /tts`: JSON `{"text", "voice"?}` in, base64 WAV out.
pub async fn text_to_speech(
    state: web::Data<AppState>,
    body: web::Json<SpeakRequest>,
) -> AppResult<HttpResponse> {
    let options = state.pipeline_options();
    let SpeakRequest { text, voice } = body.into_inner();

    let result = state.orchestrator.text_to_speech(&text, voice, &options).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn microphone_removed() -> AppResult<HttpResponse> {
    Err(AppError::Deprecated(
        "live microphone capture is no longer supported; upload a WAV recording to POST /stt \
         as multipart field 'file'"
            .to_string(),
    ))
}

pub async fn playback_removed() -> AppResult<HttpResponse> {
    Err(AppError::Deprecated(
        "server-side playback is no longer supported; POST /tts with a JSON body \
         {\"text\": \"...\"} returns the audio as base64 WAV"
            .to_string(),
    ))
}
