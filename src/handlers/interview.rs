use super::upload::read_upload;
use crate::error::{AppError, AppResult};
use crate::evaluation::{InterviewRequest, Metadata};
use crate::middleware::CorrelationId;
use crate::orchestrator::SpokenAnswer;
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

/// `POST /interview`: score a written answer.
pub async fn evaluate_answer(
    state: web::Data<AppState>,
    request_id: CorrelationId,
    body: web::Json<InterviewRequest>,
) -> AppResult<HttpResponse> {
    let options = state.pipeline_options();
    let feedback = state
        .orchestrator
        .evaluate_answer(&body, request_id.as_str(), &options)
        .await?;
    Ok(HttpResponse::Ok().json(feedback))
}

/// `POST /interview/audio`: transcribe a recorded answer, then score it.
///
/// ## Form fields:
/// - **file** (or **audio**): the WAV recording
/// - **questionId**: optional question identifier
/// - **metadata**: optional JSON object, sent as text
/// - **speakFeedback**: optional `true`/`false`
pub async fn evaluate_audio_answer(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
    request_id: CorrelationId,
) -> AppResult<HttpResponse> {
    let options = state.pipeline_options();
    let max_upload_bytes = state.get_config().limits.max_upload_bytes;

    let mut form = read_upload(&req, payload, max_upload_bytes).await?;
    let audio = form.require_audio()?;

    let metadata = match form.fields.get("metadata") {
        Some(text) if !text.trim().is_empty() => serde_json::from_str::<Metadata>(text)
            .map_err(|e| {
                AppError::ValidationError(format!("metadata must be a JSON object: {}", e))
            })?,
        _ => Metadata::new(),
    };

    let speak_feedback = form
        .fields
        .get("speakFeedback")
        .map(|value| parse_flag(value))
        .transpose()?;

    let answer = SpokenAnswer {
        audio,
        question_id: form.fields.remove("questionId"),
        metadata,
        speak_feedback,
    };

    let feedback = state
        .orchestrator
        .evaluate_spoken_answer(answer, request_id.as_str(), &options)
        .await?;
    Ok(HttpResponse::Ok().json(feedback))
}

fn parse_flag(value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(AppError::ValidationError(format!(
            "speakFeedback must be true or false, got '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::middleware::correlation::REQUEST_ID_HEADER;
    use crate::testing::{multipart_body, sine_wav, state_with, test_app, test_state, FakeRecognizer, FakeSynthesizer};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    const ANSWER: &str = "First I measured where the time went. For example, the report query scanned \
        every row. Then I added an index and as a result the page loaded in under a second.";

    #[actix_web::test]
    async fn test_parse_flag() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag(" 0 ").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[actix_web::test]
    async fn test_interview_returns_feedback() {
        let app = test_app!(test_state());
        let req = test::TestRequest::post()
            .uri("/interview")
            .insert_header((REQUEST_ID_HEADER, "trace-7"))
            .set_json(json!({"questionId": "q1", "candidateText": ANSWER}))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-7");

        let body: Value = test::read_body_json(resp).await;
        let score = body["score"].as_u64().unwrap();
        assert!(score <= 100);
        assert!(!body["feedbackText"].as_str().unwrap().is_empty());
        assert!(body["audio_base64"].is_null());
        assert_eq!(body["requestId"], "trace-7");
    }

    #[actix_web::test]
    async fn test_interview_scores_identical_payloads_identically() {
        let app = test_app!(test_state());
        let payload = json!({
            "candidateText": ANSWER,
            "metadata": {"difficulty": "EASY", "keywords": ["index"]}
        });

        let mut scores = Vec::new();
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/v1/interview")
                .set_json(payload.clone())
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            scores.push(body["score"].clone());
        }
        assert_eq!(scores[0], scores[1]);
    }

    #[actix_web::test]
    async fn test_interview_empty_answer_is_400() {
        let app = test_app!(test_state());
        let req = test::TestRequest::post()
            .uri("/interview")
            .set_json(json!({"candidateText": ""}))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "validation_error");
    }

    #[actix_web::test]
    async fn test_interview_malformed_json_is_400() {
        let app = test_app!(test_state());
        let req = test::TestRequest::post()
            .uri("/interview")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"candidateText\": ")
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "validation_error");
    }

    #[actix_web::test]
    async fn test_interview_spoken_feedback() {
        let app = test_app!(test_state());
        let req = test::TestRequest::post()
            .uri("/interview")
            .set_json(json!({"candidateText": ANSWER, "speakFeedback": true}))
            .to_request();

        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["audio_base64"].as_str().map_or(false, |audio| !audio.is_empty()));
    }

    #[actix_web::test]
    async fn test_interview_spoken_feedback_failure_fails_request() {
        let state = state_with(
            FakeRecognizer::text("x"),
            FakeSynthesizer::failing(EngineError::Failed("vocoder crashed".into())),
        );
        let app = test_app!(state);
        let req = test::TestRequest::post()
            .uri("/interview")
            .set_json(json!({"candidateText": ANSWER, "speakFeedback": true}))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "synthesis_error");
    }

    #[actix_web::test]
    async fn test_interview_audio_pipeline() {
        let app = test_app!(test_state());
        let (content_type, body) = multipart_body(vec![
            ("file", Some("answer.wav"), sine_wav(1.0)),
            ("questionId", None, b"perf-3".to_vec()),
            ("metadata", None, br#"{"difficulty": "easy"}"#.to_vec()),
            ("speakFeedback", None, b"false".to_vec()),
        ]);
        let req = test::TestRequest::post()
            .uri("/interview/audio")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["transcription"]["text"],
            "First I profiled the service. Then I fixed the slow query."
        );
        assert!(body["score"].as_u64().unwrap() <= 100);
        assert!(body["audio_base64"].is_null());
    }

    #[actix_web::test]
    async fn test_interview_audio_rejects_bad_metadata() {
        let app = test_app!(test_state());
        let (content_type, body) = multipart_body(vec![
            ("file", Some("answer.wav"), sine_wav(1.0)),
            ("metadata", None, b"[1, 2]".to_vec()),
        ]);
        let req = test::TestRequest::post()
            .uri("/interview/audio")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
