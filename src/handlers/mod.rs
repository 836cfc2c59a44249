//! HTTP route table.
//!
//! Every route is served both at the root and under `/api/v1`.

pub mod config;
pub mod interview;
pub mod speech;
pub mod upload;

use crate::error::AppError;
use crate::health;
use actix_web::error::JsonPayloadError;
use actix_web::{web, HttpRequest, HttpResponse};

/// Register routes, JSON limits and the 404 fallback on an app.
pub fn configure(cfg: &mut web::ServiceConfig, max_json_bytes: usize) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(max_json_bytes)
            .error_handler(json_error),
    )
    .service(web::scope("/api/v1").configure(routes))
    .configure(routes)
    .default_service(web::to(not_found));
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/health/details", web::get().to(health::health_details))
        .route("/metrics", web::get().to(health::detailed_metrics))
        .route("/config", web::get().to(config::get_config))
        .route("/config", web::put().to(config::update_config))
        .route("/stt", web::post().to(speech::speech_to_text))
        .route("/stt/microphone", web::post().to(speech::microphone_removed))
        .route("/tts", web::post().to(speech::text_to_speech))
        .route("/tts/speak", web::post().to(speech::playback_removed))
        .route("/interview", web::post().to(interview::evaluate_answer))
        .route("/interview/audio", web::post().to(interview::evaluate_audio_answer));
}

/// Turn JSON extractor failures into the structured error body.
fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    let app_err = match err {
        JsonPayloadError::OverflowKnownLength { length, limit } => AppError::PayloadTooLarge(
            format!("JSON body of {} bytes exceeds the {} byte limit", length, limit),
        ),
        JsonPayloadError::Overflow { limit } => {
            AppError::PayloadTooLarge(format!("JSON body exceeds the {} byte limit", limit))
        }
        _ if is_legacy_tts(req) => AppError::ValidationError(
            "POST /tts no longer reads the 'text' query parameter; send a JSON body \
             {\"text\": \"...\"} with Content-Type: application/json"
                .to_string(),
        ),
        JsonPayloadError::ContentType => AppError::ValidationError(
            "expected a JSON body with Content-Type: application/json".to_string(),
        ),
        other => AppError::ValidationError(format!("invalid JSON body: {}", other)),
    };
    app_err.into()
}

fn is_legacy_tts(req: &HttpRequest) -> bool {
    req.path().ends_with("/tts")
        && req
            .query_string()
            .split('&')
            .any(|pair| pair == "text" || pair.starts_with("text="))
}

async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound(format!(
        "no route for {} {}",
        req.method(),
        req.path()
    )))
}

#[cfg(test)]
mod tests {
    use crate::testing::{test_app, test_state};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_health_body_is_exact() {
        let app = test_app!(test_state());
        for uri in ["/health", "/api/v1/health"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body, json!({"status": "ok"}));
        }
    }

    #[actix_web::test]
    async fn test_unknown_route_is_structured_404() {
        let app = test_app!(test_state());
        let req = test::TestRequest::get().uri("/nope").to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "not_found");
    }

    #[actix_web::test]
    async fn test_oversized_json_is_413() {
        let app = test_app!(test_state());
        let text = "a".repeat(300 * 1024);
        let req = test::TestRequest::post()
            .uri("/interview")
            .set_json(json!({"candidateText": text}))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_metrics_count_requests_per_route() {
        let app = test_app!(test_state());
        for _ in 0..2 {
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        }

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["overall"]["total_requests"].as_u64().unwrap() >= 3);

        let health = body["endpoints"]
            .as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["endpoint"] == "GET /health")
            .cloned()
            .unwrap();
        assert_eq!(health["request_count"], 2);
    }

    #[actix_web::test]
    async fn test_health_details_reports_engines() {
        let app = test_app!(test_state());
        let req = test::TestRequest::get().uri("/health/details").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["engines"]["recognizer"]["provider"], "fake");
        assert_eq!(body["engines"]["synthesizer"]["provider"], "fake");
    }
}
