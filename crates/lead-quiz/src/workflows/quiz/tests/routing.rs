use super::common::*;
use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::quiz::router::{back_handler, error_status, reset_handler, submit_handler};
use crate::workflows::quiz::{MemorySessionRepository, QuizError, SubmissionError};

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn questions_route_lists_the_catalog() {
    let (service, _) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    let router = quiz_router_with_service(service);

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/quiz/questions"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total_steps"], json!(7));
    assert_eq!(payload["questions"][3]["id"], json!("smile_goals"));
    assert_eq!(payload["questions"][3]["kind"], json!("multi-choice"));
}

#[tokio::test]
async fn session_view_starts_on_the_first_question() {
    let (service, _) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    let router = quiz_router_with_service(service);

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/quiz/sessions/tab-1"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["session_key"], json!("tab-1"));
    assert_eq!(payload["stage"]["status"], json!("answering"));
    assert_eq!(payload["step"], json!(0));
    assert_eq!(payload["current_question"]["id"], json!("visit_reason"));
    assert_eq!(payload["submitting"], json!(false));
    assert!(payload.get("error").is_none());
}

#[tokio::test]
async fn malformed_session_keys_are_bad_requests() {
    let (service, _) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    let router = quiz_router_with_service(service);

    let response = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/quiz/sessions/tab%20one",
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn answers_update_the_live_score() {
    let (service, _) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    let router = quiz_router_with_service(service);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quiz/sessions/tab-1/answers",
            json!({ "question_id": "visit_reason", "value": "pain" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["answers"]["visit_reason"], json!("pain"));
    assert_eq!(payload["score"]["raw_score"], json!(4));

    let response = router
        .oneshot(empty_request(
            Method::POST,
            "/api/v1/quiz/sessions/tab-1/next",
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["step"], json!(1));
    assert_eq!(payload["current_question"]["id"], json!("start_timeline"));
}

#[tokio::test]
async fn answers_for_other_steps_conflict_and_unknown_options_are_bad_requests() {
    let (service, _) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    let router = quiz_router_with_service(service);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quiz/sessions/tab-1/answers",
            json!({ "question_id": "dental_anxiety", "value": "relaxed" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quiz/sessions/tab-1/answers",
            json!({ "question_id": "visit_reason", "value": "teleportation" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("teleportation"));
}

#[tokio::test]
async fn contact_updates_before_the_contact_step_conflict() {
    let (service, _) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    let router = quiz_router_with_service(service);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/quiz/sessions/tab-1/contact",
            json!({ "field": "name", "value": "Ada" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_with_missing_contact_details_is_unprocessable() {
    let (service, _) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    let service = Arc::new(service);
    {
        let mut engine = service.open(tab("tab-1"));
        answer_scenario(&mut engine);
    }

    let response = submit_handler::<MemorySessionRepository>(
        State(service),
        Path("tab-1".to_string()),
        RawQuery(None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["consent_required"], json!(true));
    assert_eq!(
        payload["missing"],
        json!(["name", "email", "phone", "postcode"])
    );
    assert_eq!(payload["session"]["stage"]["status"], json!("contact_capture"));
}

#[tokio::test]
async fn submit_route_forwards_the_query_string_as_attribution() {
    let submitter = Arc::new(RecordingSubmitter::default());
    let (service, _) = build_service(Arc::new(RecordingEnricher::scoring(2)), submitter.clone());
    let service = Arc::new(service);
    {
        let mut engine = service.open(tab("tab-1"));
        answer_scenario(&mut engine);
        fill_contact(&mut engine);
    }
    let router = crate::workflows::quiz::quiz_router(service);

    let response = router
        .oneshot(empty_request(
            Method::POST,
            "/api/v1/quiz/sessions/tab-1/submit?utm_source=newsletter&gclid=abc",
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["redirect_to"], json!("/thank-you"));
    assert_eq!(payload["score"]["final_score"], json!(14));
    assert_eq!(payload["score"]["tier"], json!("Warm"));
    assert_eq!(payload["session"]["stage"]["status"], json!("submitted"));
    assert_eq!(
        submitter.leads()[0].attribution,
        "utm_source=newsletter&gclid=abc"
    );
}

#[tokio::test]
async fn failed_submissions_are_retryable_bad_gateways() {
    let (service, _) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::failing(1)),
    );
    let service = Arc::new(service);
    {
        let mut engine = service.open(tab("tab-1"));
        answer_scenario(&mut engine);
        fill_contact(&mut engine);
    }

    let response = submit_handler::<MemorySessionRepository>(
        State(service),
        Path("tab-1".to_string()),
        RawQuery(None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["retryable"], json!(true));
    assert_eq!(payload["session"]["stage"]["status"], json!("failed"));
    assert_eq!(payload["session"]["contact"]["name"], json!("Ada Lovelace"));
}

#[tokio::test]
async fn delete_resets_the_session() {
    let (service, repository) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    {
        let mut engine = service.open(tab("tab-1"));
        engine
            .set_answer("visit_reason", "pain")
            .expect("answer accepted");
    }
    let router = quiz_router_with_service(service);

    let response = router
        .oneshot(empty_request(Method::DELETE, "/api/v1/quiz/sessions/tab-1"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["score"]["raw_score"], json!(0));
    assert!(repository.is_empty());
}

#[tokio::test]
async fn navigation_and_reset_conflict_while_a_handoff_is_in_flight() {
    let (service, repository) = build_service(
        Arc::new(RecordingEnricher::scoring(0)),
        Arc::new(RecordingSubmitter::default()),
    );
    let service = Arc::new(service);
    let key = tab("tab-1");
    {
        let mut engine = service.open(key.clone());
        answer_scenario(&mut engine);
        fill_contact(&mut engine);
    }
    let claim = service.claim_submission(&key).expect("claim");

    let response = back_handler::<MemorySessionRepository>(
        State(service.clone()),
        Path("tab-1".to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["session"]["submitting"], json!(true));

    let response = reset_handler::<MemorySessionRepository>(
        State(service.clone()),
        Path("tab-1".to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(!repository.is_empty());

    drop(claim);
    let response =
        reset_handler::<MemorySessionRepository>(State(service), Path("tab-1".to_string())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(repository.is_empty());
}

#[test]
fn submission_in_progress_maps_to_conflict() {
    assert_eq!(
        error_status(&QuizError::SubmissionInProgress),
        StatusCode::CONFLICT
    );
    assert_eq!(
        error_status(&QuizError::Submission(SubmissionError::Unavailable(
            "offline".to_string()
        ))),
        StatusCode::BAD_GATEWAY
    );
}
