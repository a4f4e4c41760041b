use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ContactUpdate, SessionKey};
use super::engine::SessionView;
use super::repository::SessionRepository;
use super::service::QuizService;
use super::session::QuizError;

/// Body of `POST .../answers`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub question_id: String,
    pub value: String,
}

/// Router builder exposing the quiz flow over JSON endpoints.
pub fn quiz_router<R>(service: Arc<QuizService<R>>) -> Router
where
    R: SessionRepository + 'static,
{
    Router::new()
        .route("/api/v1/quiz/questions", get(questions_handler::<R>))
        .route(
            "/api/v1/quiz/sessions/:session_key",
            get(view_handler::<R>).delete(reset_handler::<R>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_key/next",
            post(next_handler::<R>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_key/back",
            post(back_handler::<R>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_key/answers",
            post(answer_handler::<R>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_key/contact",
            post(contact_handler::<R>),
        )
        .route(
            "/api/v1/quiz/sessions/:session_key/submit",
            post(submit_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn questions_handler<R>(State(service): State<Arc<QuizService<R>>>) -> Response
where
    R: SessionRepository + 'static,
{
    let catalog = service.catalog();
    let payload = json!({
        "total_steps": catalog.total_steps(),
        "questions": catalog.questions(),
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn view_handler<R>(
    State(service): State<Arc<QuizService<R>>>,
    Path(session_key): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    let key = match parse_key(&session_key) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let engine = service.open(key);
    view_response(StatusCode::OK, engine.view())
}

pub(crate) async fn reset_handler<R>(
    State(service): State<Arc<QuizService<R>>>,
    Path(session_key): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    let key = match parse_key(&session_key) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let mut engine = service.open(key);
    let outcome = engine.reset().map(|_| ());
    match outcome {
        Ok(()) => view_response(StatusCode::OK, engine.view()),
        Err(err) => error_response(err, engine.view()),
    }
}

pub(crate) async fn next_handler<R>(
    State(service): State<Arc<QuizService<R>>>,
    Path(session_key): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    let key = match parse_key(&session_key) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let mut engine = service.open(key);
    let outcome = engine.next().map(|_| ());
    match outcome {
        Ok(()) => view_response(StatusCode::OK, engine.view()),
        Err(err) => error_response(err, engine.view()),
    }
}

pub(crate) async fn back_handler<R>(
    State(service): State<Arc<QuizService<R>>>,
    Path(session_key): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    let key = match parse_key(&session_key) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let mut engine = service.open(key);
    let outcome = engine.back().map(|_| ());
    match outcome {
        Ok(()) => view_response(StatusCode::OK, engine.view()),
        Err(err) => error_response(err, engine.view()),
    }
}

pub(crate) async fn answer_handler<R>(
    State(service): State<Arc<QuizService<R>>>,
    Path(session_key): Path<String>,
    axum::Json(request): axum::Json<AnswerRequest>,
) -> Response
where
    R: SessionRepository + 'static,
{
    let key = match parse_key(&session_key) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let mut engine = service.open(key);
    match engine.set_answer(&request.question_id, &request.value) {
        Ok(()) => view_response(StatusCode::OK, engine.view()),
        Err(err) => error_response(err, engine.view()),
    }
}

pub(crate) async fn contact_handler<R>(
    State(service): State<Arc<QuizService<R>>>,
    Path(session_key): Path<String>,
    axum::Json(update): axum::Json<ContactUpdate>,
) -> Response
where
    R: SessionRepository + 'static,
{
    let key = match parse_key(&session_key) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let mut engine = service.open(key);
    match engine.update_contact(update) {
        Ok(()) => view_response(StatusCode::OK, engine.view()),
        Err(err) => error_response(err, engine.view()),
    }
}

/// The raw query string of the submit request is forwarded as the lead's attribution.
pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<QuizService<R>>>,
    Path(session_key): Path<String>,
    RawQuery(attribution): RawQuery,
) -> Response
where
    R: SessionRepository + 'static,
{
    let key = match parse_key(&session_key) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let mut engine = service.open(key);
    match engine.submit(attribution.as_deref()).await {
        Ok(outcome) => {
            let payload = json!({
                "redirect_to": outcome.redirect_to,
                "score": outcome.score,
                "receipt": outcome.receipt,
                "session": engine.view(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err, engine.view()),
    }
}

fn parse_key(raw: &str) -> Result<SessionKey, Response> {
    SessionKey::parse(raw).map_err(|err| {
        let payload = json!({
            "error": err.to_string(),
        });
        (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
    })
}

fn view_response(status: StatusCode, view: SessionView) -> Response {
    (status, axum::Json(view)).into_response()
}

pub(crate) fn error_status(err: &QuizError) -> StatusCode {
    match err {
        QuizError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QuizError::Submission(_) => StatusCode::BAD_GATEWAY,
        QuizError::UnknownQuestion(_) | QuizError::UnknownOption { .. } => StatusCode::BAD_REQUEST,
        QuizError::InvalidTransition { .. }
        | QuizError::QuestionNotActive { .. }
        | QuizError::SubmissionInProgress => StatusCode::CONFLICT,
    }
}

fn error_response(err: QuizError, view: SessionView) -> Response {
    let status = error_status(&err);
    let payload = match &err {
        QuizError::Validation(validation) => json!({
            "error": err.to_string(),
            "missing": validation.missing,
            "consent_required": validation.consent_required,
            "session": view,
        }),
        QuizError::Submission(_) => json!({
            "error": err.to_string(),
            "retryable": true,
            "session": view,
        }),
        _ => json!({
            "error": err.to_string(),
            "session": view,
        }),
    };
    (status, axum::Json(payload)).into_response()
}
