use std::borrow::Cow;

use log::warn;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{response, Request};
use serde::Serialize;

use builder::{MaterializeError, PathError, RecordError};
use telemetry::IsErr;

use crate::client::TransportError;
use crate::expression::ParseError;
use crate::session::SessionError;

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    InvalidRequest(String),
    Incomplete(MaterializeError),
    TooManySessions,
    Conflict,
    Upstream(TransportError),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound => ApiError::NotFound,
            SessionError::Full(_) => ApiError::TooManySessions,
            SessionError::Busy => ApiError::Conflict,
            SessionError::Incomplete(e) => ApiError::Incomplete(e),
            SessionError::InvalidRecord(e) => ApiError::InvalidRequest(e.to_string()),
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        ApiError::InvalidRequest(e.0)
    }
}

impl From<PathError> for ApiError {
    fn from(e: PathError) -> Self {
        ApiError::InvalidRequest(e.to_string())
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        ApiError::InvalidRequest(e.to_string())
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        ApiError::Upstream(e)
    }
}

impl IsErr for ApiError {
    fn is_err(&self) -> bool {
        matches!(self, ApiError::Upstream(_) | ApiError::TooManySessions)
    }
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    message: Cow<'a, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl<'a> ErrorResponse<'a> {
    fn message(message: Cow<'a, str>) -> Self {
        ErrorResponse {
            message,
            path: None,
            field: None,
        }
    }
}

impl<'r> response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let (body, status) = match self {
            ApiError::Upstream(e) => {
                warn!("Submission failed: {}", e);
                (
                    ErrorResponse::message(Cow::Owned(e.to_string())),
                    Status::BadGateway,
                )
            }
            ApiError::NotFound => (
                ErrorResponse::message(Cow::Borrowed("Not Found")),
                Status::NotFound,
            ),
            ApiError::TooManySessions => (
                ErrorResponse::message(Cow::Borrowed("Too Many Sessions")),
                Status::ServiceUnavailable,
            ),
            ApiError::Conflict => (
                ErrorResponse::message(Cow::Borrowed("Submission already in progress")),
                Status::Conflict,
            ),
            ApiError::InvalidRequest(e) => {
                (ErrorResponse::message(Cow::Owned(e)), Status::BadRequest)
            }
            ApiError::Incomplete(e) => (
                ErrorResponse {
                    message: Cow::Owned(e.to_string()),
                    path: Some(e.path().to_string()),
                    field: e.field().map(|field| field.to_string()),
                },
                Status::UnprocessableEntity,
            ),
        };
        response::status::Custom(status, Json(body)).respond_to(req)
    }
}
