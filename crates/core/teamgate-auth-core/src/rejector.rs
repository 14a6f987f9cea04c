use axum::response::{IntoResponse, Response};
use http::StatusCode;

/// Produces the responses sent when authorization fails.
pub trait Rejector: Send + Sync {
    fn unauthorized(&self) -> Response;
    fn forbidden(&self) -> Response;
}

/// Plain-text rejections that reveal nothing about the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRejector;

impl Rejector for DefaultRejector {
    fn unauthorized(&self) -> Response {
        (StatusCode::UNAUTHORIZED, "not authorized\n").into_response()
    }

    fn forbidden(&self) -> Response {
        (StatusCode::FORBIDDEN, "forbidden\n").into_response()
    }
}
