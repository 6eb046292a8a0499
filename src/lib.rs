pub mod config;
pub mod error;
pub mod judge;
pub mod rooms;
pub mod session;

use std::{ops::Deref, sync::Arc, time::Duration};

use axum::{extract::FromRef, http::StatusCode, response::{Html, IntoResponse, Response}};

use crate::{error::RoomError, judge::JudgmentService, rooms::store::RoomStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn RoomStore>,
    pub judge: Arc<dyn JudgmentService>,
    /// Quiet window for each session's debounced writer.
    pub debounce: Duration,
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<RoomError>() {
            Some(RoomError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Some(RoomError::InsufficientInput { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
            return (status, format!("{}\n\n{}", self.0, self.0.backtrace())).into_response();
        }
        (status, self.0.to_string()).into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(RoomError);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);

/// Renders Markdown text as an HTML response. Raw HTML in the source is
/// escaped, not passed through.
pub struct Markdown<T>(pub T);

impl<T> IntoResponse for Markdown<T>
where
    T: Deref<Target = str>
{
    fn into_response(self) -> axum::response::Response {
        use pulldown_cmark::{Event, Parser, Options};

        let parser = Parser::new_ext(&*self.0, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH)
            .map(|event| match event {
                Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
                event => event,
            });

        let mut html_output = String::new();
        pulldown_cmark::html::push_html(&mut html_output, parser);
        Html(html_output).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::record::Role;

    #[test]
    fn room_errors_map_to_statuses() {
        let status = |err: RoomError| AppError::from(err).into_response().status();

        assert_eq!(status(RoomError::not_found("1")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(RoomError::InsufficientInput { role: Role::Male }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(RoomError::transient("down")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn markdown_escapes_raw_html() {
        let response = Markdown("Verdict: <script>alert(1)</script> *meow*".to_owned()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();

        assert!(!body.contains("<script>"), "{body}");
        assert!(body.contains("&lt;script&gt;"), "{body}");
        assert!(body.contains("<em>meow</em>"), "{body}");
    }

    #[test]
    fn markdown_renders_html() {
        let response = Markdown("**1. Case summary**".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/html; charset=utf-8"
        );
    }
}
