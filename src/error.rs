//! Error taxonomy for the blog and its HTTP mapping.
//!
//! Every variant is surfaced to the visitor either as a flash message on a
//! redirect or as an HTTP status page. None are retried and none stop the
//! server.

use crate::gateway::{flash, pages};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use std::fmt;
use thiserror::Error;

/// Which unique credential collided during registration or profile update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Username,
    Email,
}

impl CredentialField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BlogError {
    /// Username or email already belongs to another account. HTTP 409.
    #[error("That {field} is taken. Please choose a different one.")]
    DuplicateCredential { field: CredentialField },

    /// Login failed. Deliberately does not say which field was wrong.
    #[error("Email or Password is Wrong")]
    InvalidCredential,

    /// Anonymous visitor hit a login-only route. Redirects to the login page.
    #[error("Please log in to access this page.")]
    AuthenticationRequired { next: String },

    /// Authenticated, but not the owner. HTTP 403.
    #[error("You do not have permission to modify this post.")]
    Forbidden,

    /// Missing user or post. HTTP 404.
    #[error("{0} not found")]
    NotFound(String),

    /// Request data failed boundary validation. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Uploaded avatar could not be decoded or has a disallowed type. HTTP 400.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// SQLite failure. HTTP 500.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Anything else unexpected. HTTP 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type BlogResult<T> = Result<T, BlogError>;

impl BlogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DuplicateCredential { .. } => StatusCode::CONFLICT,
            Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::AuthenticationRequired { .. } => StatusCode::SEE_OTHER,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::AuthenticationRequired { next } = &self {
            let location = format!("/login?next={}", urlencoding::encode(next));
            return flash::redirect_with(&location, flash::Level::Info, &self.to_string());
        }

        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Something went wrong on our end. Please try again later.".to_string()
        } else {
            self.to_string()
        };
        (status, Html(pages::render_error_page(status, &detail))).into_response()
    }
}
