//! Request middleware: resolve the principal, gate login-only routes.

use super::cookies::{read_cookie, SESSION_COOKIE};
use super::AppState;
use crate::auth::{Principal, User};
use crate::error::BlogError;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::Uri;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Attach the request's `Principal` as an extension. Unknown or expired
/// tokens resolve to `Anonymous`.
pub async fn load_principal(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = read_cookie(req.headers(), SESSION_COOKIE).map(str::to_owned);
    let principal = match state.sessions.current_principal(token.as_deref()) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    req.extensions_mut().insert(principal);
    next.run(req).await
}

/// Reject anonymous visitors with a redirect to the login page that
/// remembers where they were going. Must run after `load_principal`.
pub async fn require_login(req: Request, next: Next) -> Response {
    let authenticated = req
        .extensions()
        .get::<Principal>()
        .is_some_and(Principal::is_authenticated);
    if !authenticated {
        return BlogError::AuthenticationRequired {
            next: request_target(req.uri()),
        }
        .into_response();
    }
    next.run(req).await
}

/// Path plus query string, as the visitor requested it.
pub fn request_target(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string())
}

/// Extracts the current principal; `Anonymous` when the middleware did
/// not run.
pub struct CurrentPrincipal(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts.extensions.get::<Principal>().cloned().unwrap_or_default(),
        ))
    }
}

/// Extracts the logged-in user or fails with `AuthenticationRequired`.
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = BlogError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(Principal::User(user)) => Ok(Self(user.clone())),
            _ => Err(BlogError::AuthenticationRequired {
                next: request_target(&parts.uri),
            }),
        }
    }
}
