//! Registration, login/logout and the account page.

use super::cookies::{self, SESSION_COOKIE};
use super::flash::{self, Flash, Flashes, Level};
use super::forms::{safe_next, FieldErrors, LoginForm, RegistrationForm, UpdateAccountForm};
use super::middleware::{CurrentPrincipal, CurrentUser};
use super::{pages, render_page, AppState};
use crate::auth::{Principal, User};
use crate::error::{BlogError, BlogResult};
use axum::extract::{Multipart, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// ── Registration ──────────────────────────────────────────────────────

/// GET /register
pub async fn register_page(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
) -> Response {
    if principal.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    if !state.settings.allow_registration {
        return flash::redirect_with("/", Level::Info, "Registration is currently closed.");
    }
    let body = pages::register_form(&RegistrationForm::default(), &FieldErrors::default());
    render_page(&state, &principal, &flashes, Some("Register"), &body)
}

/// POST /register
pub async fn register_submit(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
    Form(form): Form<RegistrationForm>,
) -> BlogResult<Response> {
    if principal.is_authenticated() {
        return Ok(Redirect::to("/").into_response());
    }
    if !state.settings.allow_registration {
        return Ok(flash::redirect_with(
            "/",
            Level::Info,
            "Registration is currently closed.",
        ));
    }

    let mut errors = form.validate();
    if errors.is_empty() {
        match state.users.register(&form.username, &form.email, &form.password) {
            Ok(user) => {
                return Ok(flash::redirect_with(
                    "/login",
                    Level::Success,
                    &format!("Account created for {}!", user.username),
                ));
            }
            Err(e @ BlogError::DuplicateCredential { field }) => {
                errors.add(field.as_str(), e.to_string());
            }
            Err(e) => return Err(e),
        }
    }

    let body = pages::register_form(&form, &errors);
    Ok(render_page(&state, &principal, &flashes, Some("Register"), &body))
}

// ── Login / logout ────────────────────────────────────────────────────

/// GET /login
pub async fn login_page(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
    Query(query): Query<NextQuery>,
) -> Response {
    if principal.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    let body = pages::login_form(
        &LoginForm::default(),
        &FieldErrors::default(),
        safe_next(query.next.as_deref()),
    );
    render_page(&state, &principal, &flashes, Some("Login"), &body)
}

/// POST /login
///
/// On success, starts a session and redirects to `next` (if it is a local
/// path) or home. On a bad password the form is shown again.
pub async fn login_submit(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    mut flashes: Flashes,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> BlogResult<Response> {
    if principal.is_authenticated() {
        return Ok(Redirect::to("/").into_response());
    }
    let next = safe_next(query.next.as_deref());

    let errors = form.validate();
    if errors.is_empty() {
        if let Some(user) = state.users.verify(&form.email, &form.password)? {
            let ticket = state.sessions.login(&user, form.remember())?;
            let welcome = [Flash::new(Level::Success, format!("Welcome {}!", user.email))];
            return Ok((
                AppendHeaders([
                    (
                        SET_COOKIE,
                        cookies::session_cookie(&ticket, state.settings.secure_cookies),
                    ),
                    (SET_COOKIE, flash::set_cookie(&welcome)),
                ]),
                Redirect::to(next.unwrap_or("/")),
            )
                .into_response());
        }
        flashes.push(Level::Danger, BlogError::InvalidCredential.to_string());
    }

    let body = pages::login_form(&form, &errors, next);
    Ok(render_page(&state, &principal, &flashes, Some("Login"), &body))
}

/// GET|POST /logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> BlogResult<Response> {
    if let Some(token) = cookies::read_cookie(&headers, SESSION_COOKIE) {
        state.sessions.logout(token)?;
    }
    let bye = [Flash::new(Level::Danger, "Logout successful")];
    Ok((
        AppendHeaders([
            (
                SET_COOKIE,
                cookies::expired_cookie(SESSION_COOKIE, state.settings.secure_cookies),
            ),
            (SET_COOKIE, flash::set_cookie(&bye)),
        ]),
        Redirect::to("/"),
    )
        .into_response())
}

// ── Account ───────────────────────────────────────────────────────────

fn account_view(
    state: &AppState,
    user: &User,
    flashes: &Flashes,
    form: &UpdateAccountForm,
    errors: &FieldErrors,
) -> Response {
    let principal = Principal::User(user.clone());
    let body = pages::account_form(user, form, errors);
    render_page(state, &principal, flashes, Some("Account"), &body)
}

/// GET /account
pub async fn account_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flashes: Flashes,
) -> Response {
    let form = UpdateAccountForm {
        username: user.username.clone(),
        email: user.email.clone(),
        picture: None,
    };
    account_view(&state, &user, &flashes, &form, &FieldErrors::default())
}

/// POST /account (multipart: username, email, optional picture)
///
/// Credentials are checked before the picture is stored. Changing the
/// email signs out every other session of the account.
pub async fn account_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flashes: Flashes,
    headers: HeaderMap,
    multipart: Multipart,
) -> BlogResult<Response> {
    let mut form = UpdateAccountForm::from_multipart(multipart).await?;
    let mut errors = form.validate();
    if errors.is_empty() {
        if let Err(e) = state
            .users
            .ensure_available(&form.username, &form.email, Some(user.id))
        {
            let BlogError::DuplicateCredential { field } = e else {
                return Err(e);
            };
            errors.add(field.as_str(), e.to_string());
        }
    }
    if !errors.is_empty() {
        return Ok(account_view(&state, &user, &flashes, &form, &errors));
    }

    let image_file = match form.picture.take() {
        Some(upload) => {
            let avatars = state.avatars.clone();
            let saved = tokio::task::spawn_blocking(move || {
                avatars.save(&upload.filename, &upload.bytes)
            })
            .await
            .map_err(|e| anyhow::anyhow!("avatar task failed: {e}"))?;
            match saved {
                Ok(name) => Some(name),
                Err(BlogError::InvalidImage(msg)) => {
                    errors.add("picture", msg);
                    return Ok(account_view(&state, &user, &flashes, &form, &errors));
                }
                Err(e) => return Err(e),
            }
        }
        None => None,
    };

    let updated = match state.users.update_account(
        user.id,
        &form.username,
        &form.email,
        image_file.as_deref(),
    ) {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(name) = &image_file {
                state.avatars.discard(name);
            }
            // Lost a race with another registration.
            if let BlogError::DuplicateCredential { field } = e {
                errors.add(field.as_str(), e.to_string());
                return Ok(account_view(&state, &user, &flashes, &form, &errors));
            }
            return Err(e);
        }
    };

    if !updated.email.eq_ignore_ascii_case(&user.email) {
        if let Some(token) = cookies::read_cookie(&headers, SESSION_COOKIE) {
            let revoked = state.sessions.revoke_others(user.id, token)?;
            tracing::info!(user_id = user.id, revoked, "Email changed, other sessions revoked");
        }
    }

    Ok(flash::redirect_with(
        "/account",
        Level::Success,
        "Information Updated",
    ))
}
