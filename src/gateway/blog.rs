//! Post listings, single posts and post mutations.

use super::flash::{self, Flashes, Level};
use super::forms::{FieldErrors, PostForm};
use super::middleware::{CurrentPrincipal, CurrentUser};
use super::{pages, render_page, AppState};
use crate::auth::{can_modify, ensure_can_modify, Principal};
use crate::error::{BlogError, BlogResult};
use crate::posts::Post;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Form;
use serde::Deserialize;

/// `?page=N`. Anything that is not a positive number means page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|&p| p > 0)
            .unwrap_or(1)
    }
}

/// Non-numeric post ids name no post.
fn parse_post_id(raw: &str) -> BlogResult<i64> {
    raw.parse()
        .map_err(|_| BlogError::NotFound(format!("post {raw}")))
}

/// Load a post for mutation: missing is 404, foreign is 403.
fn owned_post(state: &AppState, principal: &Principal, raw_id: &str) -> BlogResult<Post> {
    let post = state.posts.get(parse_post_id(raw_id)?)?;
    ensure_can_modify(principal, &post)?;
    Ok(post)
}

/// GET / and GET /home
pub async fn index(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
    Query(query): Query<PageQuery>,
) -> BlogResult<Response> {
    let page = state
        .posts
        .list(query.number(), state.settings.posts_per_page, None)?;
    let body = pages::post_list(&page, None, "/");
    Ok(render_page(&state, &principal, &flashes, None, &body))
}

/// GET /user/{username}
pub async fn user_posts(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> BlogResult<Response> {
    let user = state
        .users
        .find_by_username(&username)?
        .ok_or_else(|| BlogError::NotFound(format!("user {username}")))?;
    let page = state
        .posts
        .list(query.number(), state.settings.posts_per_page, Some(user.id))?;

    let heading = format!("Posts by {} ({})", user.username, page.total);
    let base_path = format!("/user/{}", urlencoding::encode(&user.username));
    let body = pages::post_list(&page, Some(&heading), &base_path);
    Ok(render_page(&state, &principal, &flashes, Some(&user.username), &body))
}

/// GET /about
pub async fn about(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
) -> Response {
    render_page(&state, &principal, &flashes, Some("About"), &pages::about())
}

/// GET /post/{post_id}
pub async fn show_post(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
    Path(post_id): Path<String>,
) -> BlogResult<Response> {
    let entry = state.posts.get_with_author(parse_post_id(&post_id)?)?;
    let body = pages::post_detail(&entry, can_modify(&principal, &entry.post));
    Ok(render_page(
        &state,
        &principal,
        &flashes,
        Some(&entry.post.title),
        &body,
    ))
}

/// GET /post/new
pub async fn new_post_page(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
) -> Response {
    let body = pages::post_form(
        "New Post",
        "/post/new",
        &PostForm::default(),
        &FieldErrors::default(),
    );
    render_page(&state, &principal, &flashes, Some("New Post"), &body)
}

/// POST /post/new
pub async fn new_post_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
    Form(form): Form<PostForm>,
) -> BlogResult<Response> {
    let errors = form.validate();
    if !errors.is_empty() {
        let body = pages::post_form("New Post", "/post/new", &form, &errors);
        return Ok(render_page(&state, &principal, &flashes, Some("New Post"), &body));
    }
    state
        .posts
        .create(form.title.trim(), form.content.trim(), &user)?;
    Ok(flash::redirect_with("/", Level::Success, "Post has been created"))
}

/// GET /post/update/{post_id}
pub async fn update_post_page(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
    Path(post_id): Path<String>,
) -> BlogResult<Response> {
    let post = owned_post(&state, &principal, &post_id)?;
    let form = PostForm {
        title: post.title,
        content: post.content,
    };
    let action = format!("/post/update/{}", post.id);
    let body = pages::post_form("Update Post", &action, &form, &FieldErrors::default());
    Ok(render_page(&state, &principal, &flashes, Some("Update Post"), &body))
}

/// POST /post/update/{post_id}
pub async fn update_post_submit(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    flashes: Flashes,
    Path(post_id): Path<String>,
    Form(form): Form<PostForm>,
) -> BlogResult<Response> {
    let post = owned_post(&state, &principal, &post_id)?;
    let errors = form.validate();
    if !errors.is_empty() {
        let action = format!("/post/update/{}", post.id);
        let body = pages::post_form("Update Post", &action, &form, &errors);
        return Ok(render_page(&state, &principal, &flashes, Some("Update Post"), &body));
    }
    state
        .posts
        .update(post.id, form.title.trim(), form.content.trim())?;
    Ok(flash::redirect_with(
        &format!("/post/{}", post.id),
        Level::Success,
        "Post has been updated",
    ))
}

/// POST /post/delete/{post_id}
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(post_id): Path<String>,
) -> BlogResult<Response> {
    let post = owned_post(&state, &principal, &post_id)?;
    state.posts.delete(post.id)?;
    Ok(flash::redirect_with("/", Level::Success, "Post has been deleted"))
}
