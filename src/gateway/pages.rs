//! Server-rendered HTML.
//!
//! Every page is a `format!` template around a shared layout. All user
//! supplied text goes through `escape_html` before it is interpolated.

use super::flash::Flash;
use super::forms::{FieldErrors, LoginForm, PostForm, RegistrationForm, UpdateAccountForm};
use crate::auth::{Principal, User};
use crate::avatar::AvatarStore;
use crate::posts::{Page, PostWithAuthor};
use axum::http::StatusCode;
use std::fmt::Write as _;

/// Escape text for element content and quoted attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// What the shared layout needs besides the page body.
pub struct Chrome<'a> {
    pub site_title: &'a str,
    pub principal: &'a Principal,
    pub flashes: &'a [Flash],
}

fn base_style() -> &'static str {
    r#"
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        background: #fafafa; color: #333;
    }
    a { color: #4a6cf7; text-decoration: none; }
    a:hover { text-decoration: underline; }
    nav { background: #5f788a; padding: 12px 0; }
    nav .inner { max-width: 860px; margin: 0 auto; padding: 0 16px; display: flex; gap: 16px; align-items: center; }
    nav a { color: #cbd5db; }
    nav a.brand { color: #fff; font-weight: 600; font-size: 18px; margin-right: 16px; }
    nav .spacer { flex: 1; }
    main { max-width: 860px; margin: 24px auto; padding: 0 16px; }
    .alert { padding: 10px 14px; border-radius: 8px; font-size: 14px; margin-bottom: 16px; }
    .alert-success { background: #e8f6ec; color: #1e7b3a; }
    .alert-info { background: #e8f1fb; color: #1d5c96; }
    .alert-danger { background: #fff0f0; color: #d32f2f; }
    .card { background: #fff; border: 1px solid #ddd; border-radius: 10px; padding: 20px; margin-bottom: 20px; }
    .article { display: flex; gap: 16px; }
    .avatar { width: 64px; height: 64px; border-radius: 50%; object-fit: cover; }
    .avatar-lg { width: 125px; height: 125px; border-radius: 50%; object-fit: cover; }
    .meta { font-size: 13px; color: #777; border-bottom: 1px solid #eee; padding-bottom: 6px; margin-bottom: 8px; }
    .meta a { margin-right: 8px; }
    .title { font-size: 22px; color: #444; margin-bottom: 8px; display: block; }
    .content { white-space: pre-wrap; line-height: 1.5; }
    .form-group { margin-bottom: 16px; }
    .form-group label { display: block; font-size: 14px; font-weight: 500; margin-bottom: 6px; color: #444; }
    .form-group input[type=text], .form-group input[type=email], .form-group input[type=password], .form-group textarea {
        width: 100%; padding: 10px 12px; border: 1.5px solid #ddd; border-radius: 8px; font-size: 15px;
    }
    .form-group textarea { min-height: 180px; }
    .form-group .invalid { border-color: #d32f2f; }
    .field-error { color: #d32f2f; font-size: 13px; margin-top: 4px; }
    .btn { display: inline-block; padding: 8px 16px; border: 1px solid #4a6cf7; border-radius: 8px; font-size: 14px; cursor: pointer; background: #fff; color: #4a6cf7; }
    .btn-primary { background: #4a6cf7; color: #fff; }
    .btn-danger { border-color: #d32f2f; background: #d32f2f; color: #fff; }
    .pagination { display: flex; gap: 6px; flex-wrap: wrap; margin: 16px 0; }
    .pagination .current { background: #4a6cf7; color: #fff; }
    .pagination .gap { padding: 8px 4px; }
    .small { font-size: 13px; color: #777; margin-top: 12px; }
    "#
}

fn nav(chrome: &Chrome<'_>) -> String {
    let right = match chrome.principal {
        Principal::User(_) => {
            r#"<a href="/post/new">New Post</a><a href="/account">Account</a><a href="/logout">Logout</a>"#
        }
        Principal::Anonymous => r#"<a href="/login">Login</a><a href="/register">Register</a>"#,
    };
    format!(
        r#"<nav><div class="inner">
  <a class="brand" href="/">{title}</a>
  <a href="/">Home</a><a href="/about">About</a>
  <span class="spacer"></span>
  {right}
</div></nav>"#,
        title = escape_html(chrome.site_title),
    )
}

fn flashes(items: &[Flash]) -> String {
    items
        .iter()
        .map(|f| {
            format!(
                r#"<div class="alert alert-{}">{}</div>"#,
                f.level.as_str(),
                escape_html(&f.message)
            )
        })
        .collect()
}

/// Wrap `body` in the site layout.
pub fn layout(chrome: &Chrome<'_>, page_title: Option<&str>, body: &str) -> String {
    let title = match page_title {
        Some(t) => format!("{} - {}", escape_html(chrome.site_title), escape_html(t)),
        None => escape_html(chrome.site_title),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head><body>
{nav}
<main>
{flashes}
{body}
</main>
</body></html>"#,
        style = base_style(),
        nav = nav(chrome),
        flashes = flashes(chrome.flashes),
    )
}

// ── Posts ─────────────────────────────────────────────────────────────

fn post_meta(entry: &PostWithAuthor) -> String {
    format!(
        r#"<div class="meta"><a href="/user/{user_path}">{user}</a><small>{date}</small></div>"#,
        user_path = urlencoding::encode(&entry.author_username),
        user = escape_html(&entry.author_username),
        date = entry.post.date_posted.format("%Y-%m-%d"),
    )
}

fn avatar_img(image_file: &str, class: &str) -> String {
    format!(
        r#"<img class="{class}" src="{src}" alt="">"#,
        src = escape_html(&AvatarStore::url_for(image_file)),
    )
}

fn pagination(page: &Page<PostWithAuthor>, base_path: &str) -> String {
    if page.pages() <= 1 {
        return String::new();
    }
    let mut out = String::from(r#"<div class="pagination">"#);
    for slot in page.iter_pages() {
        match slot {
            Some(n) if n == page.page => {
                let _ = write!(out, r#"<a class="btn current" href="{base_path}?page={n}">{n}</a>"#);
            }
            Some(n) => {
                let _ = write!(out, r#"<a class="btn" href="{base_path}?page={n}">{n}</a>"#);
            }
            None => out.push_str(r#"<span class="gap">…</span>"#),
        }
    }
    out.push_str("</div>");
    out
}

/// A listing of post summaries with pagination links to `base_path`.
pub fn post_list(page: &Page<PostWithAuthor>, heading: Option<&str>, base_path: &str) -> String {
    let mut body = String::new();
    if let Some(heading) = heading {
        let _ = write!(body, "<h1 class=\"title\">{}</h1>", escape_html(heading));
    }
    if page.items.is_empty() {
        body.push_str(r#"<p class="small">No posts here yet.</p>"#);
    }
    for entry in &page.items {
        let _ = write!(
            body,
            r#"<article class="card article">
  {avatar}
  <div>
    {meta}
    <a class="title" href="/post/{id}">{title}</a>
    <p class="content">{content}</p>
  </div>
</article>"#,
            avatar = avatar_img(&entry.author_image_file, "avatar"),
            meta = post_meta(entry),
            id = entry.post.id,
            title = escape_html(&entry.post.title),
            content = escape_html(&entry.post.content),
        );
    }
    body.push_str(&pagination(page, &escape_html(base_path)));
    body
}

/// One full post. Owners get update and delete controls.
pub fn post_detail(entry: &PostWithAuthor, can_edit: bool) -> String {
    let controls = if can_edit {
        format!(
            r#"<div>
  <a class="btn" href="/post/update/{id}">Update</a>
  <form method="POST" action="/post/delete/{id}" style="display:inline" onsubmit="return confirm('Delete Post?');">
    <button type="submit" class="btn btn-danger">Delete</button>
  </form>
</div>"#,
            id = entry.post.id
        )
    } else {
        String::new()
    };
    format!(
        r#"<article class="card article">
  {avatar}
  <div>
    {meta}
    {controls}
    <h2 class="title">{title}</h2>
    <p class="content">{content}</p>
  </div>
</article>"#,
        avatar = avatar_img(&entry.author_image_file, "avatar"),
        meta = post_meta(entry),
        title = escape_html(&entry.post.title),
        content = escape_html(&entry.post.content),
    )
}

pub fn about() -> String {
    r#"<div class="card"><h1>About Page</h1></div>"#.to_string()
}

// ── Forms ─────────────────────────────────────────────────────────────

fn field_errors(errors: &FieldErrors, name: &str) -> String {
    errors
        .get(name)
        .iter()
        .map(|e| format!(r#"<div class="field-error">{}</div>"#, escape_html(e)))
        .collect()
}

fn input(kind: &str, name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    let class = if errors.get(name).is_empty() { "" } else { "invalid" };
    format!(
        r#"<div class="form-group">
  <label for="{name}">{label}</label>
  <input type="{kind}" id="{name}" name="{name}" value="{value}" class="{class}">
  {errors}
</div>"#,
        value = escape_html(value),
        errors = field_errors(errors, name),
    )
}

pub fn register_form(form: &RegistrationForm, errors: &FieldErrors) -> String {
    format!(
        r#"<div class="card">
<form method="POST" action="/register">
  <h2>Join Today</h2><br>
  {username}{email}{password}{confirm}
  <button type="submit" class="btn btn-primary">Sign Up</button>
</form>
<p class="small">Already Have An Account? <a href="/login">Sign In</a></p>
</div>"#,
        username = input("text", "username", "Username", &form.username, errors),
        email = input("email", "email", "Email", &form.email, errors),
        password = input("password", "password", "Password", "", errors),
        confirm = input("password", "confirm_password", "Confirm Password", "", errors),
    )
}

/// Login form; a validated `next` is carried through the form action.
pub fn login_form(form: &LoginForm, errors: &FieldErrors, next: Option<&str>) -> String {
    let action = match next {
        Some(n) => format!("/login?next={}", urlencoding::encode(n)),
        None => "/login".to_string(),
    };
    format!(
        r#"<div class="card">
<form method="POST" action="{action}">
  <h2>Log In</h2><br>
  {email}{password}
  <div class="form-group"><label><input type="checkbox" name="remember" value="y"{checked}> Remember Me</label></div>
  <button type="submit" class="btn btn-primary">Login</button>
</form>
<p class="small">Need An Account? <a href="/register">Sign Up Now</a></p>
</div>"#,
        action = escape_html(&action),
        email = input("email", "email", "Email", &form.email, errors),
        password = input("password", "password", "Password", "", errors),
        checked = if form.remember() { " checked" } else { "" },
    )
}

pub fn account_form(user: &User, form: &UpdateAccountForm, errors: &FieldErrors) -> String {
    format!(
        r#"<div class="card">
  <div class="article">
    {avatar}
    <div><h2>{username}</h2><p class="small">{email}</p></div>
  </div>
  <br>
  <form method="POST" action="/account" enctype="multipart/form-data">
    <h3>Account Info</h3><br>
    {username_input}{email_input}
    <div class="form-group">
      <label for="picture">Update Profile Picture</label>
      <input type="file" id="picture" name="picture" accept=".jpg,.jpeg,.png">
      {picture_errors}
    </div>
    <button type="submit" class="btn btn-primary">Update</button>
  </form>
</div>"#,
        avatar = avatar_img(&user.image_file, "avatar-lg"),
        username = escape_html(&user.username),
        email = escape_html(&user.email),
        username_input = input("text", "username", "Username", &form.username, errors),
        email_input = input("email", "email", "Email", &form.email, errors),
        picture_errors = field_errors(errors, "picture"),
    )
}

/// Create/update post form posting to `action`.
pub fn post_form(legend: &str, action: &str, form: &PostForm, errors: &FieldErrors) -> String {
    let content_class = if errors.get("content").is_empty() { "" } else { "invalid" };
    format!(
        r#"<div class="card">
<form method="POST" action="{action}">
  <h2>{legend}</h2><br>
  {title}
  <div class="form-group">
    <label for="content">Content</label>
    <textarea id="content" name="content" class="{content_class}">{content}</textarea>
    {content_errors}
  </div>
  <button type="submit" class="btn btn-primary">Post</button>
</form>
</div>"#,
        action = escape_html(action),
        legend = escape_html(legend),
        title = input("text", "title", "Title", &form.title, errors),
        content = escape_html(&form.content),
        content_errors = field_errors(errors, "content"),
    )
}

// ── Errors ────────────────────────────────────────────────────────────

/// Standalone page for an error status, outside the normal layout.
pub fn render_error_page(status: StatusCode, detail: &str) -> String {
    let heading = match status {
        StatusCode::NOT_FOUND => "Oops. Page Not Found (404)",
        StatusCode::FORBIDDEN => "You don't have permission to do that (403)",
        s if s.is_server_error() => "Something went wrong (500)",
        _ => "That request could not be completed",
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>{code}</title>
<style>{style}</style>
</head><body>
<main>
<div class="card">
  <h1>{heading}</h1>
  <p class="small">{detail}</p>
  <p class="small"><a href="/">Back to home</a></p>
</div>
</main>
</body></html>"#,
        code = status.as_u16(),
        style = base_style(),
        detail = escape_html(detail),
    )
}
