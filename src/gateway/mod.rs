//! HTTP gateway for the blog.
//!
//! An axum router serving server-rendered pages. Every request passes
//! through `load_principal`; login-only routes add `require_login` as a
//! route layer. Handlers live in `account` (registration, login, profile)
//! and `blog` (posts and listings).

pub mod account;
pub mod blog;
pub mod cookies;
pub mod flash;
pub mod forms;
pub mod middleware;
pub mod pages;

use crate::auth::{CredentialStore, PasswordHasher, Principal, SessionManager};
use crate::avatar::AvatarStore;
use crate::config::Config;
use crate::db::Database;
use crate::error::BlogError;
use crate::posts::PostRepository;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header::SET_COOKIE, StatusCode},
    middleware as axum_middleware,
    response::{AppendHeaders, Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use flash::Flashes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Site-wide knobs handlers need at request time.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub posts_per_page: u32,
    pub allow_registration: bool,
    pub secure_cookies: bool,
}

impl SiteSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.blog.title.clone(),
            posts_per_page: config.blog.posts_per_page,
            allow_registration: config.auth.allow_registration,
            secure_cookies: config.auth.secure_cookies,
        }
    }
}

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<CredentialStore>,
    pub sessions: Arc<SessionManager>,
    pub posts: Arc<PostRepository>,
    pub avatars: Arc<AvatarStore>,
    pub settings: Arc<SiteSettings>,
}

impl AppState {
    /// Wire every store to one database handle.
    pub fn new(db: Arc<Database>, avatars: AvatarStore, config: &Config) -> Self {
        Self {
            users: Arc::new(CredentialStore::new(
                db.clone(),
                PasswordHasher::new(config.auth.password_hash_iterations),
            )),
            sessions: Arc::new(SessionManager::new(
                db.clone(),
                Duration::from_secs(config.auth.session_ttl_secs),
                Duration::from_secs(config.auth.remember_ttl_secs),
            )),
            posts: Arc::new(PostRepository::new(db)),
            avatars: Arc::new(avatars),
            settings: Arc::new(SiteSettings::from_config(config)),
        }
    }

    /// Open the configured database and static directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = config.database_path()?;
        let db = Arc::new(Database::open(&db_path)?);
        let avatars = AvatarStore::new(&config.static_dir()?);
        avatars.ensure_default()?;
        Ok(Self::new(db, avatars, config))
    }
}

/// Render `body` inside the layout. Flashes shown here are consumed, so
/// their cookie is cleared on the same response.
pub(crate) fn render_page(
    state: &AppState,
    principal: &Principal,
    flashes: &Flashes,
    page_title: Option<&str>,
    body: &str,
) -> Response {
    let html = pages::layout(
        &pages::Chrome {
            site_title: &state.settings.title,
            principal,
            flashes: &flashes.0,
        },
        page_title,
        body,
    );
    if flashes.is_empty() {
        Html(html).into_response()
    } else {
        (AppendHeaders([(SET_COOKIE, flash::clear_cookie())]), Html(html)).into_response()
    }
}

async fn not_found() -> BlogError {
    BlogError::NotFound("page".into())
}

/// Assemble the full router. `static_dir` is served under `/static`.
pub fn build_router(state: AppState, config: &Config, static_dir: &Path) -> Router {
    let protected = Router::new()
        .route(
            "/account",
            get(account::account_page).post(account::account_submit),
        )
        .route("/post/new", get(blog::new_post_page).post(blog::new_post_submit))
        .route(
            "/post/update/{post_id}",
            get(blog::update_post_page).post(blog::update_post_submit),
        )
        .route("/post/delete/{post_id}", post(blog::delete_post))
        .route_layer(axum_middleware::from_fn(middleware::require_login));

    Router::new()
        .route("/", get(blog::index))
        .route("/home", get(blog::index))
        .route("/about", get(blog::about))
        .route("/user/{username}", get(blog::user_posts))
        .route("/post/{post_id}", get(blog::show_post))
        .route(
            "/register",
            get(account::register_page).post(account::register_submit),
        )
        .route("/login", get(account::login_page).post(account::login_submit))
        .route("/logout", get(account::logout).post(account::logout))
        .merge(protected)
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_principal,
        ))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.gateway.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(config.gateway.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.gateway.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Run the blog until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let removed = state.sessions.cleanup_expired()?;
    if removed > 0 {
        tracing::info!(removed, "Purged expired sessions");
    }

    let static_dir = config.static_dir()?;
    let app = build_router(state, &config, &static_dir);

    let host = config.gateway.host.as_str();
    let port = config.gateway.port;
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    let addr = listener.local_addr()?;

    println!("📝 {} running on http://{addr}", config.blog.title);
    println!("  Static files: {}", static_dir.display());
    println!("  Press Ctrl+C to stop.\n");
    tracing::info!(%addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
    }
}
