//! End-to-end flows through the full router.

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use scribe::avatar::AvatarStore;
use scribe::config::Config;
use scribe::db::Database;
use scribe::gateway::{build_router, AppState};
use scribe::BlogError;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    _tmp: TempDir,
    router: Router,
    state: AppState,
}

fn app() -> TestApp {
    app_with(|_| {})
}

fn app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.auth.password_hash_iterations = 1_000;
    configure(&mut config);

    let db = Arc::new(Database::open_in_memory().unwrap());
    let avatars = AvatarStore::new(tmp.path());
    avatars.ensure_default().unwrap();
    let state = AppState::new(db, avatars, &config);
    let router = build_router(state.clone(), &config, tmp.path());
    TestApp {
        _tmp: tmp,
        router,
        state,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// POST /account with a multipart body from `account_form`.
    async fn post_account(&self, body: Vec<u8>, cookie: &str) -> Response<Body> {
        let req = Request::builder()
            .method("POST")
            .uri("/account")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    /// Filenames currently in the avatar directory, sorted.
    fn avatar_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.state.avatars.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Register through the store, log in over HTTP, return the cookie pair.
    async fn login_as(&self, username: &str, remember: bool) -> String {
        let email = format!("{username}@example.com");
        self.state.users.register(username, &email, "pw").unwrap();
        let mut body = format!("email={}&password=pw", urlencoding::encode(&email));
        if remember {
            body.push_str("&remember=y");
        }
        let resp = self.post_form("/login", &body, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        session_cookie(&resp).expect("login sets a session cookie")
    }
}

const BOUNDARY: &str = "XBOUNDARYX";

/// Multipart body for the account form, with an optional picture upload.
fn account_form(username: &str, email: &str, picture: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"username\"\r\n\r\n{username}\r\n\
         --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"email\"\r\n\r\n{email}\r\n"
    )
    .into_bytes();
    let (filename, bytes) = picture.unwrap_or(("", b"".as_slice()));
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"picture\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `scribe_session=<token>` from a response, if it set a live one.
fn session_cookie(resp: &Response<Body>) -> Option<String> {
    set_cookies(resp).into_iter().find_map(|c| {
        let pair = c.split(';').next()?.to_string();
        (pair.starts_with("scribe_session=") && pair.len() > "scribe_session=".len())
            .then_some(pair)
    })
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

async fn body_text(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ── Registration & login ─────────────────────────────────────────────

#[tokio::test]
async fn register_then_login_reaches_account() {
    let app = app();
    let resp = app
        .post_form(
            "/register",
            "username=corey&email=corey%40example.com&password=pw&confirm_password=pw",
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = app
        .post_form("/login", "email=corey%40example.com&password=pw", None)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    let cookie = session_cookie(&resp).unwrap();

    let resp = app.get("/account", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("corey@example.com"));
    assert!(html.contains(r#"href="/logout""#));
}

#[tokio::test]
async fn duplicate_email_is_rejected_on_second_registration() {
    let app = app();
    let first = app
        .post_form(
            "/register",
            "username=one&email=same%40example.com&password=pw&confirm_password=pw",
            None,
        )
        .await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let second = app
        .post_form(
            "/register",
            "username=two&email=same%40example.com&password=pw&confirm_password=pw",
            None,
        )
        .await;
    assert_eq!(second.status(), StatusCode::OK);
    assert!(body_text(second).await.contains("That email is taken"));
    assert_eq!(app.state.users.user_count().unwrap(), 1);
}

#[tokio::test]
async fn invalid_registration_rerenders_with_field_errors() {
    let app = app();
    let resp = app
        .post_form(
            "/register",
            "username=x&email=nope&password=pw&confirm_password=other",
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("Invalid email address."));
    assert!(html.contains("Field must be equal to password."));
}

#[tokio::test]
async fn wrong_password_rerenders_login_with_flash() {
    let app = app();
    app.state
        .users
        .register("dana", "dana@example.com", "right")
        .unwrap();
    let resp = app
        .post_form("/login", "email=dana%40example.com&password=wrong", None)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());
    assert!(body_text(resp).await.contains("Email or Password is Wrong"));
}

#[tokio::test]
async fn anonymous_account_redirects_to_login_and_back() {
    let app = app();
    let resp = app.get("/account", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=%2Faccount");

    app.state
        .users
        .register("erin", "erin@example.com", "pw")
        .unwrap();
    let resp = app
        .post_form(
            "/login?next=%2Faccount",
            "email=erin%40example.com&password=pw",
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/account");
}

#[tokio::test]
async fn offsite_next_is_ignored() {
    let app = app();
    app.state
        .users
        .register("fred", "fred@example.com", "pw")
        .unwrap();
    let resp = app
        .post_form(
            "/login?next=%2F%2Fevil.example",
            "email=fred%40example.com&password=pw",
            None,
        )
        .await;
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn remember_me_sets_persistent_cookie() {
    let app = app();
    app.state
        .users
        .register("gwen", "gwen@example.com", "pw")
        .unwrap();

    let plain = app
        .post_form("/login", "email=gwen%40example.com&password=pw", None)
        .await;
    let remembered = app
        .post_form(
            "/login",
            "email=gwen%40example.com&password=pw&remember=y",
            None,
        )
        .await;

    let session_header = |resp: &Response<Body>| {
        set_cookies(resp)
            .into_iter()
            .find(|c| c.starts_with("scribe_session="))
            .unwrap()
    };
    assert!(!session_header(&plain).contains("Max-Age"));
    assert!(session_header(&remembered).contains("Max-Age="));
}

#[tokio::test]
async fn logout_invalidates_session() {
    let app = app();
    let cookie = app.login_as("hank", false).await;
    assert_eq!(app.get("/account", Some(&cookie)).await.status(), StatusCode::OK);

    let resp = app.get("/logout", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    assert!(set_cookies(&resp)
        .iter()
        .any(|c| c.starts_with("scribe_flash=") && c.contains("danger%3ALogout")));

    let resp = app.get("/account", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn closed_registration_redirects_home() {
    let app = app_with(|config| config.auth.allow_registration = false);

    let resp = app.get("/register", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    assert!(set_cookies(&resp)
        .iter()
        .any(|c| c.starts_with("scribe_flash=") && c.contains("info%3ARegistration")));

    let resp = app
        .post_form(
            "/register",
            "username=kim&email=kim%40example.com&password=pw&confirm_password=pw",
            None,
        )
        .await;
    assert_eq!(location(&resp), "/");
    assert!(app.state.users.find_by_username("kim").unwrap().is_none());
}

#[tokio::test]
async fn flash_is_shown_once_and_cleared() {
    let app = app();
    let resp = app
        .post_form(
            "/register",
            "username=ivy&email=ivy%40example.com&password=pw&confirm_password=pw",
            None,
        )
        .await;
    let flash = set_cookies(&resp)
        .into_iter()
        .find(|c| c.starts_with("scribe_flash="))
        .unwrap();
    let flash_pair = flash.split(';').next().unwrap().to_string();

    let resp = app.get("/login", Some(&flash_pair)).await;
    assert!(set_cookies(&resp)
        .iter()
        .any(|c| c.starts_with("scribe_flash=;") && c.contains("Max-Age=0")));
    assert!(body_text(resp).await.contains("Account created for ivy!"));
}

// ── Posts ────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_post_over_http() {
    let app = app();
    let cookie = app.login_as("jack", false).await;
    let resp = app
        .post_form("/post/new", "title=Hello&content=First+post", Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    let page = app.state.posts.list(1, 5, None).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].post.title, "Hello");
    assert_eq!(page.items[0].author_username, "jack");
}

#[tokio::test]
async fn blank_post_rerenders_form() {
    let app = app();
    let cookie = app.login_as("kate", false).await;
    let resp = app
        .post_form("/post/new", "title=&content=", Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("This field is required."));
    assert_eq!(app.state.posts.list(1, 5, None).unwrap().total, 0);
}

#[tokio::test]
async fn non_owner_is_forbidden_from_update_and_delete() {
    let app = app();
    let owner = app
        .state
        .users
        .register("liam", "liam@example.com", "pw")
        .unwrap();
    let post = app.state.posts.create("Mine", "Hands off", &owner).unwrap();
    let intruder = app.login_as("mia", false).await;

    let resp = app
        .get(&format!("/post/update/{}", post.id), Some(&intruder))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .post_form(
            &format!("/post/update/{}", post.id),
            "title=Hacked&content=x",
            Some(&intruder),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .post_form(&format!("/post/delete/{}", post.id), "", Some(&intruder))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    assert_eq!(app.state.posts.get(post.id).unwrap().title, "Mine");
}

#[tokio::test]
async fn owner_updates_then_deletes() {
    let app = app();
    let cookie = app.login_as("nina", false).await;
    let nina = app.state.users.find_by_username("nina").unwrap().unwrap();
    let post = app.state.posts.create("Draft", "v1", &nina).unwrap();

    let resp = app
        .post_form(
            &format!("/post/update/{}", post.id),
            "title=Final&content=v2",
            Some(&cookie),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/post/{}", post.id));

    let updated = app.state.posts.get(post.id).unwrap();
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.content, "v2");
    assert_eq!(updated.user_id, nina.id);
    assert_eq!(updated.date_posted, post.date_posted);

    let resp = app
        .post_form(&format!("/post/delete/{}", post.id), "", Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(matches!(
        app.state.posts.get(post.id),
        Err(BlogError::NotFound(_))
    ));
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let app = app();
    let cookie = app.login_as("omar", false).await;

    assert_eq!(app.get("/post/999", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/post/abc", None).await.status(), StatusCode::NOT_FOUND);
    let resp = app.post_form("/post/delete/999", "", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app.get("/post/update/999", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_delete_redirects_to_login() {
    let app = app();
    let resp = app.post_form("/post/delete/1", "", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=%2Fpost%2Fdelete%2F1");
}

#[tokio::test]
async fn home_paginates_newest_first() {
    let app = app();
    let user = app
        .state
        .users
        .register("pat", "pat@example.com", "pw")
        .unwrap();
    let base = chrono::Utc::now() - chrono::Duration::hours(1);
    for i in 1..=7 {
        app.state
            .posts
            .create_at(
                &format!("Entry {i}"),
                "body",
                &user,
                base + chrono::Duration::minutes(i),
            )
            .unwrap();
    }

    let first = body_text(app.get("/", None).await).await;
    assert!(first.contains("Entry 7"));
    assert!(first.contains("Entry 3"));
    assert!(!first.contains("Entry 2<"));

    let second = body_text(app.get("/home?page=2", None).await).await;
    assert!(second.contains("Entry 2"));
    assert!(second.contains("Entry 1"));
    assert!(!second.contains("Entry 7"));

    let beyond = app.get("/?page=9", None).await;
    assert_eq!(beyond.status(), StatusCode::OK);
    assert!(body_text(beyond).await.contains("No posts here yet."));
}

#[tokio::test]
async fn user_page_filters_by_author() {
    let app = app();
    let quinn = app
        .state
        .users
        .register("quinn", "quinn@example.com", "pw")
        .unwrap();
    let rosa = app
        .state
        .users
        .register("rosa", "rosa@example.com", "pw")
        .unwrap();
    app.state.posts.create("By Quinn", "q", &quinn).unwrap();
    app.state.posts.create("By Rosa", "r", &rosa).unwrap();

    let resp = app.get("/user/quinn", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("Posts by quinn (1)"));
    assert!(html.contains("By Quinn"));
    assert!(!html.contains("By Rosa"));

    assert_eq!(
        app.get("/user/nobody", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn post_content_is_escaped() {
    let app = app();
    let user = app
        .state
        .users
        .register("sam", "sam@example.com", "pw")
        .unwrap();
    let post = app
        .state
        .posts
        .create("<script>alert(1)</script>", "a & b", &user)
        .unwrap();

    let html = body_text(app.get(&format!("/post/{}", post.id), None).await).await;
    assert!(!html.contains("<script>alert(1)</script>"));
    assert!(html.contains("&lt;script&gt;"));
    assert!(html.contains("a &amp; b"));
}

#[tokio::test]
async fn static_pages_and_fallback() {
    let app = app();
    assert_eq!(app.get("/about", None).await.status(), StatusCode::OK);
    assert_eq!(
        app.get("/static/img/profilepics/default.jpg", None)
            .await
            .status(),
        StatusCode::OK
    );
    assert_eq!(
        app.get("/no/such/page", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn account_update_over_multipart() {
    let app = app();
    let cookie = app.login_as("tara", false).await;

    let resp = app
        .post_account(account_form("tara2", "tara2@example.com", None), &cookie)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/account");

    let user = app.state.users.find_by_username("tara2").unwrap().unwrap();
    assert_eq!(user.email, "tara2@example.com");
    assert_eq!(user.image_file, "default.jpg");
}

#[tokio::test]
async fn account_picture_upload_stores_thumbnail() {
    let app = app();
    let cookie = app.login_as("uma", false).await;

    let png = png_bytes(300, 200);
    let resp = app
        .post_account(
            account_form("uma", "uma@example.com", Some(("me.png", png.as_slice()))),
            &cookie,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let user = app.state.users.find_by_username("uma").unwrap().unwrap();
    assert_ne!(user.image_file, "default.jpg");
    assert!(user.image_file.ends_with(".png"));
    let files = app.avatar_files();
    assert_eq!(files.len(), 2);
    assert!(files.contains(&user.image_file));

    let saved = image::open(app.state.avatars.dir().join(&user.image_file)).unwrap();
    assert!(saved.width() <= 125 && saved.height() <= 125);
    assert_eq!(saved.width(), 125);
}

#[tokio::test]
async fn duplicate_username_on_account_keeps_no_upload() {
    let app = app();
    app.state
        .users
        .register("vera", "vera@example.com", "pw")
        .unwrap();
    let cookie = app.login_as("walt", false).await;

    let png = png_bytes(60, 60);
    let resp = app
        .post_account(
            account_form("vera", "walt@example.com", Some(("me.png", png.as_slice()))),
            &cookie,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("That username is taken"));

    assert_eq!(app.avatar_files(), vec!["default.jpg"]);
    let walt = app.state.users.find_by_username("walt").unwrap().unwrap();
    assert_eq!(walt.image_file, "default.jpg");
}

#[tokio::test]
async fn undecodable_picture_is_a_field_error() {
    let app = app();
    let cookie = app.login_as("xena", false).await;

    let resp = app
        .post_account(
            account_form("xena", "xena@example.com", Some(("fake.png", b"not an image".as_slice()))),
            &cookie,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains(r#"class="field-error""#));
    assert_eq!(app.avatar_files(), vec!["default.jpg"]);
    let xena = app.state.users.find_by_username("xena").unwrap().unwrap();
    assert_eq!(xena.image_file, "default.jpg");
}

#[tokio::test]
async fn email_change_signs_out_other_sessions() {
    let app = app();
    let laptop = app.login_as("yuri", false).await;
    let phone = app
        .post_form("/login", "email=yuri%40example.com&password=pw", None)
        .await;
    let phone = session_cookie(&phone).unwrap();
    assert_eq!(app.get("/account", Some(&phone)).await.status(), StatusCode::OK);

    let resp = app
        .post_account(account_form("yuri", "yuri@new.example.com", None), &laptop)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/account");

    assert_eq!(app.get("/account", Some(&laptop)).await.status(), StatusCode::OK);
    let resp = app.get("/account", Some(&phone)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).starts_with("/login"));
}

#[tokio::test]
async fn username_only_change_keeps_other_sessions() {
    let app = app();
    let laptop = app.login_as("zoe", false).await;
    let phone = app
        .post_form("/login", "email=zoe%40example.com&password=pw", None)
        .await;
    let phone = session_cookie(&phone).unwrap();

    let resp = app
        .post_account(account_form("zoe2", "ZOE@example.com", None), &laptop)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.get("/account", Some(&phone)).await.status(), StatusCode::OK);
}
