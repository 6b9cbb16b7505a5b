//! Minimal cookie plumbing for the session and flash cookies.

use crate::auth::SessionTicket;
use axum::http::{header, HeaderMap};

/// Holds the opaque session token.
pub const SESSION_COOKIE: &str = "scribe_session";

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

/// `Set-Cookie` value for a fresh session. Remembered sessions get a
/// `Max-Age`; the rest end with the browser session.
pub fn session_cookie(ticket: &SessionTicket, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={}; {}", ticket.token, attributes(secure));
    if let Some(max_age) = ticket.max_age_secs() {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    cookie
}

/// `Set-Cookie` value with `name` set to `value` for the browser session.
pub fn plain_cookie(name: &str, value: &str, secure: bool) -> String {
    format!("{name}={value}; {}", attributes(secure))
}

/// `Set-Cookie` value that deletes `name`.
pub fn expired_cookie(name: &str, secure: bool) -> String {
    format!("{name}=; {}; Max-Age=0", attributes(secure))
}

fn attributes(secure: bool) -> &'static str {
    if secure {
        "Path=/; HttpOnly; SameSite=Lax; Secure"
    } else {
        "Path=/; HttpOnly; SameSite=Lax"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Utc;

    #[test]
    fn read_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; scribe_session=abc123; other=1"),
        );
        assert_eq!(read_cookie(&headers, SESSION_COOKIE), Some("abc123"));
        assert_eq!(read_cookie(&headers, "theme"), Some("dark"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn read_cookie_spans_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("scribe_session=xyz"));
        assert_eq!(read_cookie(&headers, SESSION_COOKIE), Some("xyz"));
    }

    #[test]
    fn session_cookie_persistence_follows_remember() {
        let plain = SessionTicket {
            token: "tok".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            remember: false,
        };
        let cookie = session_cookie(&plain, false);
        assert!(cookie.starts_with("scribe_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Max-Age"));

        let remembered = SessionTicket {
            remember: true,
            ..plain
        };
        assert!(session_cookie(&remembered, true).contains("Max-Age="));
        assert!(session_cookie(&remembered, true).contains("Secure"));
    }

    #[test]
    fn expired_cookie_clears_value() {
        let cookie = expired_cookie(SESSION_COOKIE, false);
        assert!(cookie.starts_with("scribe_session=;"));
        assert!(cookie.ends_with("Max-Age=0"));
    }
}
