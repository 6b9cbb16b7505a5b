//! One-shot flash messages carried in a cookie to the next rendered page.

use super::cookies::{expired_cookie, plain_cookie, read_cookie};
use axum::extract::FromRequestParts;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use std::convert::Infallible;

pub const FLASH_COOKIE: &str = "scribe_flash";

/// Message category; doubles as the CSS class of the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Danger,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Danger => "danger",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "info" => Some(Self::Info),
            "danger" => Some(Self::Danger),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Flashes waiting in the request's cookie. Pages that display them must
/// also clear the cookie (see `gateway::render_page`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flashes(pub Vec<Flash>);

impl Flashes {
    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.0.push(Flash::new(level, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Flashes {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            read_cookie(&parts.headers, FLASH_COOKIE)
                .map(decode)
                .unwrap_or_default(),
        ))
    }
}

/// `level:message` lines, URL-encoded into one cookie-safe token.
pub fn encode(flashes: &[Flash]) -> String {
    let joined = flashes
        .iter()
        .map(|f| format!("{}:{}", f.level.as_str(), f.message.replace('\n', " ")))
        .collect::<Vec<_>>()
        .join("\n");
    urlencoding::encode(&joined).into_owned()
}

/// Inverse of `encode`. Unknown categories and garbage are dropped.
pub fn decode(raw: &str) -> Vec<Flash> {
    let Ok(decoded) = urlencoding::decode(raw) else {
        return Vec::new();
    };
    decoded
        .lines()
        .filter_map(|line| {
            let (level, message) = line.split_once(':')?;
            Some(Flash::new(Level::parse(level)?, message))
        })
        .collect()
}

/// `Set-Cookie` value queueing these flashes for the next page.
pub fn set_cookie(flashes: &[Flash]) -> String {
    plain_cookie(FLASH_COOKIE, &encode(flashes), false)
}

/// `Set-Cookie` value that drops consumed flashes.
pub fn clear_cookie() -> String {
    expired_cookie(FLASH_COOKIE, false)
}

/// 303 redirect that queues one flash message.
pub fn redirect_with(location: &str, level: Level, message: &str) -> Response {
    (
        AppendHeaders([(SET_COOKIE, set_cookie(&[Flash::new(level, message)]))]),
        Redirect::to(location),
    )
        .into_response()
}
