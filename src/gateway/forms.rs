//! Typed form payloads, validated before any store is touched.
//!
//! Every field is `#[serde(default)]` so a malformed submission
//! deserializes and comes back as field errors instead of a bare 422.

use crate::avatar::{allowed_extension, ALLOWED_EXTENSIONS};
use crate::error::{BlogError, BlogResult};
use axum::extract::Multipart;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 20;
pub const TITLE_MAX: usize = 100;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn required(errors: &mut FieldErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
        false
    } else {
        true
    }
}

fn length(errors: &mut FieldErrors, field: &'static str, value: &str, min: usize, max: usize) {
    let len = value.trim().chars().count();
    if len < min || len > max {
        errors.add(
            field,
            format!("Field must be between {min} and {max} characters long."),
        );
    }
}

fn email(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if required(errors, field, value) && !EMAIL_RE.is_match(value.trim()) {
        errors.add(field, "Invalid email address.");
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        if required(&mut errors, "username", &self.username) {
            length(&mut errors, "username", &self.username, USERNAME_MIN, USERNAME_MAX);
        }
        email(&mut errors, "email", &self.email);
        required(&mut errors, "password", &self.password);
        if required(&mut errors, "confirm_password", &self.confirm_password)
            && self.confirm_password != self.password
        {
            errors.add("confirm_password", "Field must be equal to password.");
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// Checkbox; present (any value) when ticked.
    pub remember: Option<String>,
}

impl LoginForm {
    pub fn remember(&self) -> bool {
        self.remember
            .as_deref()
            .is_some_and(|v| !matches!(v, "" | "false" | "0" | "off"))
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        email(&mut errors, "email", &self.email);
        required(&mut errors, "password", &self.password);
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub content: String,
}

impl PostForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        if required(&mut errors, "title", &self.title) {
            length(&mut errors, "title", &self.title, 1, TITLE_MAX);
        }
        required(&mut errors, "content", &self.content);
        errors
    }
}

/// A file part from a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAccountForm {
    pub username: String,
    pub email: String,
    /// `None` when no file was chosen.
    pub picture: Option<UploadedFile>,
}

impl UpdateAccountForm {
    /// Collect the account form from a `multipart/form-data` body. Unknown
    /// parts are skipped; an empty file input counts as no picture.
    pub async fn from_multipart(mut multipart: Multipart) -> BlogResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| BlogError::Validation(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "username" | "email" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| BlogError::Validation(e.body_text()))?;
                    if name == "username" {
                        form.username = text;
                    } else {
                        form.email = text;
                    }
                }
                "picture" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| BlogError::Validation(e.body_text()))?;
                    if !filename.is_empty() && !bytes.is_empty() {
                        form.picture = Some(UploadedFile {
                            filename,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        if required(&mut errors, "username", &self.username) {
            length(&mut errors, "username", &self.username, USERNAME_MIN, USERNAME_MAX);
        }
        email(&mut errors, "email", &self.email);
        if let Some(picture) = &self.picture {
            if allowed_extension(&picture.filename).is_none() {
                errors.add(
                    "picture",
                    format!(
                        "File does not have an approved extension: {}",
                        ALLOWED_EXTENSIONS.join(", ")
                    ),
                );
            }
        }
        errors
    }
}

/// `next` is honoured only when it names a path on this site.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}
