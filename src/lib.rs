//! Scribe: a small multi-user blog served over HTTP.

pub mod auth;
pub mod avatar;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod posts;
pub mod util;

pub use error::{BlogError, BlogResult};
