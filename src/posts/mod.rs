//! Blog posts and their paginated listings.

pub mod page;
pub mod store;

use chrono::{DateTime, Utc};

pub use page::Page;
pub use store::PostRepository;

/// Default number of posts per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub date_posted: DateTime<Utc>,
    /// Owner.
    pub user_id: i64,
}

/// A post together with the author details every listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostWithAuthor {
    pub post: Post,
    pub author_username: String,
    pub author_image_file: String,
}
