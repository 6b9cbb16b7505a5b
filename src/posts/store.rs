//! SQLite-backed post repository.

use super::{Page, Post, PostWithAuthor};
use crate::auth::User;
use crate::db::{self, Database};
use crate::error::{BlogError, BlogResult};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.date_posted, p.user_id";

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let date_posted: String = row.get(3)?;
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        date_posted: db::parse_timestamp(3, &date_posted)?,
        user_id: row.get(4)?,
    })
}

fn post_with_author_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostWithAuthor> {
    Ok(PostWithAuthor {
        post: post_from_row(row)?,
        author_username: row.get(5)?,
        author_image_file: row.get(6)?,
    })
}

fn not_found(post_id: i64) -> BlogError {
    BlogError::NotFound(format!("post {post_id}"))
}

pub struct PostRepository {
    db: Arc<Database>,
}

impl PostRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a post owned by `owner`, dated now.
    pub fn create(&self, title: &str, content: &str, owner: &User) -> BlogResult<Post> {
        self.create_at(title, content, owner, Utc::now())
    }

    /// Create a post with an explicit date.
    pub fn create_at(
        &self,
        title: &str,
        content: &str,
        owner: &User,
        date_posted: DateTime<Utc>,
    ) -> BlogResult<Post> {
        // Stored with microsecond precision.
        let date_posted = date_posted.trunc_subsecs(6);
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO posts (title, content, date_posted, user_id) VALUES (?1, ?2, ?3, ?4)",
            params![title, content, db::format_timestamp(&date_posted), owner.id],
        )?;
        let post = Post {
            id: conn.last_insert_rowid(),
            title: title.to_string(),
            content: content.to_string(),
            date_posted,
            user_id: owner.id,
        };
        tracing::info!(post_id = post.id, user_id = owner.id, "Post created");
        Ok(post)
    }

    /// Fetch one post; `NotFound` if the id does not exist.
    pub fn get(&self, post_id: i64) -> BlogResult<Post> {
        let conn = self.db.lock();
        conn.query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
            params![post_id],
            post_from_row,
        )
        .optional()?
        .ok_or_else(|| not_found(post_id))
    }

    /// Fetch one post joined with its author.
    pub fn get_with_author(&self, post_id: i64) -> BlogResult<PostWithAuthor> {
        let conn = self.db.lock();
        conn.query_row(
            &format!(
                "SELECT {POST_COLUMNS}, u.username, u.image_file
                 FROM posts p JOIN users u ON p.user_id = u.id
                 WHERE p.id = ?1"
            ),
            params![post_id],
            post_with_author_from_row,
        )
        .optional()?
        .ok_or_else(|| not_found(post_id))
    }

    /// Replace title and content. Owner, id and date are left alone.
    pub fn update(&self, post_id: i64, title: &str, content: &str) -> BlogResult<Post> {
        let updated = {
            let conn = self.db.lock();
            conn.execute(
                "UPDATE posts SET title = ?1, content = ?2 WHERE id = ?3",
                params![title, content, post_id],
            )?
        };
        if updated == 0 {
            return Err(not_found(post_id));
        }
        tracing::info!(post_id, "Post updated");
        self.get(post_id)
    }

    /// Delete a post; `NotFound` if nothing was deleted.
    pub fn delete(&self, post_id: i64) -> BlogResult<()> {
        let deleted = {
            let conn = self.db.lock();
            conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?
        };
        if deleted == 0 {
            return Err(not_found(post_id));
        }
        tracing::info!(post_id, "Post deleted");
        Ok(())
    }

    /// Newest-first page of posts, optionally restricted to one owner.
    /// Page 0 is treated as page 1; pages past the end come back empty.
    pub fn list(
        &self,
        page: u32,
        per_page: u32,
        owner_id: Option<i64>,
    ) -> BlogResult<Page<PostWithAuthor>> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let offset = u64::from(page - 1) * u64::from(per_page);

        let conn = self.db.lock();
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE (?1 IS NULL OR user_id = ?1)",
            params![owner_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS}, u.username, u.image_file
             FROM posts p JOIN users u ON p.user_id = u.id
             WHERE (?1 IS NULL OR p.user_id = ?1)
             ORDER BY p.date_posted DESC, p.id DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let items = stmt
            .query_map(
                params![
                    owner_id,
                    i64::from(per_page),
                    i64::try_from(offset).unwrap_or(i64::MAX)
                ],
                post_with_author_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page,
            per_page,
            total: u64::try_from(total).unwrap_or(0),
        })
    }
}
