//! Post ownership check.

use super::session::Principal;
use crate::error::{BlogError, BlogResult};
use crate::posts::Post;

/// True iff the principal is logged in and owns the post.
pub fn can_modify(principal: &Principal, post: &Post) -> bool {
    principal
        .user()
        .is_some_and(|user| user.id == post.user_id)
}

/// `can_modify`, as a `Forbidden` error for handlers.
pub fn ensure_can_modify(principal: &Principal, post: &Post) -> BlogResult<()> {
    if can_modify(principal, post) {
        Ok(())
    } else {
        tracing::warn!(
            post_id = post.id,
            user_id = principal.user().map(|u| u.id),
            "Rejected modification by non-owner"
        );
        Err(BlogError::Forbidden)
    }
}
