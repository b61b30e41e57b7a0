//! Authorization guards for mutating polls and comments.
//!
//! Deletion and edit rights are intentionally asymmetric: a comment can be
//! removed by its author, the owning poll's author or an admin, but edited
//! only by its author.

use enquete_db::entities::user::UserRole;

/// Whether `actor` may delete a poll created by `author_id`.
#[must_use]
pub fn can_delete_poll(actor_id: &str, actor_role: UserRole, author_id: &str) -> bool {
    actor_role.is_admin() || actor_id == author_id
}

/// Whether `actor` may delete a comment. Three-way: comment author, poll
/// author, or admin.
#[must_use]
pub fn can_delete_comment(
    actor_id: &str,
    actor_role: UserRole,
    comment_author_id: &str,
    poll_author_id: &str,
) -> bool {
    actor_role.is_admin() || actor_id == comment_author_id || actor_id == poll_author_id
}

/// Whether `actor` may edit a comment. Author only; admins get no edit
/// rights.
#[must_use]
pub fn can_edit_comment(actor_id: &str, comment_author_id: &str) -> bool {
    actor_id == comment_author_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_deletion_author_or_admin() {
        assert!(can_delete_poll("u1", UserRole::Client, "u1"));
        assert!(can_delete_poll("u2", UserRole::Admin, "u1"));
        assert!(!can_delete_poll("u2", UserRole::Client, "u1"));
    }

    #[test]
    fn test_comment_deletion_three_way() {
        // comment author
        assert!(can_delete_comment("u1", UserRole::Client, "u1", "u9"));
        // poll author
        assert!(can_delete_comment("u9", UserRole::Client, "u1", "u9"));
        // admin
        assert!(can_delete_comment("u5", UserRole::Admin, "u1", "u9"));
        // unrelated client
        assert!(!can_delete_comment("u5", UserRole::Client, "u1", "u9"));
    }

    #[test]
    fn test_comment_edit_author_only() {
        assert!(can_edit_comment("u1", "u1"));
        assert!(!can_edit_comment("u9", "u1"));
        // deletion rights do not imply edit rights
        assert!(!can_edit_comment("admin", "u1"));
    }
}
