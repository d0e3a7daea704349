//! Domain entities mirrored from persistent storage.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub joined_at: OffsetDateTime,
}

impl UserRecord {
    pub fn as_author(&self) -> AuthorRef {
        AuthorRef {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Author columns joined onto posts, comments and follow edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

impl AuthorRef {
    /// Display name when set, otherwise the username.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

impl From<&GroupRecord> for GroupRef {
    fn from(group: &GroupRecord) -> Self {
        Self {
            id: group.id,
            slug: group.slug.clone(),
            title: group.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub author: AuthorRef,
    pub group: Option<GroupRef>,
    /// Storage key of the attached image, relative to the uploads root.
    pub image: Option<String>,
}

impl PostRecord {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author.id == user_id
    }
}

impl Display for PostRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author: AuthorRef,
    pub text: String,
    pub created_at: OffsetDateTime,
}

impl Display for CommentRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowRecord {
    pub id: i64,
    pub user: AuthorRef,
    pub author: AuthorRef,
    pub created_at: OffsetDateTime,
}

impl Display for FollowRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} follows {}.", self.user.username, self.author.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(id: i64, username: &str) -> AuthorRef {
        AuthorRef {
            id,
            username: username.to_string(),
            display_name: String::new(),
        }
    }

    #[test]
    fn records_display_their_text() {
        let post = PostRecord {
            id: 1,
            text: "First entry".to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            author: author(1, "PostAuthor"),
            group: None,
            image: None,
        };
        let comment = CommentRecord {
            id: 1,
            post_id: 1,
            author: author(2, "AuthUser"),
            text: "Nice one".to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        assert_eq!(post.to_string(), "First entry");
        assert_eq!(comment.to_string(), "Nice one");
    }

    #[test]
    fn follow_display_names_both_sides() {
        let follow = FollowRecord {
            id: 1,
            user: author(2, "AuthUser"),
            author: author(1, "PostAuthor"),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        assert_eq!(follow.to_string(), "AuthUser follows PostAuthor.");
    }

    #[test]
    fn author_label_falls_back_to_username() {
        let mut reference = author(1, "PostAuthor");
        assert_eq!(reference.label(), "PostAuthor");
        reference.display_name = "Leo".to_string();
        assert_eq!(reference.label(), "Leo");
    }
}
