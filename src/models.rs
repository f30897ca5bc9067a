use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i64;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub password_hash: String, // never rendered; kept for the in-memory snapshot
    pub date_joined: DateTime<Utc>,
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: Id,
    pub title: String,
    pub slug: String,
    pub description: String,
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGroup {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Id,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: Id,
    pub group_id: Option<Id>,
    pub image: Option<String>, // media key, see storage::media_key
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub author_id: Id,
    pub text: String,
    pub group_id: Option<Id>,
    pub image: Option<String>,
}
/// Fields replaced by an edit. `image: None` keeps the stored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePost {
    pub text: String,
    pub group_id: Option<Id>,
    pub image: Option<String>,
}

/// A post joined with what the feeds display next to it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub group_slug: Option<String>,
    pub group_title: Option<String>,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    pub author_id: Id,
    pub text: String,
    pub created: DateTime<Utc>,
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: Id,
    pub author_id: Id,
    pub text: String,
}
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Follow {
    pub id: Id,
    pub user_id: Id,
    pub author_id: Id,
}

/// Which posts a feed query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(Id),
    Author(Id),
    /// Posts by every author the given user follows.
    FollowedBy(Id),
}
