use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<User>;
    /// Cascades to the user's posts, comments and follow edges.
    async fn delete_user(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait GroupRepo: Send + Sync {
    async fn list_groups(&self) -> RepoResult<Vec<Group>>;
    async fn create_group(&self, new: NewGroup) -> RepoResult<Group>;
    async fn get_group(&self, id: Id) -> RepoResult<Group>;
    async fn get_group_by_slug(&self, slug: &str) -> RepoResult<Group>;
    async fn update_group(&self, id: Id, upd: UpdateGroup) -> RepoResult<Group>;
    /// Posts of the group survive with their group reference cleared.
    async fn delete_group(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn count_posts(&self, filter: PostFilter) -> RepoResult<u64>;
    /// Newest first (`pub_date DESC, id DESC`).
    async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> RepoResult<Vec<PostEntry>>;
    async fn get_post(&self, id: Id) -> RepoResult<PostEntry>;
    async fn create_post(&self, new: NewPost) -> RepoResult<Post>;
    async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post>;
    async fn delete_post(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Newest first.
    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<CommentEntry>>;
    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment>;
}

#[async_trait]
pub trait FollowRepo: Send + Sync {
    /// Returns `true` when a new edge was created.
    async fn follow(&self, user_id: Id, author_id: Id) -> RepoResult<bool>;
    /// Returns `true` when an edge was removed.
    async fn unfollow(&self, user_id: Id, author_id: Id) -> RepoResult<bool>;
    async fn is_following(&self, user_id: Id, author_id: Id) -> RepoResult<bool>;
}

pub trait Repo: UserRepo + GroupRepo + PostRepo + CommentRepo + FollowRepo {}

impl<T> Repo for T where T: UserRepo + GroupRepo + PostRepo + CommentRepo + FollowRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
    use tracing::{info, warn};

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        users: BTreeMap<Id, User>,
        groups: BTreeMap<Id, Group>,
        posts: BTreeMap<Id, Post>,
        comments: BTreeMap<Id, Comment>,
        follows: BTreeMap<Id, Follow>,
        next_id: Id,
    }

    impl State {
        fn next_id(&mut self) -> Id {
            self.next_id += 1;
            self.next_id
        }

        fn matches(&self, filter: PostFilter, post: &Post) -> bool {
            match filter {
                PostFilter::All => true,
                PostFilter::Group(g) => post.group_id == Some(g),
                PostFilter::Author(a) => post.author_id == a,
                PostFilter::FollowedBy(u) => self
                    .follows
                    .values()
                    .any(|f| f.user_id == u && f.author_id == post.author_id),
            }
        }

        fn entry(&self, post: &Post) -> PostEntry {
            let group = post.group_id.and_then(|g| self.groups.get(&g));
            PostEntry {
                post: post.clone(),
                author_username: self
                    .users
                    .get(&post.author_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                group_slug: group.map(|g| g.slug.clone()),
                group_title: group.map(|g| g.title.clone()),
                comment_count: self.comments.values().filter(|c| c.post_id == post.id).count() as i64,
            }
        }

        fn remove_post(&mut self, id: Id) {
            self.posts.remove(&id);
            self.comments.retain(|_, c| c.post_id != id);
        }
    }

    /// Process-local store. Optionally mirrors its state to a JSON snapshot
    /// after every write so a dev server survives restarts.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        /// Loads `dir/state.json` when present and persists to it afterwards.
        pub fn with_snapshot(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join("state.json");
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!("loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        warn!("failed to parse snapshot '{}': {e}; starting empty", path.display());
                        State::default()
                    }
                },
                Err(e) => {
                    info!("no snapshot at '{}' ({e}); starting empty", path.display());
                    State::default()
                }
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_deref() else { return };
            let bytes = match self.read().map(|s| serde_json::to_vec_pretty(&*s)) {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => {
                    warn!("failed to encode snapshot: {e}");
                    return;
                }
                Err(e) => {
                    warn!("failed to read state for snapshot: {e}");
                    return;
                }
            };
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            if let Err(e) = std::fs::write(path, bytes) {
                warn!("failed to write snapshot '{}': {e}", path.display());
            }
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let mut s = self.write()?;
            if s.users.values().any(|u| u.username == new.username) {
                return Err(RepoError::Conflict);
            }
            let id = s.next_id();
            let user = User {
                id,
                username: new.username,
                password_hash: new.password_hash,
                date_joined: Utc::now(),
            };
            s.users.insert(id, user.clone());
            drop(s); // release lock before persisting
            self.persist();
            Ok(user)
        }
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            self.read()?.users.get(&id).cloned().ok_or(RepoError::NotFound)
        }
        async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
            let s = self.read()?;
            s.users.values().find(|u| u.username == username).cloned().ok_or(RepoError::NotFound)
        }
        async fn delete_user(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.users.remove(&id).ok_or(RepoError::NotFound)?;
            let owned: Vec<Id> = s.posts.values().filter(|p| p.author_id == id).map(|p| p.id).collect();
            for post_id in owned {
                s.remove_post(post_id);
            }
            s.comments.retain(|_, c| c.author_id != id);
            s.follows.retain(|_, f| f.user_id != id && f.author_id != id);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl GroupRepo for InMemRepo {
        async fn list_groups(&self) -> RepoResult<Vec<Group>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.groups.values().cloned().collect();
            v.sort_by(|a, b| a.title.cmp(&b.title));
            Ok(v)
        }
        async fn create_group(&self, new: NewGroup) -> RepoResult<Group> {
            let mut s = self.write()?;
            if s.groups.values().any(|g| g.slug == new.slug) {
                return Err(RepoError::Conflict);
            }
            let id = s.next_id();
            let group = Group { id, title: new.title, slug: new.slug, description: new.description };
            s.groups.insert(id, group.clone());
            drop(s);
            self.persist();
            Ok(group)
        }
        async fn get_group(&self, id: Id) -> RepoResult<Group> {
            self.read()?.groups.get(&id).cloned().ok_or(RepoError::NotFound)
        }
        async fn get_group_by_slug(&self, slug: &str) -> RepoResult<Group> {
            let s = self.read()?;
            s.groups.values().find(|g| g.slug == slug).cloned().ok_or(RepoError::NotFound)
        }
        async fn update_group(&self, id: Id, upd: UpdateGroup) -> RepoResult<Group> {
            let mut s = self.write()?;

            // uniqueness check before the mutable borrow
            if let Some(ref slug) = upd.slug {
                if s.groups.values().any(|g| g.slug == *slug && g.id != id) {
                    return Err(RepoError::Conflict);
                }
            }
            let group = s.groups.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(title) = upd.title { group.title = title; }
            if let Some(slug) = upd.slug { group.slug = slug; }
            if let Some(description) = upd.description { group.description = description; }

            let updated = group.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
        async fn delete_group(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.groups.remove(&id).ok_or(RepoError::NotFound)?;
            for post in s.posts.values_mut().filter(|p| p.group_id == Some(id)) {
                post.group_id = None;
            }
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn count_posts(&self, filter: PostFilter) -> RepoResult<u64> {
            let s = self.read()?;
            Ok(s.posts.values().filter(|p| s.matches(filter, p)).count() as u64)
        }
        async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> RepoResult<Vec<PostEntry>> {
            let s = self.read()?;
            let mut v: Vec<&Post> = s.posts.values().filter(|p| s.matches(filter, p)).collect();
            v.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
            Ok(v.into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .map(|p| s.entry(p))
                .collect())
        }
        async fn get_post(&self, id: Id) -> RepoResult<PostEntry> {
            let s = self.read()?;
            s.posts.get(&id).map(|p| s.entry(p)).ok_or(RepoError::NotFound)
        }
        async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
            let mut s = self.write()?;
            if !s.users.contains_key(&new.author_id) { return Err(RepoError::NotFound); }
            if let Some(g) = new.group_id {
                if !s.groups.contains_key(&g) { return Err(RepoError::NotFound); }
            }
            let id = s.next_id();
            let post = Post {
                id,
                text: new.text,
                pub_date: Utc::now(),
                author_id: new.author_id,
                group_id: new.group_id,
                image: new.image,
            };
            s.posts.insert(id, post.clone());
            drop(s);
            self.persist();
            Ok(post)
        }
        async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post> {
            let mut s = self.write()?;
            if let Some(g) = upd.group_id {
                if !s.groups.contains_key(&g) { return Err(RepoError::NotFound); }
            }
            let post = s.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
            post.text = upd.text;
            post.group_id = upd.group_id;
            if let Some(image) = upd.image { post.image = Some(image); }
            let updated = post.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }
        async fn delete_post(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            if !s.posts.contains_key(&id) { return Err(RepoError::NotFound); }
            s.remove_post(id);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<CommentEntry>> {
            let s = self.read()?;
            let mut v: Vec<CommentEntry> = s
                .comments
                .values()
                .filter(|c| c.post_id == post_id)
                .map(|c| CommentEntry {
                    comment: c.clone(),
                    author_username: s
                        .users
                        .get(&c.author_id)
                        .map(|u| u.username.clone())
                        .unwrap_or_default(),
                })
                .collect();
            v.sort_by(|a, b| b.comment.created.cmp(&a.comment.created).then(b.comment.id.cmp(&a.comment.id)));
            Ok(v)
        }
        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            let mut s = self.write()?;
            if !s.posts.contains_key(&new.post_id) || !s.users.contains_key(&new.author_id) {
                return Err(RepoError::NotFound);
            }
            let id = s.next_id();
            let comment = Comment {
                id,
                post_id: new.post_id,
                author_id: new.author_id,
                text: new.text,
                created: Utc::now(),
            };
            s.comments.insert(id, comment.clone());
            drop(s);
            self.persist();
            Ok(comment)
        }
    }

    #[async_trait]
    impl FollowRepo for InMemRepo {
        async fn follow(&self, user_id: Id, author_id: Id) -> RepoResult<bool> {
            let mut s = self.write()?;
            if !s.users.contains_key(&user_id) || !s.users.contains_key(&author_id) {
                return Err(RepoError::NotFound);
            }
            if s.follows.values().any(|f| f.user_id == user_id && f.author_id == author_id) {
                return Ok(false);
            }
            let id = s.next_id();
            s.follows.insert(id, Follow { id, user_id, author_id });
            drop(s);
            self.persist();
            Ok(true)
        }
        async fn unfollow(&self, user_id: Id, author_id: Id) -> RepoResult<bool> {
            let mut s = self.write()?;
            let before = s.follows.len();
            s.follows.retain(|_, f| !(f.user_id == user_id && f.author_id == author_id));
            let removed = s.follows.len() != before;
            drop(s);
            if removed { self.persist(); }
            Ok(removed)
        }
        async fn is_following(&self, user_id: Id, author_id: Id) -> RepoResult<bool> {
            let s = self.read()?;
            Ok(s.follows.values().any(|f| f.user_id == user_id && f.author_id == author_id))
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    const POST_ENTRY_SELECT: &str = r#"
        SELECT p.id, p.text, p.pub_date, p.author_id, p.group_id, p.image,
               u.username AS author_username,
               g.slug AS group_slug, g.title AS group_title,
               (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
        FROM posts p
        JOIN users u ON u.id = p.author_id
        LEFT JOIN post_groups g ON g.id = p.group_id
    "#;

    const POST_COLUMNS: &str = "id, text, pub_date, author_id, group_id, image";

    fn map_sqlx(e: sqlx::Error) -> RepoError {
        if let sqlx::Error::RowNotFound = e {
            return RepoError::NotFound;
        }
        let code = e.as_database_error().and_then(|d| d.code()).map(|c| c.into_owned());
        match code.as_deref() {
            Some("23505") => RepoError::Conflict,  // unique_violation
            Some("23503") => RepoError::NotFound,  // foreign_key_violation
            _ => RepoError::Internal(e.to_string()),
        }
    }

    /// `WHERE` clause selecting a feed; the filter value binds to `$1`.
    fn filter_clause(filter: PostFilter) -> (&'static str, Option<Id>) {
        match filter {
            PostFilter::All => ("", None),
            PostFilter::Group(g) => ("WHERE p.group_id = $1", Some(g)),
            PostFilter::Author(a) => ("WHERE p.author_id = $1", Some(a)),
            PostFilter::FollowedBy(u) => (
                "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = $1)",
                Some(u),
            ),
        }
    }

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                "INSERT INTO users (username, password_hash) VALUES ($1,$2) RETURNING id, username, password_hash, date_joined",
            )
            .bind(&new.username)
            .bind(&new.password_hash)
            .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            sqlx::query_as::<_, User>("SELECT id, username, password_hash, date_joined FROM users WHERE id=$1")
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
            sqlx::query_as::<_, User>("SELECT id, username, password_hash, date_joined FROM users WHERE username=$1")
                .bind(username)
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn delete_user(&self, id: Id) -> RepoResult<()> {
            // posts, comments and follows go with it (ON DELETE CASCADE)
            let res = sqlx::query("DELETE FROM users WHERE id=$1")
                .bind(id)
                .execute(&self.pool).await.map_err(map_sqlx)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl GroupRepo for PgRepo {
        async fn list_groups(&self) -> RepoResult<Vec<Group>> {
            sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM post_groups ORDER BY title")
                .fetch_all(&self.pool).await.map_err(map_sqlx)
        }
        async fn create_group(&self, new: NewGroup) -> RepoResult<Group> {
            sqlx::query_as::<_, Group>(
                "INSERT INTO post_groups (title, slug, description) VALUES ($1,$2,$3) RETURNING id, title, slug, description",
            )
            .bind(&new.title)
            .bind(&new.slug)
            .bind(&new.description)
            .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn get_group(&self, id: Id) -> RepoResult<Group> {
            sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM post_groups WHERE id=$1")
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn get_group_by_slug(&self, slug: &str) -> RepoResult<Group> {
            sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM post_groups WHERE slug=$1")
                .bind(slug)
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn update_group(&self, id: Id, upd: UpdateGroup) -> RepoResult<Group> {
            sqlx::query_as::<_, Group>(
                "UPDATE post_groups SET title = COALESCE($2, title), slug = COALESCE($3, slug), description = COALESCE($4, description) \
                 WHERE id=$1 RETURNING id, title, slug, description",
            )
            .bind(id)
            .bind(upd.title.as_ref())
            .bind(upd.slug.as_ref())
            .bind(upd.description.as_ref())
            .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn delete_group(&self, id: Id) -> RepoResult<()> {
            // posts.group_id is ON DELETE SET NULL
            let res = sqlx::query("DELETE FROM post_groups WHERE id=$1")
                .bind(id)
                .execute(&self.pool).await.map_err(map_sqlx)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn count_posts(&self, filter: PostFilter) -> RepoResult<u64> {
            let (clause, value) = filter_clause(filter);
            let sql = format!("SELECT COUNT(*) FROM posts p {clause}");
            let mut q = sqlx::query_scalar::<_, i64>(&sql);
            if let Some(v) = value { q = q.bind(v); }
            let n = q.fetch_one(&self.pool).await.map_err(map_sqlx)?;
            Ok(n.max(0) as u64)
        }
        async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> RepoResult<Vec<PostEntry>> {
            let (clause, value) = filter_clause(filter);
            let first = if value.is_some() { 2 } else { 1 };
            let sql = format!(
                "{POST_ENTRY_SELECT} {clause} ORDER BY p.pub_date DESC, p.id DESC LIMIT ${} OFFSET ${}",
                first,
                first + 1
            );
            let mut q = sqlx::query_as::<_, PostEntry>(&sql);
            if let Some(v) = value { q = q.bind(v); }
            q.bind(limit as i64)
                .bind(offset as i64)
                .fetch_all(&self.pool).await.map_err(map_sqlx)
        }
        async fn get_post(&self, id: Id) -> RepoResult<PostEntry> {
            let sql = format!("{POST_ENTRY_SELECT} WHERE p.id = $1");
            sqlx::query_as::<_, PostEntry>(&sql)
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
            let sql = format!(
                "INSERT INTO posts (text, author_id, group_id, image) VALUES ($1,$2,$3,$4) RETURNING {POST_COLUMNS}"
            );
            sqlx::query_as::<_, Post>(&sql)
                .bind(&new.text)
                .bind(new.author_id)
                .bind(new.group_id)
                .bind(new.image.as_ref())
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post> {
            let sql = format!(
                "UPDATE posts SET text = $2, group_id = $3, image = COALESCE($4, image) WHERE id=$1 RETURNING {POST_COLUMNS}"
            );
            sqlx::query_as::<_, Post>(&sql)
                .bind(id)
                .bind(&upd.text)
                .bind(upd.group_id)
                .bind(upd.image.as_ref())
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
        async fn delete_post(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM posts WHERE id=$1")
                .bind(id)
                .execute(&self.pool).await.map_err(map_sqlx)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<CommentEntry>> {
            sqlx::query_as::<_, CommentEntry>(r#"
                SELECT c.id, c.post_id, c.author_id, c.text, c.created, u.username AS author_username
                FROM comments c
                JOIN users u ON u.id = c.author_id
                WHERE c.post_id = $1
                ORDER BY c.created DESC, c.id DESC
            "#)
                .bind(post_id)
                .fetch_all(&self.pool).await.map_err(map_sqlx)
        }
        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>(
                "INSERT INTO comments (post_id, author_id, text) VALUES ($1,$2,$3) RETURNING id, post_id, author_id, text, created",
            )
            .bind(new.post_id)
            .bind(new.author_id)
            .bind(&new.text)
            .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
    }

    #[async_trait]
    impl FollowRepo for PgRepo {
        async fn follow(&self, user_id: Id, author_id: Id) -> RepoResult<bool> {
            let res = sqlx::query(
                "INSERT INTO follows (user_id, author_id) VALUES ($1,$2) ON CONFLICT (user_id, author_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool).await.map_err(map_sqlx)?;
            Ok(res.rows_affected() == 1)
        }
        async fn unfollow(&self, user_id: Id, author_id: Id) -> RepoResult<bool> {
            let res = sqlx::query("DELETE FROM follows WHERE user_id=$1 AND author_id=$2")
                .bind(user_id)
                .bind(author_id)
                .execute(&self.pool).await.map_err(map_sqlx)?;
            Ok(res.rows_affected() > 0)
        }
        async fn is_following(&self, user_id: Id, author_id: Id) -> RepoResult<bool> {
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM follows WHERE user_id=$1 AND author_id=$2)")
                .bind(user_id)
                .bind(author_id)
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
    }
}
