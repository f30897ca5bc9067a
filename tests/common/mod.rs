#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::test;
use async_trait::async_trait;

use yatube::cache::FragmentCache;
use yatube::models::*;
use yatube::repo::inmem::InMemRepo;
use yatube::repo::{CommentRepo, FollowRepo, GroupRepo, PostRepo, RepoError, RepoResult, UserRepo};
use yatube::storage::{ImageStore, ImageStoreError};
use yatube::{AppState, SessionKeys};

pub const SECRET: &[u8] = b"integration-secret-integration-secret";

// ---------------- In-memory Mock ImageStore (tests only) ----------------
#[derive(Default)]
pub struct MockImageStore {
    inner: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MockImageStore {
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn save(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<(), ImageStoreError> {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(key) {
            return Err(ImageStoreError::Duplicate);
        }
        map.insert(key.to_string(), (bytes.to_vec(), mime.to_string()));
        Ok(())
    }
    async fn load(&self, key: &str) -> Result<(Vec<u8>, String), ImageStoreError> {
        let map = self.inner.lock().unwrap();
        map.get(key).cloned().ok_or(ImageStoreError::NotFound)
    }
    async fn delete(&self, key: &str) -> Result<(), ImageStoreError> {
        self.inner.lock().unwrap().remove(key);
        Ok(())
    }
}

// ---------------- A store whose every call fails ----------------
pub struct BrokenRepo;

fn broken<T>() -> RepoResult<T> {
    Err(RepoError::Internal("connection reset by peer at 10.0.0.7:5432".into()))
}

#[async_trait]
impl UserRepo for BrokenRepo {
    async fn create_user(&self, _: NewUser) -> RepoResult<User> { broken() }
    async fn get_user(&self, _: Id) -> RepoResult<User> { broken() }
    async fn get_user_by_username(&self, _: &str) -> RepoResult<User> { broken() }
    async fn delete_user(&self, _: Id) -> RepoResult<()> { broken() }
}

#[async_trait]
impl GroupRepo for BrokenRepo {
    async fn list_groups(&self) -> RepoResult<Vec<Group>> { broken() }
    async fn create_group(&self, _: NewGroup) -> RepoResult<Group> { broken() }
    async fn get_group(&self, _: Id) -> RepoResult<Group> { broken() }
    async fn get_group_by_slug(&self, _: &str) -> RepoResult<Group> { broken() }
    async fn update_group(&self, _: Id, _: UpdateGroup) -> RepoResult<Group> { broken() }
    async fn delete_group(&self, _: Id) -> RepoResult<()> { broken() }
}

#[async_trait]
impl PostRepo for BrokenRepo {
    async fn count_posts(&self, _: PostFilter) -> RepoResult<u64> { broken() }
    async fn list_posts(&self, _: PostFilter, _: u64, _: u64) -> RepoResult<Vec<PostEntry>> { broken() }
    async fn get_post(&self, _: Id) -> RepoResult<PostEntry> { broken() }
    async fn create_post(&self, _: NewPost) -> RepoResult<Post> { broken() }
    async fn update_post(&self, _: Id, _: UpdatePost) -> RepoResult<Post> { broken() }
    async fn delete_post(&self, _: Id) -> RepoResult<()> { broken() }
}

#[async_trait]
impl CommentRepo for BrokenRepo {
    async fn list_comments(&self, _: Id) -> RepoResult<Vec<CommentEntry>> { broken() }
    async fn create_comment(&self, _: NewComment) -> RepoResult<Comment> { broken() }
}

#[async_trait]
impl FollowRepo for BrokenRepo {
    async fn follow(&self, _: Id, _: Id) -> RepoResult<bool> { broken() }
    async fn unfollow(&self, _: Id, _: Id) -> RepoResult<bool> { broken() }
    async fn is_following(&self, _: Id, _: Id) -> RepoResult<bool> { broken() }
}

// ---------------- app state ----------------

pub fn sessions() -> SessionKeys {
    SessionKeys::new(SECRET, chrono::Duration::hours(1))
}

pub fn state_with_ttl(repo: InMemRepo, images: Arc<MockImageStore>, ttl: Duration) -> AppState {
    AppState {
        repo: Arc::new(repo),
        image_store: images,
        fragments: FragmentCache::new(ttl),
        sessions: sessions(),
    }
}

/// Default state: fresh mock image store, 20 s fragment TTL.
pub fn state(repo: InMemRepo) -> AppState {
    state_with_ttl(repo, Arc::new(MockImageStore::default()), Duration::from_secs(20))
}

pub async fn user(repo: &InMemRepo, username: &str) -> User {
    repo.create_user(NewUser { username: username.into(), password_hash: String::new() })
        .await
        .unwrap()
}

pub async fn group(repo: &InMemRepo, slug: &str) -> Group {
    repo.create_group(NewGroup {
        title: format!("{slug}'s posts"),
        slug: slug.into(),
        description: String::new(),
    })
    .await
    .unwrap()
}

pub async fn post(repo: &InMemRepo, author: &User, text: &str) -> Post {
    repo.create_post(NewPost { author_id: author.id, text: text.into(), group_id: None, image: None })
        .await
        .unwrap()
}

/// `Authorization` header carrying a session token for `user`.
pub fn bearer(user: &User) -> (header::HeaderName, String) {
    let token = sessions().issue(user).unwrap();
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_string<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    let bytes = test::read_body(resp).await;
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn urlencoded(fields: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new()).extend_pairs(fields).finish()
}

/// Builds a multipart body with text `fields` and an optional
/// `(field, filename, bytes)` file part. Returns `(content type, body)`.
pub fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    let boundary = "YATUBEBOUNDARY42";
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

// Minimal 1x1 PNG (transparent)
pub fn sample_png() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, b'I',
        b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A,
        0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}
