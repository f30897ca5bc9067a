//! Read side: the four paginated feeds and the single-post view.
//!
//! Every query takes the caller's [`RequestContext`] even when the result does
//! not depend on it, so access rules live next to the query they guard.

use crate::auth::RequestContext;
use crate::error::ServiceError;
use crate::models::{CommentEntry, Group, Id, PostEntry, PostFilter, User};
use crate::pagination::{Page, Paginator};
use crate::repo::{Repo, RepoResult};

pub const INDEX_PAGE_SIZE: u64 = 10;
pub const GROUP_PAGE_SIZE: u64 = 10;
pub const PROFILE_PAGE_SIZE: u64 = 5;
pub const FOLLOW_PAGE_SIZE: u64 = 10;

/// A resolved page position: the clamped page number and the total it was
/// clamped against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePosition {
    pub number: u64,
    pub count: u64,
}

/// Counts the posts selected by `filter` and clamps the raw page value.
pub async fn locate(
    repo: &dyn Repo,
    filter: PostFilter,
    paginator: Paginator,
    raw_page: Option<&str>,
) -> RepoResult<PagePosition> {
    let count = repo.count_posts(filter).await?;
    Ok(PagePosition { number: paginator.resolve(raw_page, count), count })
}

/// Loads the posts of an already located page.
pub async fn load(
    repo: &dyn Repo,
    filter: PostFilter,
    paginator: Paginator,
    at: PagePosition,
) -> RepoResult<Page<PostEntry>> {
    let (limit, offset) = paginator.window(at.number);
    let object_list = repo.list_posts(filter, limit, offset).await?;
    Ok(Page {
        object_list,
        number: at.number,
        num_pages: paginator.num_pages(at.count),
        count: at.count,
        page_size: paginator.page_size(),
    })
}

pub async fn paginate(
    repo: &dyn Repo,
    filter: PostFilter,
    paginator: Paginator,
    raw_page: Option<&str>,
) -> RepoResult<Page<PostEntry>> {
    let at = locate(repo, filter, paginator, raw_page).await?;
    load(repo, filter, paginator, at).await
}

/// Where the requested page of the global feed falls. Split from
/// [`global_page`] so a cached rendering of that page can skip the list query.
pub async fn global_position(
    repo: &dyn Repo,
    _ctx: &RequestContext,
    raw_page: Option<&str>,
) -> Result<PagePosition, ServiceError> {
    Ok(locate(repo, PostFilter::All, Paginator::new(INDEX_PAGE_SIZE), raw_page).await?)
}

pub async fn global_page(
    repo: &dyn Repo,
    _ctx: &RequestContext,
    at: PagePosition,
) -> Result<Page<PostEntry>, ServiceError> {
    Ok(load(repo, PostFilter::All, Paginator::new(INDEX_PAGE_SIZE), at).await?)
}

#[derive(Debug)]
pub struct GroupFeed {
    pub group: Group,
    pub page: Page<PostEntry>,
}

pub async fn group_feed(
    repo: &dyn Repo,
    _ctx: &RequestContext,
    slug: &str,
    raw_page: Option<&str>,
) -> Result<GroupFeed, ServiceError> {
    let group = repo.get_group_by_slug(slug).await?;
    let page = paginate(repo, PostFilter::Group(group.id), Paginator::new(GROUP_PAGE_SIZE), raw_page).await?;
    Ok(GroupFeed { group, page })
}

#[derive(Debug)]
pub struct ProfileFeed {
    pub author: User,
    pub page: Page<PostEntry>,
    /// Whether the caller follows `author`; always false for anonymous callers.
    pub following: bool,
    /// Whether the caller may follow `author` (signed in and not the author).
    pub can_follow: bool,
}

pub async fn profile_feed(
    repo: &dyn Repo,
    ctx: &RequestContext,
    username: &str,
    raw_page: Option<&str>,
) -> Result<ProfileFeed, ServiceError> {
    let author = repo.get_user_by_username(username).await?;
    let page = paginate(repo, PostFilter::Author(author.id), Paginator::new(PROFILE_PAGE_SIZE), raw_page).await?;
    let (following, can_follow) = match ctx.user_id() {
        Some(me) if me != author.id => (repo.is_following(me, author.id).await?, true),
        _ => (false, false),
    };
    Ok(ProfileFeed { author, page, following, can_follow })
}

/// Posts by the authors the caller follows. The caller's own posts only show
/// up if they somehow follow themselves, which [`crate::graph::follow`] refuses.
pub async fn following_feed(
    repo: &dyn Repo,
    ctx: &RequestContext,
    raw_page: Option<&str>,
) -> Result<Page<PostEntry>, ServiceError> {
    let me = ctx.user_id().ok_or(ServiceError::Unauthenticated)?;
    Ok(paginate(repo, PostFilter::FollowedBy(me), Paginator::new(FOLLOW_PAGE_SIZE), raw_page).await?)
}

#[derive(Debug)]
pub struct PostDetail {
    pub author: User,
    pub post: PostEntry,
    pub author_post_count: u64,
    /// Newest first.
    pub comments: Vec<CommentEntry>,
}

/// Resolves `post_id` only when it was written by `username`.
pub async fn find_post(repo: &dyn Repo, username: &str, post_id: Id) -> Result<(User, PostEntry), ServiceError> {
    let author = repo.get_user_by_username(username).await?;
    let post = repo.get_post(post_id).await?;
    if post.post.author_id != author.id {
        return Err(ServiceError::NotFound);
    }
    Ok((author, post))
}

pub async fn post_detail(
    repo: &dyn Repo,
    _ctx: &RequestContext,
    username: &str,
    post_id: Id,
) -> Result<PostDetail, ServiceError> {
    let (author, post) = find_post(repo, username, post_id).await?;
    let author_post_count = repo.count_posts(PostFilter::Author(author.id)).await?;
    let comments = repo.list_comments(post.post.id).await?;
    Ok(PostDetail { author, post, author_post_count, comments })
}
