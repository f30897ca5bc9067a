//! Write side for posts and comments.
//!
//! A submission is validated in full before anything is persisted; the image
//! goes to the blob store before the post row that references it.

use crate::auth::{CurrentUser, RequestContext};
use crate::error::ServiceError;
use crate::feed::find_post;
use crate::forms::{CommentForm, PostForm};
use crate::models::{Comment, Id, NewComment, NewPost, Post, PostEntry, UpdatePost};
use crate::repo::Repo;
use crate::storage::{store_image, ImageStore};

fn caller(ctx: &RequestContext) -> Result<&CurrentUser, ServiceError> {
    ctx.current_user.as_ref().ok_or(ServiceError::Unauthenticated)
}

pub async fn create_post(
    repo: &dyn Repo,
    images: &dyn ImageStore,
    ctx: &RequestContext,
    form: &PostForm,
) -> Result<Post, ServiceError> {
    let author = caller(ctx)?;
    let clean = form.validate(repo).await?;
    let image = match &clean.image {
        Some(img) => Some(store_image(images, img).await?),
        None => None,
    };
    let post = repo
        .create_post(NewPost { author_id: author.id, text: clean.text, group_id: clean.group_id, image })
        .await?;
    tracing::info!(post_id = post.id, author = %author.username, "post created");
    Ok(post)
}

/// The post at `/{username}/{post_id}/`, if the caller is allowed to edit it.
pub async fn editable_post(
    repo: &dyn Repo,
    ctx: &RequestContext,
    username: &str,
    post_id: Id,
) -> Result<PostEntry, ServiceError> {
    let (_, entry) = find_post(repo, username, post_id).await?;
    let me = caller(ctx)?;
    if entry.post.author_id != me.id {
        return Err(ServiceError::PermissionDenied);
    }
    Ok(entry)
}

/// Replaces text and group; the stored image is kept unless a new one is
/// uploaded.
pub async fn edit_post(
    repo: &dyn Repo,
    images: &dyn ImageStore,
    ctx: &RequestContext,
    username: &str,
    post_id: Id,
    form: &PostForm,
) -> Result<Post, ServiceError> {
    let entry = editable_post(repo, ctx, username, post_id).await?;
    let clean = form.validate(repo).await?;
    let image = match &clean.image {
        Some(img) => Some(store_image(images, img).await?),
        None => None,
    };
    let post = repo
        .update_post(entry.post.id, UpdatePost { text: clean.text, group_id: clean.group_id, image })
        .await?;
    tracing::info!(post_id = post.id, "post edited");
    Ok(post)
}

pub async fn add_comment(
    repo: &dyn Repo,
    ctx: &RequestContext,
    username: &str,
    post_id: Id,
    form: &CommentForm,
) -> Result<Comment, ServiceError> {
    let me = caller(ctx)?;
    let (_, entry) = find_post(repo, username, post_id).await?;
    let text = form.validate().map_err(ServiceError::Invalid)?;
    let comment = repo
        .create_comment(NewComment { post_id: entry.post.id, author_id: me.id, text })
        .await?;
    tracing::debug!(comment_id = comment.id, post_id, "comment added");
    Ok(comment)
}
