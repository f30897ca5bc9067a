//! Follow edges between users.

use crate::auth::RequestContext;
use crate::error::ServiceError;
use crate::models::User;
use crate::repo::Repo;

/// Outcome of a follow/unfollow request. `changed` is false for no-ops
/// (self-follow, edge already present, edge already absent).
#[derive(Debug)]
pub struct EdgeChange {
    pub author: User,
    pub changed: bool,
}

pub async fn follow(repo: &dyn Repo, ctx: &RequestContext, username: &str) -> Result<EdgeChange, ServiceError> {
    let me = ctx.user_id().ok_or(ServiceError::Unauthenticated)?;
    let author = repo.get_user_by_username(username).await?;
    if author.id == me {
        return Ok(EdgeChange { author, changed: false });
    }
    let changed = repo.follow(me, author.id).await?;
    if changed {
        tracing::debug!(user_id = me, author = %author.username, "followed");
    }
    Ok(EdgeChange { author, changed })
}

pub async fn unfollow(repo: &dyn Repo, ctx: &RequestContext, username: &str) -> Result<EdgeChange, ServiceError> {
    let me = ctx.user_id().ok_or(ServiceError::Unauthenticated)?;
    let author = repo.get_user_by_username(username).await?;
    let changed = repo.unfollow(me, author.id).await?;
    Ok(EdgeChange { author, changed })
}
