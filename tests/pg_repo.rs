#![cfg(feature = "postgres-store")]

use sqlx::postgres::PgPoolOptions;
use yatube::models::*;
use yatube::repo::pg::PgRepo;
use yatube::repo::{CommentRepo, FollowRepo, GroupRepo, PostRepo, RepoError, UserRepo};

async fn connect(test: &str) -> Option<PgRepo> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(u) => u,
        Err(_) => {
            eprintln!("skipping {test}: no DATABASE_URL set");
            return None;
        }
    };
    let pool = match PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("skipping {test}: db connect failed: {e}");
            return None;
        }
    };
    let repo = PgRepo::new(pool);
    repo.migrate().await.expect("migrations");
    Some(repo)
}

/// Names unique to this run so tests can share a database.
fn unique(prefix: &str) -> String {
    format!("{prefix}{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
#[serial_test::serial]
async fn pg_feeds_and_cascades() {
    let Some(r) = connect("pg_feeds_and_cascades").await else { return };

    let sarah = r.create_user(NewUser { username: unique("sarah"), password_hash: "h".into() }).await.unwrap();
    let leo = r.create_user(NewUser { username: unique("leo"), password_hash: "h".into() }).await.unwrap();
    let dup = r.create_user(NewUser { username: sarah.username.clone(), password_hash: "h".into() }).await;
    assert!(matches!(dup, Err(RepoError::Conflict)));

    let g = r
        .create_group(NewGroup { title: "T".into(), slug: unique("g"), description: String::new() })
        .await
        .unwrap();
    let first = r
        .create_post(NewPost { author_id: sarah.id, text: "first".into(), group_id: Some(g.id), image: None })
        .await
        .unwrap();
    let second = r
        .create_post(NewPost { author_id: sarah.id, text: "second".into(), group_id: None, image: Some("posts/x.png".into()) })
        .await
        .unwrap();

    let mine = r.list_posts(PostFilter::Author(sarah.id), 10, 0).await.unwrap();
    assert_eq!(mine.iter().map(|e| e.post.id).collect::<Vec<_>>(), [second.id, first.id]);
    assert_eq!(mine[1].group_slug.as_deref(), Some(g.slug.as_str()));
    assert_eq!(r.count_posts(PostFilter::Group(g.id)).await.unwrap(), 1);

    assert!(r.follow(leo.id, sarah.id).await.unwrap());
    assert!(!r.follow(leo.id, sarah.id).await.unwrap());
    assert_eq!(r.count_posts(PostFilter::FollowedBy(leo.id)).await.unwrap(), 2);

    r.create_comment(NewComment { post_id: first.id, author_id: leo.id, text: "hi".into() }).await.unwrap();
    assert_eq!(r.get_post(first.id).await.unwrap().comment_count, 1);

    let edited = r
        .update_post(second.id, UpdatePost { text: "second!".into(), group_id: None, image: None })
        .await
        .unwrap();
    assert_eq!(edited.image.as_deref(), Some("posts/x.png"));

    r.delete_group(g.id).await.unwrap();
    assert!(r.get_post(first.id).await.unwrap().post.group_id.is_none());

    r.delete_user(sarah.id).await.unwrap();
    assert!(matches!(r.get_post(first.id).await, Err(RepoError::NotFound)));
    assert!(!r.is_following(leo.id, sarah.id).await.unwrap());
    assert!(r.list_comments(first.id).await.unwrap().is_empty());
    r.delete_user(leo.id).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn pg_rejects_dangling_references() {
    let Some(r) = connect("pg_rejects_dangling_references").await else { return };
    let err = r
        .create_post(NewPost { author_id: -1, text: "t".into(), group_id: None, image: None })
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound));
    assert!(matches!(r.get_user_by_username(&unique("ghost")).await, Err(RepoError::NotFound)));
}
