#![cfg(feature = "inmem-store")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use common::*;
use yatube::config;
use yatube::forms::INVALID_IMAGE;
use yatube::models::PostFilter;
use yatube::repo::inmem::InMemRepo;
use yatube::repo::{CommentRepo, PostRepo};

#[actix_web::test]
async fn anonymous_new_post_goes_to_login() {
    let repo = InMemRepo::new();
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo.clone()))).configure(config)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/new/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=/new/");

    let req = test::TestRequest::post()
        .uri("/new/")
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload(urlencoded(&[("text", "sneaky")]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=/new/");
    assert_eq!(repo.count_posts(PostFilter::All).await.unwrap(), 0);
}

#[actix_web::test]
async fn create_post_with_group_and_image() {
    let repo = InMemRepo::new();
    let images = Arc::new(MockImageStore::default());
    let sarah = user(&repo, "sarah").await;
    let grp = group(&repo, "sarah").await;
    let st = state_with_ttl(repo.clone(), images.clone(), Duration::from_secs(20));
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(config)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/new/").insert_header(bearer(&sarah)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let group_id = grp.id.to_string();
    assert!(body_string(resp).await.contains(&format!("value=\"{group_id}\"")));

    let png = sample_png();
    let (ct, body) = multipart(&[("text", "Hello, world"), ("group", &group_id)], Some(("image", "small.gif", &png)));
    let req = test::TestRequest::post()
        .uri("/new/")
        .insert_header(bearer(&sarah))
        .insert_header((header::CONTENT_TYPE, ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");

    let posts = repo.list_posts(PostFilter::Group(grp.id), 10, 0).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post.text, "Hello, world");
    assert_eq!(posts[0].post.author_id, sarah.id);
    let key = posts[0].post.image.clone().expect("image stored");
    assert!(key.starts_with("posts/") && key.ends_with(".png"));
    assert_eq!(images.len(), 1);
}

#[actix_web::test]
async fn wrong_image_is_a_form_error() {
    let repo = InMemRepo::new();
    let images = Arc::new(MockImageStore::default());
    let sarah = user(&repo, "sarah").await;
    let st = state_with_ttl(repo.clone(), images.clone(), Duration::from_secs(20));
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(config)).await;

    let (ct, body) = multipart(&[("text", "kept text"), ("group", "")], Some(("image", "settings.png", b"DEBUG = True\n")));
    let req = test::TestRequest::post()
        .uri("/new/")
        .insert_header(bearer(&sarah))
        .insert_header((header::CONTENT_TYPE, ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_string(resp).await;
    assert!(page.contains(INVALID_IMAGE));
    assert!(page.contains("kept text"));
    assert_eq!(repo.count_posts(PostFilter::All).await.unwrap(), 0);
    assert_eq!(images.len(), 0);
}

#[actix_web::test]
async fn empty_text_and_unknown_group_are_reported() {
    let repo = InMemRepo::new();
    let sarah = user(&repo, "sarah").await;
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo.clone()))).configure(config)).await;

    let req = test::TestRequest::post()
        .uri("/new/")
        .insert_header(bearer(&sarah))
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload(urlencoded(&[("text", "   "), ("group", "4242")]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_string(resp).await;
    assert!(page.contains("id=\"text-errors\""));
    assert!(page.contains("id=\"group-errors\""));
    assert_eq!(repo.count_posts(PostFilter::All).await.unwrap(), 0);
}

#[actix_web::test]
async fn author_edits_and_others_are_bounced() {
    let repo = InMemRepo::new();
    let sarah = user(&repo, "sarah").await;
    let leo = user(&repo, "leo").await;
    let post = post(&repo, &sarah, "first draft").await;
    let st = state(repo.clone());
    let fragments = st.fragments.clone();
    let app = test::init_service(App::new().app_data(web::Data::new(st)).configure(config)).await;
    let edit_uri = format!("/sarah/{}/edit/", post.id);
    let view_uri = format!("/sarah/{}/", post.id);

    // warm the index fragment
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert!(body_string(resp).await.contains("first draft"));

    // anonymous: login; stranger: back to the post
    let resp = test::call_service(&app, test::TestRequest::get().uri(&edit_uri).to_request()).await;
    assert_eq!(location(&resp), format!("/auth/login/?next={edit_uri}"));
    let req = test::TestRequest::post()
        .uri(&edit_uri)
        .insert_header(bearer(&leo))
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload(urlencoded(&[("text", "vandalised")]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), view_uri);
    assert_eq!(repo.get_post(post.id).await.unwrap().post.text, "first draft");

    // the author sees the form prefilled, then saves
    let resp = test::call_service(&app, test::TestRequest::get().uri(&edit_uri).insert_header(bearer(&sarah)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("first draft"));

    let req = test::TestRequest::post()
        .uri(&edit_uri)
        .insert_header(bearer(&sarah))
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload(urlencoded(&[("text", "second draft"), ("group", "")]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), view_uri);

    for uri in [view_uri.as_str(), "/sarah/"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert!(body_string(resp).await.contains("second draft"), "{uri}");
    }

    // the cached index lags until cleared
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert!(body_string(resp).await.contains("first draft"));
    fragments.clear();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    let body = body_string(resp).await;
    assert!(body.contains("second draft") && !body.contains("first draft"));
}

#[actix_web::test]
async fn comments_need_login_and_list_newest_first() {
    let repo = InMemRepo::new();
    let sarah = user(&repo, "sarah").await;
    let leo = user(&repo, "leo").await;
    let post = post(&repo, &sarah, "talk to me").await;
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo.clone()))).configure(config)).await;
    let comment_uri = format!("/sarah/{}/comment/", post.id);
    let view_uri = format!("/sarah/{}/", post.id);

    let comment = |text: &str, auth: Option<&yatube::models::User>| {
        let mut req = test::TestRequest::post()
            .uri(&comment_uri)
            .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
            .set_payload(urlencoded(&[("text", text)]));
        if let Some(u) = auth {
            req = req.insert_header(bearer(u));
        }
        req.to_request()
    };

    let resp = test::call_service(&app, comment("anonymous words", None)).await;
    assert_eq!(location(&resp), format!("/auth/login/?next={comment_uri}"));
    assert!(repo.list_comments(post.id).await.unwrap().is_empty());

    let resp = test::call_service(&app, comment("   ", Some(&leo))).await;
    assert_eq!(location(&resp), view_uri);
    assert!(repo.list_comments(post.id).await.unwrap().is_empty());

    for text in ["older comment", "newer comment"] {
        let resp = test::call_service(&app, comment(text, Some(&leo))).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), view_uri);
    }

    let resp = test::call_service(&app, test::TestRequest::get().uri(&view_uri).to_request()).await;
    let body = body_string(resp).await;
    let newer = body.find("newer comment").expect("newer shown");
    let older = body.find("older comment").expect("older shown");
    assert!(newer < older);
    assert!(!body.contains("anonymous words"));
}

#[actix_web::test]
async fn edit_asks_for_login_before_looking_up_the_post() {
    let repo = InMemRepo::new();
    let sarah = user(&repo, "sarah").await;
    let app = test::init_service(App::new().app_data(web::Data::new(state(repo))).configure(config)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sarah/999/edit/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=/sarah/999/edit/");

    let req = test::TestRequest::post()
        .uri("/ghost/999/edit/")
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload(urlencoded(&[("text", "anything")]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/auth/login/?next=/ghost/999/edit/");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/sarah/999/edit/").insert_header(bearer(&sarah)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
