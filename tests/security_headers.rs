#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App};
use common::*;
use yatube::repo::inmem::InMemRepo;
use yatube::{config, SecurityHeaders, Settings};

#[actix_web::test]
async fn hardening_headers_present() {
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::new())
            .app_data(web::Data::new(state(InMemRepo::new())))
            .configure(config),
    )
    .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert!(headers.get("content-security-policy").unwrap().to_str().unwrap().contains("form-action 'self'"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "same-origin");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.get("strict-transport-security").is_none()); // not enabled
}

#[actix_web::test]
async fn error_pages_are_hardened_too() {
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::new().with_hsts(true))
            .app_data(web::Data::new(state(InMemRepo::new())))
            .configure(config),
    )
    .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/no/such/page/here/").to_request()).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    assert!(resp.headers().get("strict-transport-security").is_some(), "HSTS header missing");
    assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
}

#[actix_web::test]
#[serial_test::serial]
async fn hsts_follows_settings() {
    std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
    std::env::set_var("ENABLE_HSTS", "1");
    let settings = Settings::from_env().unwrap();
    std::env::remove_var("ENABLE_HSTS");

    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_settings(&settings))
            .app_data(web::Data::new(state(InMemRepo::new())))
            .configure(config),
    )
    .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert!(resp.headers().get("strict-transport-security").is_some());
}
