use actix_web::cookie::{Cookie, SameSite};
use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::{Id, User};
use crate::routes::AppState;

pub const SESSION_COOKIE: &str = "yatube_session";
pub const LOGIN_URL: &str = "/auth/login/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Id,
    pub username: String,
    pub exp: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Id,
    pub username: String,
}

/// Signs and checks session tokens (HS256).
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = (chrono::Utc::now() + self.ttl).timestamp().max(0) as usize;
        let claims = Claims { sub: user.id, username: user.username.clone(), exp };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<CurrentUser, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(CurrentUser { id: data.claims.sub, username: data.claims.username })
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(actix_web::cookie::time::Duration::seconds(self.ttl.num_seconds()))
            .finish()
    }

    /// An already expired session cookie; sending it logs the browser out.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(actix_web::cookie::time::Duration::ZERO)
            .finish()
    }
}

/// Who is calling. Built once per request and passed explicitly into every
/// feed query and mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub current_user: Option<CurrentUser>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: CurrentUser) -> Self {
        Self { current_user: Some(user) }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn user_id(&self) -> Option<Id> {
        self.current_user.as_ref().map(|u| u.id)
    }

    /// The caller, or a redirect to the login page that comes back to `next`.
    pub fn require_user(&self, next: &str) -> Result<&CurrentUser, ApiError> {
        self.current_user
            .as_ref()
            .ok_or_else(|| ApiError::LoginRequired { next: next.to_string() })
    }
}

/// Never fails: a missing, malformed or expired token is an anonymous caller.
impl FromRequest for RequestContext {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return ready(Ok(RequestContext::anonymous()));
        };
        let token = match BearerAuth::from_request(req, pl).into_inner() {
            Ok(bearer) => Some(bearer.token().to_string()),
            Err(_) => req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()),
        };
        let ctx = match token.map(|t| state.sessions.verify(&t)) {
            Some(Ok(user)) => RequestContext::authenticated(user),
            Some(Err(e)) => {
                tracing::debug!("rejected session token: {e}");
                RequestContext::anonymous()
            }
            None => RequestContext::anonymous(),
        };
        ready(Ok(ctx))
    }
}

pub fn login_url(next: &str) -> String {
    // path separators stay readable; everything else is escaped
    let next = urlencoding::encode(next).replace("%2F", "/");
    format!("{LOGIN_URL}?next={next}")
}

/// Only same-site absolute paths are honoured as a post-login target.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => "/",
    }
}

pub fn hash_password(pw: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(pw.as_bytes(), &salt)?.to_string())
}

pub fn verify_password(hash: &str, pw: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(pw.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// First path segments owned by fixed routes; a profile there would be unreachable.
pub const RESERVED_USERNAMES: &[&str] = &["auth", "follow", "group", "media", "new"];

/// ASCII letters, digits and `@.+-_`, at most 150 characters.
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.is_empty() || username.len() > 150 {
        return Err("Enter a username of 1 to 150 characters.");
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c)) {
        return Err("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.");
    }
    if RESERVED_USERNAMES.iter().any(|r| r.eq_ignore_ascii_case(username)) {
        return Err("This username is reserved.");
    }
    Ok(())
}
