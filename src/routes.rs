use std::collections::HashMap;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use futures_util::{StreamExt as _, TryStreamExt as _};
use serde::Deserialize;

use crate::auth::{hash_password, safe_next, validate_username, verify_password, RequestContext, SessionKeys};
use crate::cache::{FragmentCache, FragmentKey, INDEX_FRAGMENT};
use crate::error::{see_other, ApiError, ServiceError};
use crate::feed::{self, INDEX_PAGE_SIZE};
use crate::forms::{CommentForm, FormErrors, PostForm, Upload};
use crate::graph;
use crate::models::{Id, NewUser};
use crate::publish;
use crate::repo::{Repo, RepoError};
use crate::storage::{is_valid_key, ImageStore};
use crate::views::{
    self, render_html, CommentCard, FeedFragment, FollowTemplate, GroupTemplate, IndexTemplate, LoginTemplate, Nav,
    PostCard, PostFormTemplate, PostTemplate, ProfileTemplate, SignupTemplate,
};

/// Largest accepted file part.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Largest accepted plain (non-file) field or urlencoded body.
const MAX_FIELD_BYTES: usize = 64 * 1024;
const MIN_PASSWORD_LEN: usize = 8;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(
            web::resource("/auth/signup/")
                .route(web::get().to(signup_form))
                .route(web::post().to(signup)),
        )
        .service(
            web::resource("/auth/login/")
                .route(web::get().to(login_form))
                .route(web::post().to(login)),
        )
        .service(web::resource("/auth/logout/").route(web::get().to(logout)))
        .service(web::resource("/media/{key:.+}").route(web::get().to(media)))
        .service(web::resource("/group/{slug}/").route(web::get().to(group_posts)))
        .service(
            web::resource("/new/")
                .route(web::get().to(new_post_form))
                .route(web::post().to(new_post)),
        )
        .service(web::resource("/follow/").route(web::get().to(follow_index)))
        .service(web::resource("/{username}/").route(web::get().to(profile)))
        .service(web::resource("/{username}/follow/").route(web::get().to(profile_follow)))
        .service(web::resource("/{username}/unfollow/").route(web::get().to(profile_unfollow)))
        .service(web::resource(r"/{username}/{post_id:\d+}/").route(web::get().to(post_view)))
        .service(
            web::resource(r"/{username}/{post_id:\d+}/edit/")
                .route(web::get().to(post_edit_form))
                .route(web::post().to(post_edit)),
        )
        .service(web::resource(r"/{username}/{post_id:\d+}/comment/").route(web::post().to(add_comment)))
        .default_service(web::to(not_found));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub image_store: Arc<dyn ImageStore>,
    pub fragments: FragmentCache,
    pub sessions: SessionKeys,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn profile_url(username: &str) -> String {
    format!("/{username}/")
}

fn post_url(username: &str, post_id: Id) -> String {
    format!("/{username}/{post_id}/")
}

fn media_url(key: &str) -> String {
    format!("/media/{key}")
}

// ---------------- form bodies ----------------

/// A submitted form, read from either `multipart/form-data` or
/// `application/x-www-form-urlencoded`.
#[derive(Debug, Default)]
pub struct FormBody {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormBody {
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn into_post_form(mut self) -> PostForm {
        PostForm { text: self.text("text"), group: self.text("group"), image: self.files.remove("image") }
    }
}

async fn read_form(req: &HttpRequest, payload: web::Payload) -> Result<FormBody, ApiError> {
    let multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("multipart/form-data"));
    if multipart {
        read_multipart(req, payload).await
    } else {
        read_urlencoded(payload).await
    }
}

async fn read_multipart(req: &HttpRequest, payload: web::Payload) -> Result<FormBody, ApiError> {
    let mut body = FormBody::default();
    let mut parts = Multipart::new(req.headers(), payload);
    while let Some(mut field) = parts.try_next().await.map_err(|e| {
        tracing::debug!("bad multipart body: {e}");
        ApiError::BadRequest
    })? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);
        let limit = if filename.is_some() { MAX_UPLOAD_BYTES } else { MAX_FIELD_BYTES };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            tracing::debug!("bad multipart field {name}: {e}");
            ApiError::BadRequest
        })? {
            if bytes.len() + chunk.len() > limit {
                return Err(ApiError::PayloadTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        if filename.is_some() {
            body.files.insert(name, Upload { filename, bytes });
        } else {
            body.fields.insert(name, String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    Ok(body)
}

async fn read_urlencoded(mut payload: web::Payload) -> Result<FormBody, ApiError> {
    let mut raw = Vec::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!("form body read failed: {e}");
            ApiError::BadRequest
        })?;
        if raw.len() + chunk.len() > MAX_FIELD_BYTES {
            return Err(ApiError::PayloadTooLarge);
        }
        raw.extend_from_slice(&chunk);
    }
    let fields = url::form_urlencoded::parse(&raw).into_owned().collect();
    Ok(FormBody { fields, files: HashMap::new() })
}

// ---------------- feeds ----------------

pub async fn index(
    ctx: RequestContext,
    data: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let repo = data.repo.as_ref();
    let at = feed::global_position(repo, &ctx, query.page.as_deref())
        .await
        .map_err(|e| e.into_api("/", "/"))?;
    let key = FragmentKey::new(INDEX_FRAGMENT, at.number, INDEX_PAGE_SIZE);
    let caller = &ctx;
    // shared between viewers, so rendered without per-viewer edit links
    let feed_html = data
        .fragments
        .get_or_render(key, move || async move {
            let page = feed::global_page(repo, caller, at).await.map_err(|e| e.into_api("/", "/"))?;
            Ok::<_, ApiError>(FeedFragment::new(&page, None).render()?)
        })
        .await?;
    render_html(&IndexTemplate { nav: Nav::from(&ctx), feed_html: feed_html.to_string() })
}

pub async fn group_posts(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let slug = path.into_inner();
    let feed = feed::group_feed(data.repo.as_ref(), &ctx, &slug, query.page.as_deref())
        .await
        .map_err(|e| e.into_api(req.path(), "/"))?;
    let feed_html = FeedFragment::new(&feed.page, ctx.user_id()).render()?;
    render_html(&GroupTemplate { nav: Nav::from(&ctx), group: feed.group, feed_html })
}

pub async fn follow_index(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = feed::following_feed(data.repo.as_ref(), &ctx, query.page.as_deref())
        .await
        .map_err(|e| e.into_api(req.path(), "/"))?;
    let feed_html = FeedFragment::new(&page, ctx.user_id()).render()?;
    render_html(&FollowTemplate { nav: Nav::from(&ctx), feed_html })
}

pub async fn profile(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let username = path.into_inner();
    let feed = feed::profile_feed(data.repo.as_ref(), &ctx, &username, query.page.as_deref())
        .await
        .map_err(|e| e.into_api(req.path(), "/"))?;
    let feed_html = FeedFragment::new(&feed.page, ctx.user_id()).render()?;
    render_html(&ProfileTemplate {
        nav: Nav::from(&ctx),
        author: feed.author.username,
        post_count: feed.page.count,
        following: feed.following,
        can_follow: feed.can_follow,
        feed_html,
    })
}

pub async fn post_view(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    path: web::Path<(String, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (username, post_id) = path.into_inner();
    let detail = feed::post_detail(data.repo.as_ref(), &ctx, &username, post_id)
        .await
        .map_err(|e| e.into_api(req.path(), "/"))?;
    render_html(&PostTemplate {
        nav: Nav::from(&ctx),
        author: detail.author.username.clone(),
        post_count: detail.author_post_count,
        card: PostCard::from_entry(&detail.post, ctx.user_id()),
        comments: detail.comments.iter().map(CommentCard::from).collect(),
        can_comment: ctx.is_authenticated(),
    })
}

// ---------------- posting ----------------

async fn post_form_page(
    data: &AppState,
    ctx: &RequestContext,
    action: String,
    form: &PostForm,
    errors: &FormErrors,
    current_image: Option<String>,
) -> Result<HttpResponse, ApiError> {
    let groups = data.repo.list_groups().await?;
    let page = PostFormTemplate::new(Nav::from(ctx), action, &form.text, &form.group, &groups, errors)
        .with_current_image(current_image);
    render_html(&page)
}

pub async fn new_post_form(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    ctx.require_user(req.path())?;
    post_form_page(&data, &ctx, "/new/".into(), &PostForm::default(), &FormErrors::default(), None).await
}

pub async fn new_post(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    ctx.require_user(req.path())?;
    let form = read_form(&req, payload).await?.into_post_form();
    match publish::create_post(data.repo.as_ref(), data.image_store.as_ref(), &ctx, &form).await {
        Ok(_) => Ok(see_other("/")),
        Err(ServiceError::Invalid(errors)) => {
            post_form_page(&data, &ctx, "/new/".into(), &form, &errors, None).await
        }
        Err(e) => Err(e.into_api(req.path(), "/")),
    }
}

pub async fn post_edit_form(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    path: web::Path<(String, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (username, post_id) = path.into_inner();
    let read_view = post_url(&username, post_id);
    ctx.require_user(req.path())?;
    let entry = publish::editable_post(data.repo.as_ref(), &ctx, &username, post_id)
        .await
        .map_err(|e| e.into_api(req.path(), &read_view))?;
    let form = PostForm {
        text: entry.post.text.clone(),
        group: entry.post.group_id.map(|g| g.to_string()).unwrap_or_default(),
        image: None,
    };
    let current_image = entry.post.image.as_deref().map(media_url);
    post_form_page(&data, &ctx, format!("{read_view}edit/"), &form, &FormErrors::default(), current_image).await
}

pub async fn post_edit(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    path: web::Path<(String, Id)>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let (username, post_id) = path.into_inner();
    let read_view = post_url(&username, post_id);
    let repo = data.repo.as_ref();
    ctx.require_user(req.path())?;
    // reject strangers before reading a possibly large body
    let entry = publish::editable_post(repo, &ctx, &username, post_id)
        .await
        .map_err(|e| e.into_api(req.path(), &read_view))?;
    let form = read_form(&req, payload).await?.into_post_form();
    match publish::edit_post(repo, data.image_store.as_ref(), &ctx, &username, post_id, &form).await {
        Ok(_) => Ok(see_other(&read_view)),
        Err(ServiceError::Invalid(errors)) => {
            let current_image = entry.post.image.as_deref().map(media_url);
            post_form_page(&data, &ctx, format!("{read_view}edit/"), &form, &errors, current_image).await
        }
        Err(e) => Err(e.into_api(req.path(), &read_view)),
    }
}

pub async fn add_comment(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    path: web::Path<(String, Id)>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let (username, post_id) = path.into_inner();
    let read_view = post_url(&username, post_id);
    ctx.require_user(req.path())?;
    let form = CommentForm { text: read_form(&req, payload).await?.text("text") };
    match publish::add_comment(data.repo.as_ref(), &ctx, &username, post_id, &form).await {
        Ok(_) | Err(ServiceError::Invalid(_)) => Ok(see_other(&read_view)),
        Err(e) => Err(e.into_api(req.path(), &read_view)),
    }
}

// ---------------- follow graph ----------------

pub async fn profile_follow(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let username = path.into_inner();
    let change = graph::follow(data.repo.as_ref(), &ctx, &username)
        .await
        .map_err(|e| e.into_api(req.path(), &profile_url(&username)))?;
    Ok(see_other(&profile_url(&change.author.username)))
}

pub async fn profile_unfollow(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let username = path.into_inner();
    let change = graph::unfollow(data.repo.as_ref(), &ctx, &username)
        .await
        .map_err(|e| e.into_api(req.path(), &profile_url(&username)))?;
    Ok(see_other(&profile_url(&change.author.username)))
}

// ---------------- media ----------------

pub async fn media(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let key = path.into_inner();
    if !is_valid_key(&key) {
        return Err(ApiError::NotFound);
    }
    let (bytes, mime) = data.image_store.load(&key).await?;
    Ok(HttpResponse::Ok()
        .content_type(mime)
        // keys are content hashes, so a key never changes meaning
        .insert_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"))
        .body(bytes))
}

// ---------------- accounts ----------------

fn with_session(data: &AppState, user: &crate::models::User, location: &str) -> Result<HttpResponse, ApiError> {
    let token = data.sessions.issue(user).map_err(ApiError::internal)?;
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .cookie(data.sessions.session_cookie(token))
        .finish())
}

pub async fn signup_form(ctx: RequestContext) -> Result<HttpResponse, ApiError> {
    render_html(&SignupTemplate { nav: Nav::from(&ctx), username: String::new(), errors: Vec::new() })
}

pub async fn signup(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let body = read_form(&req, payload).await?;
    let username = body.text("username").trim().to_string();
    let password = body.text("password1");

    let mut errors = Vec::new();
    if let Err(msg) = validate_username(&username) {
        errors.push(msg.to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."));
    }
    if password != body.text("password2") {
        errors.push("The two password fields didn't match.".to_string());
    }
    if errors.is_empty() {
        let password_hash = web::block(move || hash_password(&password))
            .await
            .map_err(ApiError::internal)?
            .map_err(ApiError::internal)?;
        match data.repo.create_user(NewUser { username: username.clone(), password_hash }).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "account created");
                return with_session(&data, &user, "/");
            }
            Err(RepoError::Conflict) => errors.push("A user with that username already exists.".to_string()),
            Err(e) => return Err(e.into()),
        }
    }
    render_html(&SignupTemplate { nav: Nav::from(&ctx), username, errors })
}

pub async fn login_form(ctx: RequestContext, query: web::Query<NextQuery>) -> Result<HttpResponse, ApiError> {
    render_html(&LoginTemplate {
        nav: Nav::from(&ctx),
        next: safe_next(query.next.as_deref()).to_string(),
        username: String::new(),
        error: None,
    })
}

pub async fn login(
    req: HttpRequest,
    ctx: RequestContext,
    data: web::Data<AppState>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let body = read_form(&req, payload).await?;
    let username = body.text("username").trim().to_string();
    let password = body.text("password");
    let next = safe_next(Some(&body.text("next"))).to_string();

    let user = match data.repo.get_user_by_username(&username).await {
        Ok(user) => Some(user),
        Err(RepoError::NotFound) => None,
        Err(e) => return Err(e.into()),
    };
    if let Some(user) = user {
        let hash = user.password_hash.clone();
        let ok = web::block(move || verify_password(&hash, &password)).await.map_err(ApiError::internal)?;
        if ok {
            return with_session(&data, &user, &next);
        }
    }
    render_html(&LoginTemplate {
        nav: Nav::from(&ctx),
        next,
        username,
        error: Some("Please enter a correct username and password. Note that both fields may be case-sensitive.".into()),
    })
}

pub async fn logout(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .cookie(data.sessions.removal_cookie())
        .finish()
}

pub async fn not_found(req: HttpRequest) -> HttpResponse {
    views::not_found_page(Some(req.path()))
}
