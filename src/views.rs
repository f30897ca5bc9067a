//! Template contexts and rendering helpers.
//!
//! Handlers turn store rows into the small view structs below; templates under
//! `templates/` only format what they are given.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use askama::Template;

use crate::auth::RequestContext;
use crate::error::ApiError;
use crate::forms::FormErrors;
use crate::models::{CommentEntry, Group, Id, PostEntry};
use crate::pagination::Page;

const DATE_FORMAT: &str = "%d %b %Y %H:%M";

/// Header state shared by every page.
#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub username: Option<String>,
}

impl From<&RequestContext> for Nav {
    fn from(ctx: &RequestContext) -> Self {
        Self { username: ctx.current_user.as_ref().map(|u| u.username.clone()) }
    }
}

#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: Id,
    pub text: String,
    pub pub_date: String,
    pub author: String,
    pub group_slug: Option<String>,
    pub group_title: Option<String>,
    pub image_url: Option<String>,
    pub comment_count: i64,
    pub can_edit: bool,
}

impl PostCard {
    pub fn from_entry(entry: &PostEntry, viewer: Option<Id>) -> Self {
        Self {
            id: entry.post.id,
            text: entry.post.text.clone(),
            pub_date: entry.post.pub_date.format(DATE_FORMAT).to_string(),
            author: entry.author_username.clone(),
            group_slug: entry.group_slug.clone(),
            group_title: entry.group_title.clone(),
            image_url: entry.post.image.as_ref().map(|key| format!("/media/{key}")),
            comment_count: entry.comment_count,
            can_edit: viewer == Some(entry.post.author_id),
        }
    }

    pub fn url(&self) -> String {
        format!("/{}/{}/", self.author, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct CommentCard {
    pub author: String,
    pub text: String,
    pub created: String,
}

impl From<&CommentEntry> for CommentCard {
    fn from(c: &CommentEntry) -> Self {
        Self {
            author: c.author_username.clone(),
            text: c.comment.text.clone(),
            created: c.comment.created.format(DATE_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: u64,
    pub current: bool,
}

#[derive(Debug, Clone)]
pub struct Pager {
    pub show: bool,
    pub has_previous: bool,
    pub previous: u64,
    pub has_next: bool,
    pub next: u64,
    pub links: Vec<PageLink>,
}

impl Pager {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            show: page.has_other_pages(),
            has_previous: page.has_previous(),
            previous: page.previous_page_number(),
            has_next: page.has_next(),
            next: page.next_page_number(),
            links: page
                .page_range()
                .map(|number| PageLink { number, current: number == page.number })
                .collect(),
        }
    }
}

/// The post list plus pager. Rendered on its own so the global feed can
/// cache it as a fragment.
#[derive(Template)]
#[template(path = "fragments/feed.html")]
pub struct FeedFragment {
    pub cards: Vec<PostCard>,
    pub pager: Pager,
}

impl FeedFragment {
    pub fn new(page: &Page<PostEntry>, viewer: Option<Id>) -> Self {
        Self {
            cards: page.object_list.iter().map(|e| PostCard::from_entry(e, viewer)).collect(),
            pager: Pager::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub nav: Nav,
    pub feed_html: String,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub nav: Nav,
    pub group: Group,
    pub feed_html: String,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub nav: Nav,
    pub feed_html: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub nav: Nav,
    pub author: String,
    pub post_count: u64,
    pub following: bool,
    pub can_follow: bool,
    pub feed_html: String,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub nav: Nav,
    pub author: String,
    pub post_count: u64,
    pub card: PostCard,
    pub comments: Vec<CommentCard>,
    pub can_comment: bool,
}

#[derive(Debug, Clone)]
pub struct GroupOption {
    pub id: Id,
    pub title: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "new_post.html")]
pub struct PostFormTemplate {
    pub nav: Nav,
    pub action: String,
    pub is_edit: bool,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
}

impl PostFormTemplate {
    pub fn new(nav: Nav, action: String, text: &str, group: &str, groups: &[Group], errors: &FormErrors) -> Self {
        let selected = group.trim();
        Self {
            nav,
            is_edit: action.ends_with("/edit/"),
            action,
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|g| GroupOption { id: g.id, title: g.title.clone(), selected: g.id.to_string() == selected })
                .collect(),
            current_image: None,
            text_errors: errors.get("text").to_vec(),
            group_errors: errors.get("group").to_vec(),
            image_errors: errors.get("image").to_vec(),
        }
    }

    pub fn with_current_image(mut self, image_url: Option<String>) -> Self {
        self.current_image = image_url;
        self
    }
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub next: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub nav: Nav,
    pub username: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "misc/404.html")]
pub struct NotFoundTemplate {
    pub path: Option<String>,
}

#[derive(Template)]
#[template(path = "misc/500.html")]
pub struct ServerErrorTemplate;

pub fn render_html<T: Template>(template: &T) -> Result<HttpResponse, ApiError> {
    render_html_with_status(template, StatusCode::OK)
}

pub fn render_html_with_status<T: Template>(template: &T, status: StatusCode) -> Result<HttpResponse, ApiError> {
    let body = template.render()?;
    Ok(HttpResponse::build(status).content_type("text/html; charset=utf-8").body(body))
}

pub fn not_found_page(path: Option<&str>) -> HttpResponse {
    let page = NotFoundTemplate { path: path.map(str::to_string) };
    render_html_with_status(&page, StatusCode::NOT_FOUND)
        .unwrap_or_else(|_| plain_error_page(StatusCode::NOT_FOUND, "Not Found"))
}

pub fn server_error_page() -> HttpResponse {
    render_html_with_status(&ServerErrorTemplate, StatusCode::INTERNAL_SERVER_ERROR)
        .unwrap_or_else(|_| plain_error_page(StatusCode::INTERNAL_SERVER_ERROR, "Server Error"))
}

pub fn plain_error_page(status: StatusCode, message: &'static str) -> HttpResponse {
    HttpResponse::build(status).content_type("text/plain; charset=utf-8").body(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Post;
    use chrono::Utc;

    fn entry(id: Id, image: Option<&str>) -> PostEntry {
        PostEntry {
            post: Post {
                id,
                text: "It is driving me crazy!".into(),
                pub_date: Utc::now(),
                author_id: 1,
                group_id: Some(3),
                image: image.map(str::to_string),
            },
            author_username: "sarah".into(),
            group_slug: Some("sarah".into()),
            group_title: Some("sarah's posts".into()),
            comment_count: 2,
        }
    }

    #[test]
    fn fragment_renders_image_tag_and_group_link() {
        let page = Page { object_list: vec![entry(5, Some("posts/abc.png"))], number: 1, num_pages: 1, count: 1, page_size: 10 };
        let html = FeedFragment::new(&page, None).render().unwrap();
        assert!(html.contains("<img"));
        assert!(html.contains("/media/posts/abc.png"));
        assert!(html.contains("/group/sarah/"));
        assert!(html.contains("/sarah/5/"));
    }

    #[test]
    fn text_is_escaped() {
        let mut e = entry(1, None);
        e.post.text = "<script>x</script>".into();
        let page = Page { object_list: vec![e], number: 1, num_pages: 1, count: 1, page_size: 10 };
        let html = FeedFragment::new(&page, None).render().unwrap();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn pager_marks_current_page() {
        let page: Page<()> = Page { object_list: vec![], number: 2, num_pages: 3, count: 25, page_size: 10 };
        let pager = Pager::from_page(&page);
        assert!(pager.show && pager.has_next && pager.has_previous);
        assert_eq!(pager.links.iter().filter(|l| l.current).map(|l| l.number).collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn edit_link_only_for_author() {
        let e = entry(1, None);
        assert!(PostCard::from_entry(&e, Some(1)).can_edit);
        assert!(!PostCard::from_entry(&e, Some(2)).can_edit);
        assert!(!PostCard::from_entry(&e, None).can_edit);
    }

    #[test]
    fn server_error_page_has_no_detail() {
        let resp = server_error_page();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
