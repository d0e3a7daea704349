use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::Page;
use crate::application::posts::FieldErrors;
use crate::domain::entities::{AuthorRef, CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::{POST_GROUP_FIELD, POST_IMAGE_FIELD, POST_TEXT_FIELD};

const BRAND_TITLE: &str = "Inkpost";
const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:long] [year]");

pub const POST_TEXT_HELP: &str = "Enter the post text";
pub const POST_GROUP_HELP: &str = "Group this post belongs to";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render the generic error page for `status` and attach a diagnostic report.
pub fn render_error_response(
    chrome: LayoutChrome,
    content: ErrorPageView,
    status: StatusCode,
    detail: impl Into<String>,
) -> Response {
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, status);
    ErrorReport::from_message("presentation::views::render_error_response", status, detail)
        .attach(&mut response);
    response
}

pub fn render_not_found_response(chrome: LayoutChrome, path: &str) -> Response {
    render_error_response(
        chrome,
        ErrorPageView::not_found(path),
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
    pub profile_href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
}

/// Shared page frame: brand, navigation, footer and the signed-in user.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub viewer: Option<ViewerView>,
}

impl LayoutChrome {
    /// Chrome for `path`. Pass `None` for pages whose markup must not depend
    /// on who is looking at them.
    pub fn new(title: impl Into<String>, path: &str, viewer: Option<&UserRecord>) -> Self {
        let title = title.into();
        Self {
            brand: BrandView {
                title: BRAND_TITLE.to_string(),
                href: "/".to_string(),
            },
            navigation: navigation_for(path),
            footer: FooterView {
                copy: format!("© {BRAND_TITLE}"),
            },
            meta: PageMetaView {
                description: title.clone(),
                title,
            },
            viewer: viewer.map(|user| ViewerView {
                username: user.username.clone(),
                profile_href: profile_href(&user.username),
            }),
        }
    }
}

fn navigation_for(path: &str) -> NavigationView {
    let entries = [
        ("Home", "/"),
        ("Subscriptions", "/follow/"),
        ("New post", "/create/"),
        ("About the author", "/about/author/"),
        ("Technologies", "/about/tech/"),
    ]
    .into_iter()
    .map(|(label, href)| NavigationLinkView {
        label: label.to_string(),
        href: href.to_string(),
        is_active: path == href,
    })
    .collect();
    NavigationView { entries }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub viewer: Option<ViewerView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            viewer: chrome.viewer,
            content,
        }
    }
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn post_href(id: i64) -> String {
    format!("/posts/{id}/")
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn media_href(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

fn format_date(value: OffsetDateTime) -> String {
    value.format(DATE_FORMAT).unwrap_or_default()
}

#[derive(Clone)]
pub struct AuthorLink {
    pub label: String,
    pub href: String,
}

impl From<&AuthorRef> for AuthorLink {
    fn from(author: &AuthorRef) -> Self {
        Self {
            label: author.label().to_string(),
            href: profile_href(&author.username),
        }
    }
}

#[derive(Clone)]
pub struct GroupLink {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub published: String,
    pub iso_date: String,
    pub author: AuthorLink,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
    pub detail_href: String,
}

impl From<&PostRecord> for PostCard {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            published: format_date(post.created_at),
            iso_date: post.created_at.date().to_string(),
            author: AuthorLink::from(&post.author),
            group: post.group.as_ref().map(|group| GroupLink {
                title: group.title.clone(),
                href: group_href(&group.slug),
            }),
            image_url: post.image.as_deref().map(media_href),
            detail_href: post_href(post.id),
        }
    }
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u32,
    pub href: String,
    pub is_current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub show: bool,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub first_href: String,
    pub last_href: String,
    pub pages: Vec<PageLinkView>,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>, base_path: &str) -> Self {
        let href = |number: u32| format!("{base_path}?page={number}");
        Self {
            number: page.number,
            num_pages: page.num_pages,
            show: page.num_pages > 1,
            previous_href: page.previous_number().map(href),
            next_href: page.next_number().map(href),
            first_href: href(1),
            last_href: href(page.num_pages),
            pages: (1..=page.num_pages)
                .map(|number| PageLinkView {
                    number,
                    href: href(number),
                    is_current: number == page.number,
                })
                .collect(),
        }
    }
}

/// A paginated list of post cards.
#[derive(Clone)]
pub struct FeedView {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub empty_message: String,
}

impl FeedView {
    pub fn new(page: &Page<PostRecord>, base_path: &str, empty_message: &str) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            paginator: PaginatorView::from_page(page, base_path),
            empty_message: empty_message.to_string(),
        }
    }

    pub fn has_posts(&self) -> bool {
        !self.posts.is_empty()
    }
}

pub struct IndexView {
    pub feed: FeedView,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct GroupPageView {
    pub title: String,
    pub description: String,
    pub feed: FeedView,
}

impl GroupPageView {
    pub fn new(group: &GroupRecord, page: &Page<PostRecord>) -> Self {
        Self {
            title: group.title.clone(),
            description: group.description.clone(),
            feed: FeedView::new(page, &group_href(&group.slug), "No posts in this group yet."),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageView>,
}

pub struct ProfileView {
    pub label: String,
    pub username: String,
    pub post_count: u64,
    pub following: bool,
    /// Signed-in visitors looking at someone else's profile.
    pub show_follow_controls: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub feed: FeedView,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct FollowView {
    pub feed: FeedView,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowView>,
}

#[derive(Clone)]
pub struct CommentView {
    pub author: AuthorLink,
    pub text: String,
    pub published: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author: AuthorLink::from(&comment.author),
            text: comment.text.clone(),
            published: format_date(comment.created_at),
        }
    }
}

pub struct PostDetailView {
    pub post: PostCard,
    pub author_post_count: u64,
    pub edit_href: Option<String>,
    pub comment_action: String,
    pub can_comment: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone)]
pub struct GroupOption {
    pub value: String,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub no_group_selected: bool,
    pub current_image: Option<String>,
    pub text_help: &'static str,
    pub group_help: &'static str,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
}

impl PostFormView {
    pub fn new(
        action: String,
        is_edit: bool,
        groups: &[GroupRecord],
        selected_group: Option<&str>,
        text: &str,
    ) -> Self {
        let selected = selected_group.map(str::trim).filter(|value| !value.is_empty());
        Self {
            is_edit,
            action,
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|group| {
                    let value = group.id.to_string();
                    GroupOption {
                        selected: selected == Some(value.as_str()),
                        value,
                        title: group.title.clone(),
                    }
                })
                .collect(),
            no_group_selected: selected.is_none(),
            current_image: None,
            text_help: POST_TEXT_HELP,
            group_help: POST_GROUP_HELP,
            text_errors: Vec::new(),
            group_errors: Vec::new(),
            image_errors: Vec::new(),
        }
    }

    pub fn with_current_image(mut self, stored_path: Option<&str>) -> Self {
        self.current_image = stored_path.map(media_href);
        self
    }

    pub fn with_errors(mut self, errors: &FieldErrors) -> Self {
        let collect = |field: &str| {
            errors
                .for_field(field)
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        self.text_errors = collect(POST_TEXT_FIELD);
        self.group_errors = collect(POST_GROUP_FIELD);
        self.image_errors = collect(POST_IMAGE_FIELD);
        self
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct AboutView {
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl AboutView {
    pub fn author() -> Self {
        Self {
            title: "About the author".to_string(),
            paragraphs: vec![
                "Inkpost is written and maintained by a small team of people who like reading each other's notes.".to_string(),
                "Write to the maintainers through the profile pages of the site.".to_string(),
            ],
        }
    }

    pub fn tech() -> Self {
        Self {
            title: "Technologies".to_string(),
            paragraphs: vec![
                "The server is written in Rust on top of axum and tokio.".to_string(),
                "Posts live in PostgreSQL, accessed through sqlx; pages are rendered with askama.".to_string(),
            ],
        }
    }
}

#[derive(Template)]
#[template(path = "about/page.html")]
pub struct AboutTemplate {
    pub view: LayoutContext<AboutView>,
}

pub struct ErrorPageView {
    pub code: u16,
    pub title: String,
    pub message: String,
    pub path: Option<String>,
}

impl ErrorPageView {
    pub fn not_found(path: &str) -> Self {
        Self {
            code: 404,
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            path: Some(path.to_string()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            code: 500,
            title: "Server error".to_string(),
            message: "Something went wrong on our side. Please try again later.".to_string(),
            path: None,
        }
    }
}

#[derive(Template)]
#[template(path = "core/error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::{PageNumber, Paginator};
    use crate::domain::entities::GroupRef;
    use time::macros::datetime;

    fn post(id: i64) -> PostRecord {
        PostRecord {
            id,
            text: format!("post {id}"),
            created_at: datetime!(2026-03-05 10:00 UTC),
            author: AuthorRef {
                id: 1,
                username: "leo".to_string(),
                display_name: "Leo".to_string(),
            },
            group: Some(GroupRef {
                id: 7,
                slug: "test_group".to_string(),
                title: "Test group".to_string(),
            }),
            image: Some("posts/small.gif".to_string()),
        }
    }

    #[test]
    fn post_card_links() {
        let card = PostCard::from(&post(3));
        assert_eq!(card.detail_href, "/posts/3/");
        assert_eq!(card.author.href, "/profile/leo/");
        assert_eq!(card.author.label, "Leo");
        assert_eq!(card.group.map(|g| g.href).as_deref(), Some("/group/test_group/"));
        assert_eq!(card.image_url.as_deref(), Some("/media/posts/small.gif"));
        assert_eq!(card.published, "05 March 2026");
    }

    #[test]
    fn paginator_view_links_neighbours() {
        let page = Paginator::default().paginate((1..=25).collect::<Vec<_>>(), PageNumber::new(2));
        let view = PaginatorView::from_page(&page, "/group/g/");
        assert!(view.show);
        assert_eq!(view.previous_href.as_deref(), Some("/group/g/?page=1"));
        assert_eq!(view.next_href.as_deref(), Some("/group/g/?page=3"));
        assert_eq!(view.pages.len(), 3);
        assert!(view.pages[1].is_current);
    }

    #[test]
    fn single_page_hides_paginator() {
        let page = Paginator::default().paginate(vec![1, 2], PageNumber::FIRST);
        let view = PaginatorView::from_page(&page, "/");
        assert!(!view.show);
        assert!(view.previous_href.is_none());
        assert!(view.next_href.is_none());
    }

    #[test]
    fn form_view_marks_selected_group() {
        let groups = vec![GroupRecord {
            id: 7,
            title: "Test group".to_string(),
            slug: "test_group".to_string(),
            description: String::new(),
            created_at: datetime!(2026-01-01 0:00 UTC),
        }];
        let view = PostFormView::new("/create/".to_string(), false, &groups, Some("7"), "hi");
        assert!(view.groups[0].selected);
        assert!(!view.no_group_selected);

        let mut errors = FieldErrors::default();
        errors.push(POST_TEXT_FIELD, "This field is required.");
        let view = view.with_errors(&errors);
        assert_eq!(view.text_errors, vec!["This field is required.".to_string()]);
        assert!(view.group_errors.is_empty());
    }

    #[test]
    fn error_page_renders_path() {
        let chrome = LayoutChrome::new("Not found", "/missing/", None);
        let html = ErrorTemplate {
            view: LayoutContext::new(chrome, ErrorPageView::not_found("/missing/")),
        }
        .render()
        .unwrap();
        assert!(html.contains("/missing/"));
        assert!(html.contains("404"));
    }
}
