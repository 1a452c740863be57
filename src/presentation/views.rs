use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::error::{ErrorReport, HttpError},
    config::SiteSettings,
};

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

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

const NAVIGATION: [(&str, &str); 3] = [
    ("Blog", "/blog"),
    ("About", "/about"),
    ("Contact", "/contact"),
];

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub contact_email: String,
    pub navigation: Vec<NavigationLinkView>,
    pub footer_copy: String,
}

impl LayoutChrome {
    /// Site chrome with the navigation entry for `path` (or its parent) marked active.
    pub fn new(site: &SiteSettings, path: &str) -> Self {
        let navigation = NAVIGATION
            .iter()
            .map(|(label, href)| NavigationLinkView {
                label: (*label).to_string(),
                href: (*href).to_string(),
                is_active: path == *href || path.starts_with(&format!("{href}/")),
            })
            .collect();

        Self {
            site_title: site.title.clone(),
            contact_email: site.contact_email.clone(),
            navigation,
            footer_copy: format!("{}. Stories from the road.", site.title),
        }
    }
}

pub struct LayoutContext<T> {
    pub site_title: String,
    pub contact_email: String,
    pub navigation: Vec<NavigationLinkView>,
    pub footer_copy: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            contact_email: chrome.contact_email,
            navigation: chrome.navigation,
            footer_copy: chrome.footer_copy,
            content,
        }
    }
}

#[derive(Clone)]
pub struct AuthorView {
    pub name: String,
    pub initial: String,
    pub image_url: Option<String>,
}

#[derive(Clone)]
pub struct PostCard {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub iso_date: String,
    pub published: String,
    pub image_url: Option<String>,
    pub image_alt: String,
    pub author: Option<AuthorView>,
    pub categories: Vec<String>,
}

impl PostCard {
    pub fn href(&self) -> String {
        format!("/blog/{}", self.slug)
    }
}

/// State of the "load more" control under the blog list.
#[derive(Clone)]
pub struct LoaderView {
    pub has_more: bool,
    pub next_start: usize,
    pub error: Option<&'static str>,
}

impl LoaderView {
    pub fn more_url(&self) -> String {
        format!("/blog/more?start={}", self.next_start)
    }
}

pub struct HomeContext {
    pub posts: Vec<PostCard>,
}

pub struct BlogContext {
    pub posts: Vec<PostCard>,
    pub loader: LoaderView,
}

/// One inline run of body text. Links outside the site open in a new tab.
#[derive(Clone)]
pub struct InlineView {
    pub text: String,
    pub strong: bool,
    pub emphasis: bool,
    pub code: bool,
    pub href: Option<String>,
    pub external: bool,
}

#[derive(Clone)]
pub struct BodyBlockView {
    pub tag: &'static str,
    pub spans: Vec<InlineView>,
    pub items: Vec<Vec<InlineView>>,
    pub image_url: Option<String>,
    pub image_alt: String,
    pub caption: Option<String>,
}

pub struct PostDetailContext {
    pub post: PostCard,
    pub reading_time: usize,
    pub blocks: Vec<BodyBlockView>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub view: LayoutContext<HomeContext>,
}

#[derive(Template)]
#[template(path = "blog.html")]
pub struct BlogTemplate {
    pub view: LayoutContext<BlogContext>,
}

#[derive(Template)]
#[template(path = "partials/post_rows_append.html")]
pub struct PostRowsAppendTemplate {
    pub posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "partials/blog_loader.html")]
pub struct BlogLoaderTemplate {
    pub loader: LoaderView,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct StaticPageView;

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutTemplate {
    pub view: LayoutContext<StaticPageView>,
}

#[derive(Template)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    pub view: LayoutContext<StaticPageView>,
}

pub struct ErrorPageView {
    pub status_code: u16,
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            status_code: StatusCode::NOT_FOUND.as_u16(),
            title: "Page not found".to_string(),
            message: "This trail goes nowhere. The story may have moved or never existed."
                .to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteSettings {
        SiteSettings {
            title: "Travelora".to_string(),
            contact_email: "hello@example.com".to_string(),
        }
    }

    #[test]
    fn navigation_marks_nested_paths_active() {
        let chrome = LayoutChrome::new(&site(), "/blog/night-train");
        let active: Vec<_> = chrome
            .navigation
            .iter()
            .filter(|link| link.is_active)
            .map(|link| link.href.as_str())
            .collect();
        assert_eq!(active, ["/blog"]);
    }

    #[test]
    fn navigation_does_not_match_prefix_words() {
        let chrome = LayoutChrome::new(&site(), "/blogroll");
        assert!(chrome.navigation.iter().all(|link| !link.is_active));
    }

    #[test]
    fn loader_links_to_next_start() {
        let loader = LoaderView {
            has_more: true,
            next_start: 12,
            error: None,
        };
        assert_eq!(loader.more_url(), "/blog/more?start=12");
    }

    #[test]
    fn loader_hides_control_when_exhausted() {
        let html = BlogLoaderTemplate {
            loader: LoaderView {
                has_more: false,
                next_start: 9,
                error: None,
            },
        }
        .render()
        .expect("render loader");
        assert!(!html.contains("/blog/more"));
    }

    #[test]
    fn loader_shows_retry_notice_after_failure() {
        let html = BlogLoaderTemplate {
            loader: LoaderView {
                has_more: true,
                next_start: 6,
                error: Some("Could not load more stories."),
            },
        }
        .render()
        .expect("render loader");
        assert!(html.contains("Could not load more stories."));
        assert!(html.contains("/blog/more?start=6"));
    }
}
