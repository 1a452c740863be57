use std::sync::Arc;

use askama::Template;
use axum::response::Response;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::application::content::{ContentError, ContentQuery};
use crate::application::error::HttpError;
use crate::application::listing::{ListController, has_more_after};
use crate::application::stream::SseBatch;
use crate::domain::error::DomainError;
use crate::domain::pagination::{PageRequest, PageSize};
use crate::domain::posts::{self, BlockStyle, BodyBlock, PostDetail, PostSummary, TextSpan};
use crate::presentation::views::{
    AuthorView, BlogContext, BlogLoaderTemplate, BodyBlockView, HomeContext, InlineView,
    LoaderView, PostCard, PostDetailContext, PostRowsAppendTemplate, TemplateRenderError,
};

pub const POST_LIST_SELECTOR: &str = "#post-list";
pub const LOADER_SELECTOR: &str = "#blog-loader";
pub const LOAD_FAILED_NOTICE: &str = "Could not load more stories. Please try again.";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("invalid page range: {0}")]
    Range(#[from] DomainError),
}

/// Cards for one follow-up page plus the loader that replaces the old one.
#[derive(Clone)]
pub struct AppendPayload {
    pub cards: Vec<PostCard>,
    pub loader: LoaderView,
}

#[derive(Clone)]
pub struct FeedService {
    content: Arc<dyn ContentQuery>,
    page_size: PageSize,
}

impl FeedService {
    pub fn new(content: Arc<dyn ContentQuery>, page_size: PageSize) -> Self {
        Self { content, page_size }
    }

    /// Newest posts for the home page.
    pub async fn latest(&self) -> Result<HomeContext, FeedError> {
        let posts = self
            .content
            .fetch_page(PageRequest::first(self.page_size))
            .await?;
        Ok(HomeContext {
            posts: posts.iter().map(summary_to_card).collect(),
        })
    }

    /// Server-rendered seed of the blog list.
    pub async fn blog_seed(&self) -> Result<BlogContext, FeedError> {
        let seed = self
            .content
            .fetch_page(PageRequest::first(self.page_size))
            .await?;
        let controller = ListController::seeded(seed, self.page_size);
        let loader = LoaderView {
            has_more: controller.has_more(),
            next_start: controller.len(),
            error: None,
        };

        Ok(BlogContext {
            posts: controller.items().iter().map(summary_to_card).collect(),
            loader,
        })
    }

    /// The page after `start` posts already shown by the client.
    pub async fn next_page(&self, start: usize) -> Result<AppendPayload, FeedError> {
        let request = PageRequest::following(start, self.page_size)?;
        let page = self.content.fetch_page(request).await?;
        let has_more = has_more_after(page.len(), self.page_size);
        debug!(
            target = "travelora::feed",
            range = %request,
            returned = page.len(),
            has_more,
            "served follow-up page"
        );

        Ok(AppendPayload {
            loader: LoaderView {
                has_more,
                next_start: start + page.len(),
                error: None,
            },
            cards: page.iter().map(summary_to_card).collect(),
        })
    }

    /// Every post up to the page after `start`, for clients that follow the
    /// loader link as a plain navigation.
    pub async fn blog_through(&self, start: usize) -> Result<BlogContext, FeedError> {
        let next = PageRequest::following(start, self.page_size)?;
        let request = PageRequest::new(0, next.end())?;
        let posts = self.content.fetch_page(request).await?;
        let loader = LoaderView {
            has_more: posts.len() >= request.len(),
            next_start: posts.len(),
            error: None,
        };

        Ok(BlogContext {
            posts: posts.iter().map(summary_to_card).collect(),
            loader,
        })
    }

    pub async fn post_detail(&self, slug: &str) -> Result<Option<PostDetailContext>, FeedError> {
        let Some(detail) = self.content.fetch_post(slug).await? else {
            return Ok(None);
        };
        Ok(Some(detail_to_context(&detail)))
    }
}

pub fn summary_to_card(post: &PostSummary) -> PostCard {
    let (image_url, image_alt) = match &post.main_image {
        Some(image) => (
            Some(image.url.clone()),
            image.alt.clone().unwrap_or_else(|| post.title.clone()),
        ),
        None => (None, post.title.clone()),
    };

    PostCard {
        slug: post.slug.clone(),
        title: post.title.clone(),
        excerpt: post.excerpt.clone(),
        iso_date: post.published_at.format(&Rfc3339).unwrap_or_default(),
        published: posts::format_human_date(post.published_at),
        image_url,
        image_alt,
        author: post.author.as_ref().map(|author| AuthorView {
            name: author.name.clone(),
            initial: author.initial(),
            image_url: author.image.clone(),
        }),
        categories: post
            .categories()
            .iter()
            .map(|category| category.title.clone())
            .collect(),
    }
}

fn detail_to_context(detail: &PostDetail) -> PostDetailContext {
    PostDetailContext {
        post: summary_to_card(&detail.summary),
        reading_time: detail.reading_time_minutes(),
        blocks: body_to_views(&detail.body),
    }
}

/// Flatten body blocks for the template, grouping consecutive list items.
fn body_to_views(blocks: &[BodyBlock]) -> Vec<BodyBlockView> {
    let mut views: Vec<BodyBlockView> = Vec::with_capacity(blocks.len());

    for block in blocks {
        match block {
            BodyBlock::Text { style, spans } if posts::plain_text(spans).trim().is_empty() => {
                debug!(target = "travelora::feed", ?style, "skipping empty block");
            }
            BodyBlock::Text {
                style: style @ (BlockStyle::BulletItem | BlockStyle::NumberItem),
                spans,
            } => {
                let tag = if *style == BlockStyle::BulletItem {
                    "ul"
                } else {
                    "ol"
                };
                match views.last_mut() {
                    Some(last) if last.tag == tag && !last.items.is_empty() => {
                        last.items.push(inline_views(spans));
                    }
                    _ => views.push(BodyBlockView {
                        tag,
                        spans: Vec::new(),
                        items: vec![inline_views(spans)],
                        image_url: None,
                        image_alt: String::new(),
                        caption: None,
                    }),
                }
            }
            BodyBlock::Text { style, spans } => views.push(BodyBlockView {
                tag: text_tag(*style),
                spans: inline_views(spans),
                items: Vec::new(),
                image_url: None,
                image_alt: String::new(),
                caption: None,
            }),
            BodyBlock::Image { url, alt, caption } => views.push(BodyBlockView {
                tag: "figure",
                spans: Vec::new(),
                items: Vec::new(),
                image_url: Some(url.clone()),
                image_alt: alt.clone().unwrap_or_default(),
                caption: caption.clone(),
            }),
        }
    }

    views
}

fn inline_views(spans: &[TextSpan]) -> Vec<InlineView> {
    spans
        .iter()
        .map(|span| InlineView {
            text: span.text.clone(),
            strong: span.marks.strong,
            emphasis: span.marks.emphasis,
            code: span.marks.code,
            external: span
                .link
                .as_deref()
                .is_some_and(|href| !href.starts_with('/')),
            href: span.link.clone(),
        })
        .collect()
}

fn text_tag(style: BlockStyle) -> &'static str {
    match style {
        BlockStyle::Heading(1) => "h1",
        BlockStyle::Heading(2) => "h2",
        BlockStyle::Heading(3) => "h3",
        BlockStyle::Heading(_) => "h4",
        BlockStyle::Quote => "blockquote",
        BlockStyle::Paragraph | BlockStyle::BulletItem | BlockStyle::NumberItem => "p",
    }
}

/// Datastar response that appends a page of rows and swaps in the next loader.
pub fn build_load_more_response(payload: AppendPayload) -> Result<Response, HttpError> {
    let AppendPayload { cards, loader } = payload;

    let mut batch = SseBatch::new();

    if !cards.is_empty() {
        let rows = PostRowsAppendTemplate { posts: cards }
            .render()
            .map_err(|err| render_error("application::feed::build_load_more_response", err))?;
        batch.append(rows, POST_LIST_SELECTOR);
    }

    let loader_html = BlogLoaderTemplate { loader }
        .render()
        .map_err(|err| render_error("application::feed::build_load_more_response", err))?;
    batch.replace_inner(loader_html, LOADER_SELECTOR);
    batch.signals(r#"{"feedLoading": false}"#);

    Ok(batch.into_response())
}

/// Datastar response after a failed fetch: rows untouched, loader offers a retry of `start`.
pub fn build_load_more_failure(start: usize) -> Result<Response, HttpError> {
    let loader_html = BlogLoaderTemplate {
        loader: LoaderView {
            has_more: true,
            next_start: start,
            error: Some(LOAD_FAILED_NOTICE),
        },
    }
    .render()
    .map_err(|err| render_error("application::feed::build_load_more_failure", err))?;

    let mut batch = SseBatch::new();
    batch.replace_inner(loader_html, LOADER_SELECTOR);
    batch.signals(r#"{"feedLoading": false}"#);
    Ok(batch.into_response())
}

fn render_error(source: &'static str, err: askama::Error) -> HttpError {
    HttpError::from(TemplateRenderError::new(
        source,
        "Template rendering failed",
        err,
    ))
}
