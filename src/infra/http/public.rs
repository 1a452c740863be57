use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode, header::CACHE_CONTROL},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::{
        error::HttpError,
        feed::{self, FeedError, FeedService},
    },
    config::SiteSettings,
    presentation::views::{
        AboutTemplate, BlogTemplate, ContactTemplate, HomeTemplate, LayoutChrome, LayoutContext,
        PostTemplate, StaticPageView, render_not_found_response, render_template_response,
    },
};

use super::{
    DATASTAR_REQUEST_HEADER,
    middleware::{LoadMoreMode, LoadMoreTrace, log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub site: Arc<SiteSettings>,
}

impl HttpState {
    fn chrome(&self, path: &str) -> LayoutChrome {
        LayoutChrome::new(&self.site, path)
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/blog", get(blog_index))
        .route("/blog/more", get(blog_more))
        .route("/blog/{slug}", get(post_detail))
        .route("/about", get(about))
        .route("/contact", get(contact))
        .route("/_health", get(health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MoreQuery {
    start: Option<usize>,
}

async fn home(State(state): State<HttpState>) -> Response {
    match state.feed.latest().await {
        Ok(content) => {
            let view = LayoutContext::new(state.chrome("/"), content);
            render_template_response(HomeTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn blog_index(State(state): State<HttpState>) -> Response {
    match state.feed.blog_seed().await {
        Ok(content) => {
            let view = LayoutContext::new(state.chrome("/blog"), content);
            render_template_response(BlogTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Next page for a client that already shows `start` posts.
///
/// Datastar clients get an SSE append. A plain navigation of the loader link
/// gets the whole blog page extended through that next page.
async fn blog_more(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<MoreQuery>,
) -> Result<Response, HttpError> {
    let start = query.start.ok_or_else(|| {
        HttpError::new(
            "infra::http::blog_more",
            StatusCode::BAD_REQUEST,
            "Missing start",
            "`start` query parameter is required",
        )
    })?;

    let (mut response, mode) = if headers.contains_key(DATASTAR_REQUEST_HEADER) {
        match state.feed.next_page(start).await {
            Ok(payload) => (feed::build_load_more_response(payload)?, LoadMoreMode::Append),
            // The client keeps its rows; the loader offers the same range again.
            Err(FeedError::Content(err)) => {
                warn!(
                    target = "travelora::http::blog_more",
                    start,
                    error = %err,
                    "load more failed"
                );
                (feed::build_load_more_failure(start)?, LoadMoreMode::Retry)
            }
            Err(err) => return Err(err.into()),
        }
    } else {
        let content = state.feed.blog_through(start).await?;
        let view = LayoutContext::new(state.chrome("/blog"), content);
        (
            render_template_response(BlogTemplate { view }, StatusCode::OK),
            LoadMoreMode::Page,
        )
    };

    set_no_store(&mut response);
    response.extensions_mut().insert(LoadMoreTrace { start, mode });
    Ok(response)
}

async fn post_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let chrome = state.chrome(&format!("/blog/{slug}"));

    match state.feed.post_detail(&slug).await {
        Ok(Some(content)) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn about(State(state): State<HttpState>) -> Response {
    let view = LayoutContext::new(state.chrome("/about"), StaticPageView);
    render_template_response(AboutTemplate { view }, StatusCode::OK)
}

async fn contact(State(state): State<HttpState>) -> Response {
    let view = LayoutContext::new(state.chrome("/contact"), StaticPageView);
    render_template_response(ContactTemplate { view }, StatusCode::OK)
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn fallback(State(state): State<HttpState>, request: Request<Body>) -> Response {
    render_not_found_response(state.chrome(request.uri().path()))
}

fn set_no_store(response: &mut Response) {
    let value = HeaderValue::from_static("no-store");
    response.headers_mut().insert(CACHE_CONTROL, value);
}
