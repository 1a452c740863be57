#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use time::{Duration, macros::datetime};
use tokio::sync::Mutex;
use travelora::{
    application::content::{ContentError, ContentQuery},
    domain::{
        pagination::PageRequest,
        posts::{BlockStyle, BodyBlock, PostDetail, PostSummary, TextSpan},
    },
};

pub fn post(index: usize) -> PostSummary {
    PostSummary {
        id: format!("post-{index}"),
        title: format!("Story {index}"),
        slug: format!("story-{index}"),
        excerpt: format!("Notes from stop {index}"),
        published_at: datetime!(2024-06-30 12:00 UTC) - Duration::days(index as i64),
        main_image: None,
        author: None,
        categories: None,
    }
}

/// In-memory content store holding `posts` newest first.
#[derive(Default)]
pub struct MemoryContent {
    posts: Vec<PostSummary>,
    bodies: HashMap<String, Vec<BodyBlock>>,
    failing: AtomicBool,
    requests: Mutex<Vec<PageRequest>>,
}

impl MemoryContent {
    pub fn with_posts(count: usize) -> Self {
        let posts: Vec<PostSummary> = (0..count).map(post).collect();
        let bodies = posts
            .iter()
            .map(|post| {
                let body = vec![BodyBlock::Text {
                    style: BlockStyle::Paragraph,
                    spans: vec![TextSpan::plain(format!(
                        "We arrived at {} by night train.",
                        post.title
                    ))],
                }];
                (post.slug.clone(), body)
            })
            .collect();

        Self {
            posts,
            bodies,
            ..Default::default()
        }
    }

    pub fn with_body(mut self, slug: &str, body: Vec<BodyBlock>) -> Self {
        self.bodies.insert(slug.to_string(), body);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ContentQuery for MemoryContent {
    async fn fetch_page(&self, range: PageRequest) -> Result<Vec<PostSummary>, ContentError> {
        self.requests.lock().await.push(range);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContentError::transport("connection reset by peer"));
        }
        let end = range.end().min(self.posts.len());
        let start = range.start().min(end);
        Ok(self.posts[start..end].to_vec())
    }

    async fn fetch_post(&self, slug: &str) -> Result<Option<PostDetail>, ContentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContentError::transport("connection reset by peer"));
        }
        Ok(self
            .posts
            .iter()
            .find(|post| post.slug == slug)
            .map(|summary| PostDetail {
                summary: summary.clone(),
                body: self.bodies.get(slug).cloned().unwrap_or_default(),
            }))
    }
}
