//! Read-only query boundary to the hosted content store.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    pagination::PageRequest,
    posts::{PostDetail, PostSummary},
};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content store unreachable: {message}")]
    Transport { message: String },
    #[error("content store answered with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("content store response could not be decoded: {message}")]
    Decode { message: String },
    #[error("content client misconfigured: {message}")]
    Configuration { message: String },
}

impl ContentError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Queries against the content store.
///
/// Pages are ordered by publish date, newest first, and never longer than
/// the requested range. A page shorter than the range means the store has no
/// more posts past it.
#[async_trait]
pub trait ContentQuery: Send + Sync {
    async fn fetch_page(&self, range: PageRequest) -> Result<Vec<PostSummary>, ContentError>;

    async fn fetch_post(&self, slug: &str) -> Result<Option<PostDetail>, ContentError>;
}
