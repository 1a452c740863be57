//! Server-driven datastar SSE batches.

use std::convert::Infallible;

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, Sse},
};
use datastar::prelude::{ElementPatchMode, PatchElements, PatchSignals};

/// A finite sequence of datastar events sent as one SSE response.
#[derive(Default)]
pub struct SseBatch {
    events: Vec<Event>,
}

impl SseBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `html` as the last children of `selector`.
    pub fn append(&mut self, html: String, selector: &str) -> &mut Self {
        self.patch(html, selector, ElementPatchMode::Append)
    }

    /// Replace the contents of `selector` with `html`.
    pub fn replace_inner(&mut self, html: String, selector: &str) -> &mut Self {
        self.patch(html, selector, ElementPatchMode::Inner)
    }

    pub fn signals(&mut self, payload: &str) -> &mut Self {
        let event = PatchSignals::new(payload).write_as_axum_sse_event();
        self.events.push(event);
        self
    }

    pub fn into_response(self) -> Response {
        let events = self.events;
        let stream = stream! {
            for event in events {
                yield Ok::<Event, Infallible>(event);
            }
        };
        Sse::new(stream).into_response()
    }

    fn patch(&mut self, html: String, selector: &str, mode: ElementPatchMode) -> &mut Self {
        let event = PatchElements::new(html)
            .selector(selector)
            .mode(mode)
            .write_as_axum_sse_event();
        self.events.push(event);
        self
    }
}
