//! Application services layer.

pub mod content;
pub mod error;
pub mod feed;
pub mod listing;
pub mod stream;
