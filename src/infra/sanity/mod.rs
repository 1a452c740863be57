//! Content store adapter over the GROQ HTTP query API.

mod client;
mod groq;
mod wire;

pub use client::SanityClient;
