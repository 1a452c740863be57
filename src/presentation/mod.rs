//! Rendering for the website and the terminal browser.

pub mod terminal;
pub mod views;
