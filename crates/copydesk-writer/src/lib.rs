//! Client for the text-generation service.
//!
//! Sends a rendered prompt as a messages-style completion request and parses
//! the model's reply into a [`copydesk_core::types::GeneratedArticle`]. The
//! reply is treated as loose JSON: markdown code fences and surrounding
//! prose are tolerated, and when no JSON object can be found at all the
//! whole reply becomes the article body.

mod client;
mod error;
mod parse;
mod types;

pub use client::WriterClient;
pub use error::WriterError;
pub use parse::parse_article;
