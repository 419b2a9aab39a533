//! Client for the CMS publishing target.
//!
//! A generic blog-platform REST API: posts, categories, tags, and media as
//! resources under a common base URL, bearer-token auth. Categories and
//! tags are "ensured" — looked up by slug first, created only when absent.

mod client;
mod error;
mod types;

pub use client::{slugify, PublishClient};
pub use error::PublishError;
pub use types::{CreatedPost, Media, NewPost, PostStatus, Term};
