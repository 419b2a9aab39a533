//! Client for the web-research service.
//!
//! The service takes a topic plus a set of plain-text documents and returns
//! web-grounded structured findings (insights, themes, trends, keywords,
//! citations). Sparse responses parse into empty collections rather than
//! failing; see [`copydesk_core::types::ResearchResult`].

mod client;
mod error;
mod types;

pub use client::ResearchClient;
pub use error::ResearchError;
