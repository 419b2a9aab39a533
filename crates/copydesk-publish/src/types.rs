use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Publish,
}

impl Default for PostStatus {
    fn default() -> Self {
        PostStatus::Draft
    }
}

/// Payload for creating a post on the CMS.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub excerpt: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub meta_description: String,
    pub status: PostStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<i64>,
}

/// The CMS's view of a created post.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPost {
    pub id: i64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub status: String,
}

/// A taxonomy term (category or tag).
#[derive(Debug, Clone, Deserialize)]
pub struct Term {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// An uploaded media item.
#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    pub id: i64,
    #[serde(default)]
    pub source_url: Option<String>,
}
