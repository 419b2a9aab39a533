use serde::Serialize;

/// Request body for the `analyze` endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeRequest<'a> {
    pub topic: &'a str,
    pub documents: Vec<Document<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Document<'a> {
    pub title: &'a str,
    pub content: &'a str,
}
