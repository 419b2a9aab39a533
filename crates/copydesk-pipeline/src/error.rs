use std::time::Duration;

use thiserror::Error;

use copydesk_core::template::TemplateError;
use copydesk_core::validation::ValidationError;

use crate::wizard::WizardError;

/// One error type for everything a pipeline run can fail with; each
/// service client's error is wrapped rather than flattened so callers can
/// still tell which collaborator misbehaved.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error("research service: {0}")]
    Research(#[from] copydesk_research::ResearchError),

    #[error("writing service: {0}")]
    Writer(#[from] copydesk_writer::WriterError),

    #[error("image service: {0}")]
    Image(#[from] copydesk_images::ImageError),

    #[error("publishing target: {0}")]
    Publish(#[from] copydesk_publish::PublishError),

    /// Local limiter refused the call within the allowed wait budget.
    #[error("rate limit for {service} exceeded; next slot frees in {retry_after:?}")]
    RateLimited {
        service: &'static str,
        retry_after: Duration,
    },

    /// Fetching a URL source failed before normalization could start.
    #[error("failed to fetch source {url}: {source}")]
    SourceFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A step needs a service the deployment has not configured.
    #[error("the {service} service is not configured")]
    NotConfigured { service: &'static str },
}
