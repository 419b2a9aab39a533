//! The orchestrator that drives research, writing, and export.
//!
//! Every outbound call goes through the shared [`RateLimiter`] first,
//! keyed by service name and a caller-chosen client key (the wizard uses
//! the session id). Research and writing are hard requirements; image
//! generation and CMS publishing are optional collaborators that may be
//! absent from a deployment.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use copydesk_core::template::TemplateRegistry;
use copydesk_core::types::{GeneratedArticle, ResearchResult, Source};
use copydesk_core::validation;
use copydesk_core::AppConfig;
use copydesk_images::{ImageClient, DEFAULT_SIZE};
use copydesk_publish::{slugify, NewPost, PostStatus, PublishClient};
use copydesk_research::ResearchClient;
use copydesk_writer::WriterClient;

use crate::error::PipelineError;
use crate::rate_limit::{RateLimiter, WindowConfig};

pub const SERVICE_RESEARCH: &str = "research";
pub const SERVICE_WRITER: &str = "writer";
pub const SERVICE_IMAGE: &str = "image";
pub const SERVICE_PUBLISH: &str = "publish";

/// What to do with an approved article.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ExportOptions {
    /// Publish immediately instead of leaving the post as a draft.
    pub publish_now: bool,
    /// Generate a featured image and attach it to the post.
    pub with_image: bool,
    /// Prompt for the featured image; derived from the article title
    /// when absent.
    pub image_prompt: Option<String>,
    /// Category names resolved (and created if missing) on the CMS.
    pub categories: Vec<String>,
}

/// Record of one completed export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReceipt {
    pub post_id: i64,
    pub link: String,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub exported_at: DateTime<Utc>,
}

/// Shared orchestrator. Cheap to share behind an `Arc`; all clients are
/// connection-pooled reqwest wrappers.
pub struct Pipeline {
    research: ResearchClient,
    writer: WriterClient,
    images: Option<ImageClient>,
    publisher: Option<PublishClient>,
    templates: TemplateRegistry,
    limiter: RateLimiter,
    limiter_max_wait: Duration,
}

impl Pipeline {
    pub fn new(
        research: ResearchClient,
        writer: WriterClient,
        images: Option<ImageClient>,
        publisher: Option<PublishClient>,
        templates: TemplateRegistry,
        limiter: RateLimiter,
        limiter_max_wait: Duration,
    ) -> Self {
        Self {
            research,
            writer,
            images,
            publisher,
            templates,
            limiter,
            limiter_max_wait,
        }
    }

    /// Wires up every configured client from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when a client cannot be built or the template
    /// file cannot be read.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let research = ResearchClient::new(
            &config.research_url,
            &config.research_api_key,
            config.request_timeout_secs,
        )?
        .with_retry_policy(config.max_retries, config.retry_backoff_base_ms);

        let writer = WriterClient::new(
            &config.writer_url,
            &config.writer_api_key,
            &config.writer_model,
            config.request_timeout_secs,
        )?
        .with_retry_policy(config.max_retries, config.retry_backoff_base_ms);

        let images = match &config.image_url {
            Some(url) => Some(
                ImageClient::new(
                    url,
                    config.image_api_key.as_deref().unwrap_or_default(),
                    config.request_timeout_secs,
                )?
                .with_retry_policy(config.max_retries, config.retry_backoff_base_ms),
            ),
            None => None,
        };

        let publisher = match (&config.cms_url, &config.cms_token) {
            (Some(url), Some(token)) => Some(
                PublishClient::new(url, token, config.request_timeout_secs)?
                    .with_retry_policy(config.max_retries, config.retry_backoff_base_ms),
            ),
            _ => None,
        };

        let templates = match &config.templates_path {
            Some(path) => TemplateRegistry::load(path)?,
            None => TemplateRegistry::builtin(),
        };

        let limits = config.limits;
        let limiter = RateLimiter::new(WindowConfig::per_minute(limits.publish_per_minute))
            .with_limit(
                SERVICE_RESEARCH,
                WindowConfig::per_minute(limits.research_per_minute),
            )
            .with_limit(
                SERVICE_WRITER,
                WindowConfig::per_minute(limits.writer_per_minute),
            )
            .with_limit(
                SERVICE_IMAGE,
                WindowConfig::per_minute(limits.image_per_minute),
            )
            .with_limit(
                SERVICE_PUBLISH,
                WindowConfig::per_minute(limits.publish_per_minute),
            );

        Ok(Self::new(
            research,
            writer,
            images,
            publisher,
            templates,
            limiter,
            Duration::from_secs(config.limiter_max_wait_secs),
        ))
    }

    #[must_use]
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn can_publish(&self) -> bool {
        self.publisher.is_some()
    }

    #[must_use]
    pub fn can_generate_images(&self) -> bool {
        self.images.is_some()
    }

    async fn slot(&self, service: &'static str, client_key: &str) -> Result<(), PipelineError> {
        self.limiter
            .acquire(service, client_key, self.limiter_max_wait)
            .await
            .map_err(|retry_after| PipelineError::RateLimited {
                service,
                retry_after,
            })
    }

    /// Runs the research step over the collected sources.
    ///
    /// # Errors
    ///
    /// Fails on an empty source list, a full rate window, or a research
    /// service error.
    pub async fn run_research(
        &self,
        topic: &str,
        sources: &[Source],
        client_key: &str,
    ) -> Result<ResearchResult, PipelineError> {
        validation::ensure_sources_present(sources.len())?;
        self.slot(SERVICE_RESEARCH, client_key).await?;

        tracing::info!(topic, sources = sources.len(), "running research");
        let research = self.research.analyze(topic, sources).await?;
        tracing::info!(
            insights = research.insights.len(),
            citations = research.citations.len(),
            "research complete"
        );
        Ok(research)
    }

    /// Runs the writing step: renders the chosen template over the topic
    /// and research findings and asks the writing service for an article.
    ///
    /// # Errors
    ///
    /// Fails on an unknown template, a full rate window, or a writing
    /// service error.
    pub async fn run_write(
        &self,
        topic: &str,
        template_id: &str,
        research: &ResearchResult,
        client_key: &str,
    ) -> Result<GeneratedArticle, PipelineError> {
        let template = self.templates.get(template_id)?;
        let context = research_context(research);
        let prompt = template.render(&[("topic", topic), ("research", &context)]);

        self.slot(SERVICE_WRITER, client_key).await?;
        tracing::info!(topic, template = template_id, "generating article");
        let article = self.writer.generate(topic, &prompt).await?;
        tracing::info!(
            title = %article.title,
            quality = article.quality_score,
            "article generated"
        );
        Ok(article)
    }

    /// Exports an approved article to the CMS, optionally with a
    /// generated featured image.
    ///
    /// A failed image generation or upload downgrades the export to an
    /// imageless post instead of failing it; missing categories are an
    /// error, missing tags are skipped.
    ///
    /// # Errors
    ///
    /// Fails when no CMS is configured, when an image was requested but
    /// no image service is configured, on a full rate window, and on CMS
    /// errors other than tag resolution.
    pub async fn run_export(
        &self,
        article: &GeneratedArticle,
        options: &ExportOptions,
        client_key: &str,
    ) -> Result<ExportReceipt, PipelineError> {
        let publisher = self.publisher.as_ref().ok_or(PipelineError::NotConfigured {
            service: SERVICE_PUBLISH,
        })?;

        let (image_url, featured_media_id) = if options.with_image {
            let images = self.images.as_ref().ok_or(PipelineError::NotConfigured {
                service: SERVICE_IMAGE,
            })?;
            self.featured_image(images, publisher, article, options, client_key)
                .await
        } else {
            (None, None)
        };

        let mut categories = Vec::with_capacity(options.categories.len());
        for name in &options.categories {
            self.slot(SERVICE_PUBLISH, client_key).await?;
            categories.push(publisher.ensure_category(name).await?);
        }

        let mut tags = Vec::with_capacity(article.tags.len());
        for name in &article.tags {
            self.slot(SERVICE_PUBLISH, client_key).await?;
            match publisher.ensure_tag(name).await {
                Ok(id) => tags.push(id),
                Err(error) => {
                    tracing::warn!(tag = %name, %error, "skipping unresolvable tag");
                }
            }
        }

        let status = if options.publish_now {
            PostStatus::Publish
        } else {
            PostStatus::Draft
        };
        let post = NewPost {
            title: article.title.clone(),
            content: article.body.clone(),
            excerpt: article.excerpt.clone(),
            meta_description: article.meta_description.clone(),
            status,
            categories,
            tags,
            featured_media: featured_media_id,
        };

        self.slot(SERVICE_PUBLISH, client_key).await?;
        tracing::info!(title = %article.title, publish_now = options.publish_now, "exporting article");
        let created = publisher.create_post(&post).await?;
        let link = created.link.unwrap_or_default();
        tracing::info!(post_id = created.id, %link, "export complete");

        Ok(ExportReceipt {
            post_id: created.id,
            link,
            published: created.status == "publish",
            featured_media_id,
            image_url,
            exported_at: Utc::now(),
        })
    }

    /// Best-effort featured image: any failure logs a warning and leaves
    /// the post without one.
    async fn featured_image(
        &self,
        images: &ImageClient,
        publisher: &PublishClient,
        article: &GeneratedArticle,
        options: &ExportOptions,
        client_key: &str,
    ) -> (Option<String>, Option<i64>) {
        if let Err(retry_after) = self
            .limiter
            .acquire(SERVICE_IMAGE, client_key, self.limiter_max_wait)
            .await
        {
            tracing::warn!(
                ?retry_after,
                "image rate window full, exporting without a featured image"
            );
            return (None, None);
        }

        let prompt = options
            .image_prompt
            .clone()
            .unwrap_or_else(|| default_image_prompt(article));
        let image = match images.generate(&prompt, DEFAULT_SIZE).await {
            Ok(image) => image,
            Err(error) => {
                tracing::warn!(%error, "image generation failed, exporting without a featured image");
                return (None, None);
            }
        };

        let file_name = format!("{}.png", slugify(&article.title));
        match publisher.upload_media_from_url(&image.url, &file_name).await {
            Ok(media) => (Some(image.url), Some(media.id)),
            Err(error) => {
                tracing::warn!(%error, "media upload failed, exporting without a featured image");
                (Some(image.url), None)
            }
        }
    }
}

/// Renders research findings as the plain-text block templates splice in
/// under `{{research}}`.
#[must_use]
pub fn research_context(research: &ResearchResult) -> String {
    let mut out = String::new();
    if !research.summary.is_empty() {
        out.push_str("Summary: ");
        out.push_str(&research.summary);
        out.push('\n');
    }
    if !research.insights.is_empty() {
        out.push_str("Key insights:\n");
        for insight in &research.insights {
            out.push_str("- ");
            out.push_str(&insight.text);
            out.push('\n');
        }
    }
    push_list(&mut out, "Themes", &research.themes);
    push_list(&mut out, "Trends", &research.trends);
    push_list(&mut out, "Keywords", &research.keywords);
    if !research.citations.is_empty() {
        out.push_str("Citations:\n");
        for citation in &research.citations {
            out.push_str("- ");
            out.push_str(&citation.title);
            out.push_str(" (");
            out.push_str(&citation.url);
            out.push_str(")\n");
        }
    }
    if out.is_empty() {
        out.push_str("No research findings were available.\n");
    }
    out
}

fn push_list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(label);
    out.push_str(": ");
    out.push_str(&items.join(", "));
    out.push('\n');
}

fn default_image_prompt(article: &GeneratedArticle) -> String {
    format!(
        "Editorial illustration for an article titled \"{}\"",
        article.title
    )
}
