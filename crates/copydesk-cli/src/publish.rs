//! The `publish` command: push a generated article to the CMS.

use std::path::PathBuf;

use anyhow::Context;

use copydesk_core::types::GeneratedArticle;
use copydesk_core::AppConfig;
use copydesk_pipeline::{ExportOptions, Pipeline};

use crate::generate::CLIENT_KEY;

pub(crate) struct PublishArgs {
    pub article: PathBuf,
    pub publish: bool,
    pub categories: Vec<String>,
    pub image: bool,
    pub image_prompt: Option<String>,
}

pub(crate) async fn run(config: &AppConfig, args: PublishArgs) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    if !pipeline.can_publish() {
        anyhow::bail!("no CMS configured; set COPYDESK_CMS_URL and COPYDESK_CMS_TOKEN");
    }

    let raw = std::fs::read_to_string(&args.article)
        .with_context(|| format!("reading article file {}", args.article.display()))?;
    let article: GeneratedArticle = serde_json::from_str(&raw)
        .with_context(|| format!("parsing article JSON from {}", args.article.display()))?;

    let options = ExportOptions {
        publish_now: args.publish,
        with_image: args.image || args.image_prompt.is_some(),
        image_prompt: args.image_prompt,
        categories: args.categories,
    };
    let receipt = pipeline.run_export(&article, &options, CLIENT_KEY).await?;

    let state = if receipt.published { "published" } else { "draft" };
    println!("post {} created as {} at {}", receipt.post_id, state, receipt.link);
    if let Some(media_id) = receipt.featured_media_id {
        println!("featured image uploaded as media {media_id}");
    }
    Ok(())
}
