//! The `generate` command: sources in, finished article out.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use copydesk_core::types::GeneratedArticle;
use copydesk_core::AppConfig;
use copydesk_pipeline::sources::{self, SourceSpec};
use copydesk_pipeline::Pipeline;

use crate::OutputFormat;

/// One limiter client key for every CLI invocation; the CLI is a single
/// caller, not a multi-tenant surface.
pub(crate) const CLIENT_KEY: &str = "cli";

pub(crate) struct GenerateArgs {
    pub topic: String,
    pub texts: Vec<String>,
    pub urls: Vec<String>,
    pub files: Vec<PathBuf>,
    pub template: Option<String>,
    pub format: OutputFormat,
    pub out: Option<PathBuf>,
}

pub(crate) async fn run(config: &AppConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let template_id = args
        .template
        .as_deref()
        .unwrap_or(copydesk_core::template::DEFAULT_TEMPLATE_ID);
    if !pipeline.templates().contains(template_id) {
        anyhow::bail!("unknown template '{template_id}'; run `copydesk-cli templates` to list");
    }

    let specs = collect_specs(&args)?;
    if specs.is_empty() {
        anyhow::bail!("no sources given; pass at least one of --text, --url, or --file");
    }

    let fetcher = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?;
    let sources = sources::normalize_all(&fetcher, specs).await?;
    for source in &sources {
        tracing::info!(kind = %source.kind, title = %source.title, words = source.word_count, "source ready");
    }

    let research = pipeline
        .run_research(&args.topic, &sources, CLIENT_KEY)
        .await?;
    println!(
        "research: {} insights, {} citations",
        research.insights.len(),
        research.citations.len()
    );

    let article = pipeline
        .run_write(&args.topic, template_id, &research, CLIENT_KEY)
        .await?;
    println!(
        "article: \"{}\" ({} words, quality {:.2})",
        article.title,
        copydesk_core::types::word_count(&article.body),
        article.quality_score
    );

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&article)?,
        OutputFormat::Markdown => to_markdown(&article),
    };
    match args.out {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("writing article to {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn collect_specs(args: &GenerateArgs) -> anyhow::Result<Vec<SourceSpec>> {
    let mut specs = Vec::new();
    for body in &args.texts {
        specs.push(SourceSpec::Text { body: body.clone() });
    }
    for url in &args.urls {
        specs.push(SourceSpec::Url { url: url.clone() });
    }
    for path in &args.files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading source file {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(ToOwned::to_owned)
            .ok_or_else(|| anyhow::anyhow!("source file {} has no name", path.display()))?;
        specs.push(SourceSpec::File { name, content });
    }
    Ok(specs)
}

fn to_markdown(article: &GeneratedArticle) -> String {
    let mut out = format!("# {}\n\n", article.title);
    if !article.meta_description.is_empty() {
        out.push_str(&format!("> {}\n\n", article.meta_description));
    }
    out.push_str(&article.body);
    out.push('\n');
    if !article.tags.is_empty() {
        out.push_str(&format!("\nTags: {}\n", article.tags.join(", ")));
    }
    out
}
