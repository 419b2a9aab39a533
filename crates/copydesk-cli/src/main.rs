mod doctor;
mod generate;
mod publish;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "copydesk-cli")]
#[command(about = "Copydesk content pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Research a topic from the given sources and generate an article
    Generate {
        /// Topic to research and write about
        topic: String,

        /// Inline text source (repeatable)
        #[arg(long = "text")]
        texts: Vec<String>,

        /// URL source to fetch and reduce to text (repeatable)
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Text or markdown file source (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        /// Prompt template id (see `templates`)
        #[arg(long)]
        template: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,

        /// Write the article here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export a previously generated article (JSON file) to the CMS
    Publish {
        /// Path to the article JSON produced by `generate --format json`
        article: PathBuf,

        /// Publish immediately instead of creating a draft
        #[arg(long)]
        publish: bool,

        /// Category to assign, created on the CMS if missing (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Generate and attach a featured image
        #[arg(long)]
        image: bool,

        /// Prompt for the featured image (implies --image)
        #[arg(long)]
        image_prompt: Option<String>,
    },
    /// List the available prompt templates
    Templates,
    /// Check configuration and probe each configured service
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = copydesk_core::load_app_config()?;

    match cli.command {
        Commands::Generate {
            topic,
            texts,
            urls,
            files,
            template,
            format,
            out,
        } => {
            generate::run(
                &config,
                generate::GenerateArgs {
                    topic,
                    texts,
                    urls,
                    files,
                    template,
                    format,
                    out,
                },
            )
            .await
        }
        Commands::Publish {
            article,
            publish,
            categories,
            image,
            image_prompt,
        } => {
            publish::run(
                &config,
                publish::PublishArgs {
                    article,
                    publish,
                    categories,
                    image,
                    image_prompt,
                },
            )
            .await
        }
        Commands::Templates => {
            let registry = match &config.templates_path {
                Some(path) => copydesk_core::template::TemplateRegistry::load(path)?,
                None => copydesk_core::template::TemplateRegistry::builtin(),
            };
            for template in registry.list() {
                println!("{:<12} {}", template.id, template.name);
            }
            Ok(())
        }
        Commands::Doctor => doctor::run(&config).await,
    }
}
