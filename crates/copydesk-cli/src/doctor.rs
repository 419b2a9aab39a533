//! The `doctor` command: configuration sanity and service reachability.

use std::time::Duration;

use copydesk_core::AppConfig;

pub(crate) async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("environment: {}", config.env);
    println!("bind address: {}", config.bind_addr);
    println!(
        "limits/min: research {}, writer {}, image {}, publish {}",
        config.limits.research_per_minute,
        config.limits.writer_per_minute,
        config.limits.image_per_minute,
        config.limits.publish_per_minute
    );
    match &config.templates_path {
        Some(path) => match copydesk_core::template::TemplateRegistry::load(path) {
            Ok(registry) => println!(
                "templates: {} loaded from {}",
                registry.list().len(),
                path.display()
            ),
            Err(e) => println!("templates: FAILED to load {} ({e})", path.display()),
        },
        None => println!(
            "templates: {} built in",
            copydesk_core::template::TemplateRegistry::builtin().list().len()
        ),
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(config.user_agent.clone())
        .build()?;

    probe(&client, "research", Some(&config.research_url)).await;
    probe(&client, "writer", Some(&config.writer_url)).await;
    probe(&client, "image", config.image_url.as_deref()).await;
    probe(&client, "cms", config.cms_url.as_deref()).await;
    Ok(())
}

/// Any HTTP response counts as reachable; auth and routing are the
/// services' business, the doctor only checks the wire.
async fn probe(client: &reqwest::Client, name: &str, url: Option<&str>) {
    let Some(url) = url else {
        println!("{name}: not configured");
        return;
    };
    match client.get(url).send().await {
        Ok(response) => println!("{name}: reachable at {url} (HTTP {})", response.status()),
        Err(e) => println!("{name}: UNREACHABLE at {url} ({e})"),
    }
}
