use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use notice_monitor::extractor::{dedupe, extract};
use notice_monitor::fetch::{fetch_with_retry, FetchOptions, SiteFetcher};
use notice_monitor::models::SiteKey;
use notice_monitor::Config;

/// Fetch one configured site and print what would be extracted, without
/// touching state or Slack.
#[derive(Debug, Parser)]
#[command(name = "inspect")]
struct Cli {
    #[arg(short, long, default_value = "config/config.json")]
    config: PathBuf,

    /// Site name as written in the config
    site: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("notice_monitor=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let site = config.site(&cli.site).ok_or_else(|| {
        let known: Vec<_> = config.sites.iter().map(|s| s.name.as_str()).collect();
        anyhow!("unknown site '{}', configured: {}", cli.site, known.join(", "))
    })?;

    println!("Fetching {} ({})...", site.name, site.url);
    let fetcher = SiteFetcher::from_config(&config)?;
    let markup = fetch_with_retry(
        &fetcher,
        &site.url,
        &FetchOptions::for_site(site),
        config.fetch_attempts,
        config.fetch_retry_pause(),
    )
    .await?;
    println!("Received {} bytes", markup.len());

    let records = extract(&markup, site)?;
    let extracted = records.len();
    let records = dedupe(records);

    println!(
        "Site key {} | {} rows extracted, {} after dedupe\n",
        SiteKey::from_url(&site.url),
        extracted,
        records.len()
    );

    for (i, record) in records.iter().enumerate() {
        let pin = if record.is_pinned { " [pinned]" } else { "" };
        println!("{:>2}. {}{}", i + 1, record.title, pin);
        println!("    link:     {}", record.link);
        println!("    category: {}", record.category);
        println!("    date:     {}  views: {}", record.date, record.view_count);
        println!("    hash:     {}", record.fingerprint);
    }

    Ok(())
}
