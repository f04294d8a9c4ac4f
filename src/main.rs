mod config;
mod error;
mod job;
mod models;
mod scrapers;
mod sink;

use clap::Parser;
use config::{Cli, GcsAuth, ScrapeConfig};
use job::ScrapeJob;
use models::PropertyField;
use scrapers::ChromeLauncher;
use sink::{Credentials, GcsStore, ResultSink, UploadStatus};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let json_path = cli.json.clone();
    let config = ScrapeConfig::from_cli(cli)?;

    info!("🏠 Property Scout - batdongsan.com.vn scraper");
    info!("=============================================");
    info!(
        urls = config.base_urls.len(),
        workers = config.workers,
        max_pages = ?config.max_pages,
        "Starting scrape"
    );

    let mut sink = ResultSink::new(&config.output_dir);
    if let Some(gcs) = &config.storage {
        let credentials = match &gcs.auth {
            GcsAuth::Token(token) => Credentials::Token(token.clone()),
            GcsAuth::ServiceAccount(key_file) => Credentials::service_account(key_file)?,
        };
        let mut store = GcsStore::new(&gcs.bucket, credentials)?;
        if let Some(endpoint) = &gcs.endpoint {
            store = store.with_endpoint(endpoint);
        }
        sink = sink.with_store(Arc::new(store), gcs.prefix.clone());
    }

    let launcher = ChromeLauncher::new(config.renderer.clone());
    let outcome = ScrapeJob::new(config, launcher, sink).run().await?;

    // Display results
    info!("✅ Scraped {} properties", outcome.records.len());

    for (i, record) in outcome.records.iter().enumerate() {
        let show = |field: PropertyField| record.field(field).unwrap_or("-");
        println!("{}. {} ({})", i + 1, show(PropertyField::Address), show(PropertyField::Price));
        println!(
            "   {} | {} phòng ngủ | {}",
            show(PropertyField::Area),
            show(PropertyField::Bedrooms),
            show(PropertyField::LegalStatus)
        );
        if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
            println!("   Location: {}, {}", lat, lon);
        }
        println!("   URL: {}", record.url);
        println!();
    }

    if let Some(path) = json_path {
        let json = serde_json::to_string_pretty(&outcome.records)?;
        if let Err(e) = tokio::fs::write(&path, json).await {
            error!(path = %path.display(), error = %e, "Failed to write JSON copy");
        } else {
            info!("💾 Saved JSON copy to {}", path.display());
        }
    }

    let report = outcome.report?;
    info!("💾 Data saved locally in {}", report.local_path.display());
    match &report.upload {
        UploadStatus::Skipped => {}
        UploadStatus::Uploaded { key } => info!("☁️ Data uploaded to Cloud Storage as {}", key),
        UploadStatus::Failed { key, message } => {
            warn!("Upload of {} failed: {}", key, message)
        }
    }

    Ok(())
}
