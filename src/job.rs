use crate::config::ScrapeConfig;
use crate::error::Result;
use crate::models::{PageUrl, PropertyRecord};
use crate::scrapers::pagination::plan_pages;
use crate::scrapers::pool::WorkerPool;
use crate::scrapers::traits::RendererFactory;
use crate::scrapers::types::SiteSelectors;
use crate::sink::{ResultSink, SinkReport};
use std::sync::Arc;
use tracing::{error, info};

/// What a finished run hands back to its caller
#[derive(Debug)]
pub struct JobOutcome {
    /// Everything scraped, in no particular order
    pub records: Vec<PropertyRecord>,
    /// Where the dataset went; an `Err` here still leaves `records` intact
    pub report: Result<SinkReport>,
}

/// One end-to-end run: plan pages, crawl them, persist the dataset
pub struct ScrapeJob<F: RendererFactory> {
    config: ScrapeConfig,
    factory: Arc<F>,
    sink: ResultSink,
}

impl<F: RendererFactory> ScrapeJob<F> {
    pub fn new(config: ScrapeConfig, factory: F, sink: ResultSink) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
            sink,
        }
    }

    /// Run to completion.
    ///
    /// Page and item failures only shrink the result; the run itself fails
    /// for bad configuration or when no browser starts. Once the crawl has
    /// happened the records are always returned, and a failed local write
    /// shows up in `report`.
    pub async fn run(self) -> Result<JobOutcome> {
        self.config.validate()?;
        let selectors = Arc::new(SiteSelectors::compile(&self.config.profile)?);

        let pages = self.plan(Arc::clone(&selectors)).await?;
        info!(pages = pages.len(), "📄 Planned listing pages");

        let pool = {
            let factory = Arc::clone(&self.factory);
            let selectors = Arc::clone(&selectors);
            let workers = self.config.workers;
            tokio::task::spawn_blocking(move || WorkerPool::launch(&*factory, workers, selectors))
                .await??
        };
        info!(workers = pool.size(), "🚀 Browsers launched");

        let records = pool.run(pages).await;
        info!(records = records.len(), "Crawl finished");

        let report = self.sink.persist(&records).await;
        if let Err(e) = &report {
            error!(error = %e, records = records.len(), "Failed to persist dataset");
        }

        Ok(JobOutcome { records, report })
    }

    async fn plan(&self, selectors: Arc<SiteSelectors>) -> Result<Vec<PageUrl>> {
        let factory = Arc::clone(&self.factory);
        let base_urls = self.config.base_urls.clone();
        let max_pages = self.config.max_pages;

        let pages = tokio::task::spawn_blocking(move || {
            base_urls
                .iter()
                .flat_map(|base_url| plan_pages(&*factory, base_url, max_pages, &selectors))
                .collect::<Vec<PageUrl>>()
        })
        .await?;

        Ok(pages)
    }
}
