use crate::error::{Result, ScrapeError};
use crate::models::{PageUrl, PropertyRecord};
use crate::scrapers::batdongsan;
use crate::scrapers::traits::{PageRenderer, RendererFactory};
use crate::scrapers::types::SiteSelectors;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Split `items` across `workers` lists: item `i` goes to list `i % workers`.
///
/// Assignment is fixed up front. Listing pages with more detail links than
/// others are not rebalanced.
pub fn partition_round_robin<T: Clone>(items: &[T], workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut chunks = vec![Vec::new(); workers];
    for (i, item) in items.iter().enumerate() {
        chunks[i % workers].push(item.clone());
    }
    chunks
}

/// Record collection shared by every worker in a run
#[derive(Default)]
struct SharedResults {
    records: Mutex<Vec<PropertyRecord>>,
    visited: Mutex<HashSet<String>>,
}

impl SharedResults {
    /// Returns false if another worker (or this one) already took `url`
    fn claim(&self, url: &str) -> bool {
        lock(&self.visited).insert(url.to_string())
    }

    fn push(&self, record: PropertyRecord) {
        lock(&self.records).push(record);
    }

    fn take(&self) -> Vec<PropertyRecord> {
        std::mem::take(&mut *lock(&self.records))
    }
}

// A worker that panicked mid-append leaves a complete Vec/HashSet behind.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerStats {
    listing_pages: usize,
    failed_listing_pages: usize,
    records: usize,
    failed_details: usize,
}

/// Fixed set of browser sessions that crawl listing pages in parallel
pub struct WorkerPool<R: PageRenderer> {
    renderers: Vec<R>,
    selectors: Arc<SiteSelectors>,
}

impl<R: PageRenderer> WorkerPool<R> {
    /// Launch up to `workers` renderers.
    ///
    /// Instances that fail to start are logged and left out; the pool only
    /// errors when none start at all.
    pub fn launch<F>(factory: &F, workers: usize, selectors: Arc<SiteSelectors>) -> Result<Self>
    where
        F: RendererFactory<Renderer = R>,
    {
        let mut renderers = Vec::with_capacity(workers);
        let mut last_error = None;

        for worker in 0..workers.max(1) {
            match factory.launch() {
                Ok(renderer) => renderers.push(renderer),
                Err(e) => {
                    let message = format!("{:#}", e);
                    warn!(worker, error = %message, "Failed to launch browser");
                    last_error = Some(message);
                }
            }
        }

        if renderers.is_empty() {
            return Err(ScrapeError::NoRenderers(
                last_error.unwrap_or_else(|| "no workers requested".to_string()),
            ));
        }

        if renderers.len() < workers {
            warn!(
                requested = workers,
                launched = renderers.len(),
                "Running with fewer workers than requested"
            );
        }

        Ok(Self::from_renderers(renderers, selectors))
    }

    pub fn from_renderers(renderers: Vec<R>, selectors: Arc<SiteSelectors>) -> Self {
        Self {
            renderers,
            selectors,
        }
    }

    pub fn size(&self) -> usize {
        self.renderers.len()
    }

    /// Crawl every listing page and return all records, in no particular order.
    ///
    /// Blocks until every worker has finished its share, then closes all
    /// renderers.
    pub async fn run(self, pages: Vec<PageUrl>) -> Vec<PropertyRecord> {
        let workers = self.renderers.len();
        let chunks = partition_round_robin(&pages, workers);
        let shared = Arc::new(SharedResults::default());

        info!(workers, pages = pages.len(), "Starting workers");

        let mut set = JoinSet::new();
        for (worker, (mut renderer, chunk)) in self.renderers.into_iter().zip(chunks).enumerate() {
            let shared = Arc::clone(&shared);
            let selectors = Arc::clone(&self.selectors);

            set.spawn_blocking(move || {
                let stats = run_worker(worker, &mut renderer, &chunk, &selectors, &shared);
                info!(
                    worker,
                    listing_pages = stats.listing_pages,
                    failed_listing_pages = stats.failed_listing_pages,
                    records = stats.records,
                    failed_details = stats.failed_details,
                    "Worker finished"
                );
                renderer
            });
        }

        let mut finished = Vec::with_capacity(workers);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(renderer) => finished.push(renderer),
                Err(e) => error!(error = %e, "Worker task died"),
            }
        }

        close_all(finished).await;

        shared.take()
    }
}

fn run_worker<R: PageRenderer>(
    worker: usize,
    renderer: &mut R,
    pages: &[PageUrl],
    selectors: &SiteSelectors,
    shared: &SharedResults,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    for page in pages {
        stats.listing_pages += 1;

        let html = match renderer.navigate(&page.url) {
            Ok(html) => html,
            Err(e) => {
                let err = ScrapeError::render(&page.url, e);
                error!(worker, error = %err, "Skipping listing page");
                stats.failed_listing_pages += 1;
                continue;
            }
        };

        let links = batdongsan::extract_detail_links(&html, &page.url, selectors);
        info!(
            worker,
            url = %page.url,
            base_url = %page.base_url,
            page = page.index,
            links = links.len(),
            "Processing listing page"
        );

        for link in links {
            if !shared.claim(&link) {
                debug!(worker, url = %link, "Already visited");
                continue;
            }

            match scrape_detail(renderer, &link, selectors) {
                Ok(record) => {
                    shared.push(record);
                    stats.records += 1;
                }
                Err(e) => {
                    error!(worker, error = %e, "Skipping detail page");
                    stats.failed_details += 1;
                }
            }
        }
    }

    stats
}

fn scrape_detail<R: PageRenderer>(
    renderer: &mut R,
    url: &str,
    selectors: &SiteSelectors,
) -> Result<PropertyRecord> {
    let html = renderer
        .navigate(url)
        .map_err(|e| ScrapeError::render(url, e))?;
    batdongsan::extract_property(&html, url, selectors)
}

async fn close_all<R: PageRenderer>(renderers: Vec<R>) {
    let closed = tokio::task::spawn_blocking(move || {
        for mut renderer in renderers {
            if let Err(e) = renderer.close() {
                debug!(error = %e, "Ignoring browser close failure");
            }
        }
    })
    .await;

    if let Err(e) = closed {
        debug!(error = %e, "Ignoring browser teardown failure");
    }
}
