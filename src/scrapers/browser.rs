use crate::scrapers::traits::{PageRenderer, RendererFactory};
use crate::scrapers::types::RendererOptions;
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// Headless Chrome session with a single tab
pub struct ChromeRenderer {
    // Keeps the Chrome process alive for as long as the tab is in use
    _browser: Browser,
    tab: Arc<Tab>,
    options: RendererOptions,
}

impl ChromeRenderer {
    /// Launch a new Chrome process configured from `options`
    pub fn launch(options: RendererOptions) -> Result<Self> {
        debug!(headless = options.headless, "Launching Chrome...");

        let mut args: Vec<&OsStr> = Vec::new();
        if options.block_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }
        if options.incognito {
            args.push(OsStr::new("--incognito"));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .args(args)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(launch_options).context("Failed to launch Chrome browser")?;

        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(options.load_timeout);

        Ok(Self {
            _browser: browser,
            tab,
            options,
        })
    }
}

impl PageRenderer for ChromeRenderer {
    fn navigate(&mut self, url: &str) -> Result<String> {
        debug!(url, "Navigating");

        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("Timed out loading {}", url))?;

        thread::sleep(self.options.settle_delay);

        self.current_html()
    }

    fn current_html(&mut self) -> Result<String> {
        self.tab.get_content().context("Failed to read page HTML")
    }

    fn close(&mut self) -> Result<()> {
        self.tab.close(false).context("Failed to close tab")?;
        Ok(())
    }
}

/// Launches one `ChromeRenderer` per call, all sharing the same options
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    options: RendererOptions,
}

impl ChromeLauncher {
    pub fn new(options: RendererOptions) -> Self {
        Self { options }
    }
}

impl RendererFactory for ChromeLauncher {
    type Renderer = ChromeRenderer;

    fn launch(&self) -> Result<ChromeRenderer> {
        let renderer = ChromeRenderer::launch(self.options.clone())?;
        info!("Chrome instance ready");
        Ok(renderer)
    }
}
