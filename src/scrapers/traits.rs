use anyhow::Result;

/// A single browser session that can load pages and hand back their HTML.
///
/// Calls block the current thread until the page has loaded (or timed out),
/// so renderers are driven from blocking worker tasks, one renderer per task.
pub trait PageRenderer: Send + 'static {
    /// Load `url` and return the rendered HTML
    fn navigate(&mut self, url: &str) -> Result<String>;

    /// HTML of whatever page is currently loaded
    fn current_html(&mut self) -> Result<String>;

    /// Shut the session down. Called once, after the last navigation.
    fn close(&mut self) -> Result<()>;
}

/// Source of fresh renderer instances for planners and workers
pub trait RendererFactory: Send + Sync + 'static {
    type Renderer: PageRenderer;

    fn launch(&self) -> Result<Self::Renderer>;
}

impl<F, R> RendererFactory for F
where
    F: Fn() -> Result<R> + Send + Sync + 'static,
    R: PageRenderer,
{
    type Renderer = R;

    fn launch(&self) -> Result<R> {
        self()
    }
}
