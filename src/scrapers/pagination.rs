use crate::error::{Result, ScrapeError};
use crate::models::PageUrl;
use crate::scrapers::batdongsan;
use crate::scrapers::traits::{PageRenderer, RendererFactory};
use crate::scrapers::types::SiteSelectors;
use tracing::{error, info, warn};
use url::Url;

/// Work out every listing page for `base_url`.
///
/// Never fails: when the page count can't be determined the plan degrades to
/// the base URL alone.
pub fn plan_pages<F: RendererFactory>(
    factory: &F,
    base_url: &str,
    max_pages: Option<u32>,
    selectors: &SiteSelectors,
) -> Vec<PageUrl> {
    match try_plan_pages(factory, base_url, max_pages, selectors) {
        Ok(pages) => {
            info!(base_url, pages = pages.len(), "Planned listing pages");
            pages
        }
        Err(e) => {
            error!(error = %e, "Falling back to a single page");
            vec![PageUrl {
                base_url: base_url.to_string(),
                index: 1,
                url: base_url.to_string(),
            }]
        }
    }
}

fn try_plan_pages<F: RendererFactory>(
    factory: &F,
    base_url: &str,
    max_pages: Option<u32>,
    selectors: &SiteSelectors,
) -> Result<Vec<PageUrl>> {
    let mut renderer = factory
        .launch()
        .map_err(|e| ScrapeError::planning(base_url, format!("{:#}", e)))?;

    let rendered = renderer.navigate(base_url);
    if let Err(e) = renderer.close() {
        warn!(error = %e, "Failed to close planning browser");
    }
    let html = rendered.map_err(|e| ScrapeError::planning(base_url, format!("{:#}", e)))?;

    let last_page = clamp_last_page(batdongsan::last_page_number(&html, selectors), max_pages);
    page_urls(base_url, last_page)
}

fn clamp_last_page(last_page: u32, max_pages: Option<u32>) -> u32 {
    match max_pages {
        Some(max) => last_page.min(max),
        None => last_page,
    }
}

/// URLs for pages `1..=last_page`, with page 1 being `base_url` untouched
pub fn page_urls(base_url: &str, last_page: u32) -> Result<Vec<PageUrl>> {
    (1..=last_page.max(1))
        .map(|index| {
            let url = if index == 1 {
                base_url.to_string()
            } else {
                page_url(base_url, index)?
            };
            Ok(PageUrl {
                base_url: base_url.to_string(),
                index,
                url,
            })
        })
        .collect()
}

/// Derive the URL of page `page` from a listing base URL.
///
/// An existing `p<digits>` path segment is replaced; otherwise `p<page>` is
/// appended to the path, which places it before any query string. Only the
/// path is rewritten: scheme, host, port, query and fragment are kept exactly
/// as written in `base_url`.
pub fn page_url(base_url: &str, page: u32) -> Result<String> {
    let parsed =
        Url::parse(base_url).map_err(|e| ScrapeError::planning(base_url, e.to_string()))?;
    if parsed.cannot_be_a_base() {
        return Err(ScrapeError::planning(base_url, "URL cannot have a path"));
    }

    let authority = base_url
        .find("://")
        .map(|i| i + 3)
        .ok_or_else(|| ScrapeError::planning(base_url, "URL has no authority"))?;
    let path_start = base_url[authority..]
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .map_or(base_url.len(), |i| authority + i);
    let path_end = base_url[path_start..]
        .find(|c: char| matches!(c, '?' | '#'))
        .map_or(base_url.len(), |i| path_start + i);

    let segment = format!("p{}", page);
    let mut segments: Vec<&str> = base_url[path_start..path_end]
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    match segments.iter_mut().find(|s| is_page_segment(s)) {
        Some(existing) => *existing = segment.as_str(),
        None => segments.push(segment.as_str()),
    }

    Ok(format!(
        "{}/{}{}",
        &base_url[..path_start],
        segments.join("/"),
        &base_url[path_end..]
    ))
}

fn is_page_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('p')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}
