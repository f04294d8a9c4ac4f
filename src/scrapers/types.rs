use crate::error::{Result, ScrapeError};
use regex::Regex;
use scraper::Selector;
use std::time::Duration;

/// Browser launch and navigation settings
#[derive(Debug, Clone)]
pub struct RendererOptions {
    pub headless: bool,
    pub block_images: bool,
    pub incognito: bool,
    /// Upper bound on a single page load
    pub load_timeout: Duration,
    /// Fixed pause after every navigation before the HTML is read
    pub settle_delay: Duration,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            headless: true,
            block_images: true,
            incognito: true,
            load_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// CSS selectors describing where the listing site keeps each piece of data
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub pagination: String,
    pub pagination_number: String,
    pub detail_link: String,
    pub specs_block: String,
    pub specs_title: String,
    pub specs_value: String,
    pub address: String,
    pub map_block: String,
    pub short_info_block: String,
    pub short_info_title: String,
    pub short_info_value: String,
    /// Regex with latitude and longitude capture groups, matched against the map block's HTML
    pub coordinates: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            pagination: "div.re__pagination".to_string(),
            pagination_number: "a.re__pagination-number".to_string(),
            detail_link: ".js__product-link-for-product-id".to_string(),
            specs_block: "div.re__pr-specs-content.js__other-info".to_string(),
            specs_title: "span.re__pr-specs-content-item-title".to_string(),
            specs_value: "span.re__pr-specs-content-item-value".to_string(),
            address: "span.re__pr-short-description.js__pr-address".to_string(),
            map_block: "div.re__section.re__pr-map.js__section.js__li-other".to_string(),
            short_info_block: "div.re__pr-short-info.re__pr-config.js__pr-config".to_string(),
            short_info_title: "span.title".to_string(),
            short_info_value: "span.value".to_string(),
            coordinates: r"place\?q=([-+]?\d*\.\d+),([-+]?\d*\.\d+)".to_string(),
        }
    }
}

/// A `SiteProfile` with every selector and pattern parsed once up front
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub pagination: Selector,
    pub pagination_number: Selector,
    pub detail_link: Selector,
    pub specs_block: Selector,
    pub specs_title: Selector,
    pub specs_value: Selector,
    pub address: Selector,
    pub map_block: Selector,
    pub short_info_block: Selector,
    pub short_info_title: Selector,
    pub short_info_value: Selector,
    pub coordinates: Regex,
}

impl SiteSelectors {
    pub fn compile(profile: &SiteProfile) -> Result<Self> {
        Ok(Self {
            pagination: parse_selector(&profile.pagination)?,
            pagination_number: parse_selector(&profile.pagination_number)?,
            detail_link: parse_selector(&profile.detail_link)?,
            specs_block: parse_selector(&profile.specs_block)?,
            specs_title: parse_selector(&profile.specs_title)?,
            specs_value: parse_selector(&profile.specs_value)?,
            address: parse_selector(&profile.address)?,
            map_block: parse_selector(&profile.map_block)?,
            short_info_block: parse_selector(&profile.short_info_block)?,
            short_info_title: parse_selector(&profile.short_info_title)?,
            short_info_value: parse_selector(&profile.short_info_value)?,
            coordinates: parse_pattern(&profile.coordinates)?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::Config(format!("invalid selector '{}': {:?}", css, e)))
}

fn parse_pattern(pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern)
        .map_err(|e| ScrapeError::Config(format!("invalid pattern '{}': {}", pattern, e)))?;
    if regex.captures_len() < 3 {
        return Err(ScrapeError::Config(format!(
            "pattern '{}' needs latitude and longitude capture groups",
            pattern
        )));
    }
    Ok(regex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_compiles() {
        assert!(SiteSelectors::compile(&SiteProfile::default()).is_ok());
    }

    #[test]
    fn bad_selector_is_a_config_error() {
        let profile = SiteProfile {
            detail_link: "a[[".to_string(),
            ..SiteProfile::default()
        };
        match SiteSelectors::compile(&profile) {
            Err(ScrapeError::Config(msg)) => assert!(msg.contains("a[[")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn bad_coordinate_pattern_is_a_config_error() {
        for pattern in ["place\\?q=([-+", r"place\?q=([\d.]+)"] {
            let profile = SiteProfile {
                coordinates: pattern.to_string(),
                ..SiteProfile::default()
            };
            assert!(matches!(
                SiteSelectors::compile(&profile),
                Err(ScrapeError::Config(_))
            ));
        }
    }
}
