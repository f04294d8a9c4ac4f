//! Field extraction for batdongsan.com.vn listing and detail pages.

use crate::error::{Result, ScrapeError};
use crate::models::{PropertyField, PropertyRecord};
use crate::scrapers::types::SiteSelectors;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// First latitude/longitude pair `pattern` finds in `content`
pub fn extract_coordinates(content: &str, pattern: &Regex) -> Option<(f64, f64)> {
    let caps = pattern.captures(content)?;
    let latitude = caps[1].parse().ok()?;
    let longitude = caps[2].parse().ok()?;
    Some((latitude, longitude))
}

/// Highest page number shown in the pagination control, or 1 if there is none
pub fn last_page_number(html: &str, selectors: &SiteSelectors) -> u32 {
    let document = Html::parse_document(html);

    let Some(pagination) = document.select(&selectors.pagination).next() else {
        debug!("No pagination control found");
        return 1;
    };

    pagination
        .select(&selectors.pagination_number)
        .filter_map(|item| element_text(&item).parse::<u32>().ok())
        .max()
        .unwrap_or(1)
}

/// Absolute detail-page URLs on a listing page, in document order, without repeats
pub fn extract_detail_links(html: &str, page_url: &str, selectors: &SiteSelectors) -> Vec<String> {
    let base = match Url::parse(page_url) {
        Ok(base) => base,
        Err(e) => {
            debug!(page_url, error = %e, "Listing page URL is not absolute");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selectors.detail_link) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(link) = base.join(href.trim()) else {
            debug!(href, "Skipping unresolvable link");
            continue;
        };
        let link = link.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

/// Build a `PropertyRecord` from a rendered detail page
pub fn extract_property(html: &str, url: &str, selectors: &SiteSelectors) -> Result<PropertyRecord> {
    if html.trim().is_empty() {
        return Err(ScrapeError::Extraction {
            url: url.to_string(),
            message: "page HTML is empty".to_string(),
        });
    }

    let document = Html::parse_document(html);
    let mut record = PropertyRecord::new(url);

    if let Some(specs) = document.select(&selectors.specs_block).next() {
        merge_pairs(&mut record, &specs, &selectors.specs_title, &selectors.specs_value);
    }

    if let Some(address) = document.select(&selectors.address).next() {
        let address = element_text(&address);
        if !address.is_empty() {
            record.set(PropertyField::Address.label(), address);
        }
    }

    if let Some(map) = document.select(&selectors.map_block).next() {
        let coordinates = extract_coordinates(&map.html(), &selectors.coordinates);
        if let Some((latitude, longitude)) = coordinates {
            record.latitude = Some(latitude);
            record.longitude = Some(longitude);
        }
    }

    // Shares keys with the specs block; whichever runs last wins.
    if let Some(info) = document.select(&selectors.short_info_block).next() {
        merge_pairs(
            &mut record,
            &info,
            &selectors.short_info_title,
            &selectors.short_info_value,
        );
    }

    Ok(record)
}

/// Zip title and value elements inside `block` and store each pair on the record
fn merge_pairs(record: &mut PropertyRecord, block: &ElementRef, titles: &Selector, values: &Selector) {
    for (title, value) in block.select(titles).zip(block.select(values)) {
        record.set(&element_text(&title), element_text(&value));
    }
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
