use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

use super::{ListingFetcher, PageProber};
use crate::config::HttpConfig;
use crate::models::Listing;
use crate::utils::error::{AppError, Result};

/// Keys under which listing APIs commonly nest their array.
const LISTING_KEYS: &[&str] = &["deals", "listings", "items", "data", "results"];

pub fn build_client(config: &HttpConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

#[derive(Clone)]
pub struct HttpPageProber {
    client: Client,
}

impl HttpPageProber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageProber for HttpPageProber {
    async fn is_active(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(url = %url, status = %status, "Probed deal page");
                status.is_success()
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Deal page probe failed");
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct HttpListingFetcher {
    client: Client,
    retry_attempts: usize,
    retry_delay_ms: u64,
}

impl HttpListingFetcher {
    pub fn new(client: Client, config: &HttpConfig) -> Self {
        Self {
            client,
            retry_attempts: config.retry_attempts.max(1),
            retry_delay_ms: config.retry_delay_ms,
        }
    }

    /// Fetches with retries and reports the failure instead of swallowing it.
    pub async fn fetch_listings(&self, endpoint: &str) -> Result<Vec<Listing>> {
        let base = Url::parse(endpoint)
            .map_err(|e| AppError::validation(format!("invalid listing source '{}': {}", endpoint, e)))?;

        let strategy = ExponentialBackoff::from_millis(2)
            .factor((self.retry_delay_ms / 2).max(1))
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.retry_attempts - 1);

        let start = Instant::now();
        let body = Retry::spawn(strategy, || self.fetch_once(base.as_str())).await?;
        let listings = parse_listings(&body, &base);

        debug!(
            endpoint = %endpoint,
            count = listings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched listings"
        );
        Ok(listings)
    }

    async fn fetch_once(&self, endpoint: &str) -> Result<String> {
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| AppError::TransientIo(format!("GET {} failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::TransientIo(format!("GET {} returned {}", endpoint, status)));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::TransientIo(format!("reading {} failed: {}", endpoint, e)))
    }
}

#[async_trait]
impl ListingFetcher for HttpListingFetcher {
    async fn fetch(&self, endpoint: &str) -> Vec<Listing> {
        match self.fetch_listings(endpoint).await {
            Ok(listings) => listings,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Listing fetch failed, treating as empty");
                Vec::new()
            }
        }
    }
}

/// JSON bodies are read as listing arrays, anything else as an HTML page of links.
pub fn parse_listings(body: &str, base: &Url) -> Vec<Listing> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return listings_from_json(value, base);
        }
    }

    listings_from_html(body, base)
}

fn listings_from_json(value: Value, base: &Url) -> Vec<Listing> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => LISTING_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Listing>(item).ok())
        .map(|mut listing| {
            listing.title = collapse_whitespace(&listing.title);
            if let Some(absolute) = absolutize(base, &listing.url) {
                listing.url = absolute;
            }
            listing
        })
        .collect()
}

fn listings_from_html(body: &str, base: &Url) -> Vec<Listing> {
    let document = Html::parse_document(body);
    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(e) => {
            warn!(error = %e, "Invalid anchor selector");
            return Vec::new();
        }
    };

    let mut listings: Vec<Listing> = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
            continue;
        }

        let mut title = collapse_whitespace(&anchor.text().collect::<String>());
        if title.is_empty() {
            title = anchor.value().attr("title").map(collapse_whitespace).unwrap_or_default();
        }
        let Some(url) = absolutize(base, href) else {
            continue;
        };

        if title.is_empty() || listings.iter().any(|l| l.url == url) {
            continue;
        }
        listings.push(Listing::new(title, url));
    }

    listings
}

fn absolutize(base: &Url, href: &str) -> Option<String> {
    if href.trim().is_empty() {
        return None;
    }
    base.join(href.trim()).ok().map(|u| u.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
