//! Remote catalog access.

use std::time::Duration;

use log::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::{Error, FetchFailure, Result};

/// A remote source of three-line catalog text.
///
/// Implementations make exactly one attempt per call and never retry.
pub trait CatalogSource: Send + Sync {
    /// Text for a single catalog number.
    fn fetch_by_id(&self, norad_id: u32) -> std::result::Result<String, FetchFailure>;

    /// Text for the configured bulk group.
    fn fetch_group(&self) -> std::result::Result<String, FetchFailure>;
}

/// CelesTrak GP endpoint in TLE format, over blocking HTTP.
#[derive(Debug, Clone)]
pub struct CelestrakSource {
    client: reqwest::blocking::Client,
    url_template: String,
    group_url: String,
}

impl CelestrakSource {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url_template: config.catalog_url_template.clone(),
            group_url: config.group_url.clone(),
        })
    }

    pub fn url_for(&self, norad_id: u32) -> String {
        catalog_url(&self.url_template, norad_id)
    }

    fn get_text(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        debug!("[CelestrakSource] GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("[CelestrakSource] {} answered {}", url, status);
            return Err(FetchFailure::Status(status.as_u16()));
        }

        let text = response
            .text()
            .map_err(|e| FetchFailure::Transport(format!("Failed to read response: {}", e)))?;
        if text.trim().is_empty() {
            return Err(FetchFailure::EmptyBody);
        }
        Ok(text)
    }
}

impl CatalogSource for CelestrakSource {
    fn fetch_by_id(&self, norad_id: u32) -> std::result::Result<String, FetchFailure> {
        let url = self.url_for(norad_id);
        info!("[CelestrakSource] fetching elements for NORAD {}", norad_id);
        self.get_text(&url)
    }

    fn fetch_group(&self) -> std::result::Result<String, FetchFailure> {
        info!("[CelestrakSource] downloading catalog group {}", self.group_url);
        self.get_text(&self.group_url)
    }
}

/// Expand `{norad_id}` in a URL template.
pub fn catalog_url(template: &str, norad_id: u32) -> String {
    template.replace("{norad_id}", &norad_id.to_string())
}
