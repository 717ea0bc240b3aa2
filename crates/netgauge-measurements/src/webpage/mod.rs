//! Webpage download measurement.
//!
//! Downloads a page the way a browser roughly would: the page body
//! first, then every asset it references, all against one wall clock.
//! The aggregate byte count over the elapsed time is the reported
//! rate. A failed asset download is counted, not fatal; only the page
//! itself failing produces an error record.

mod assets;

pub use assets::extract_asset_urls;

use crate::traits::Measurement;
use crate::validate::validate_url;
use async_trait::async_trait;
use netgauge_common::error::Result;
use netgauge_common::results::{MeasurementError, Record, WebpageResult};
use netgauge_common::units::{NetworkUnit, StorageUnit, TimeUnit};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const BITS_PER_BYTE: f64 = 8.0;

pub(crate) const WEBPAGE_ERRORS: &[(&str, &str)] = &[
    ("webpage-err", "Webpage download encountered an unknown error."),
    ("webpage-timeout", "Webpage download timed out."),
];

/// Measures a full webpage download, assets included.
pub struct WebpageMeasurement {
    id: String,
    url: Url,
    timeout: Option<Duration>,
}

impl WebpageMeasurement {
    /// A `timeout_secs` of zero leaves the download unbounded.
    pub fn new(id: &str, url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            url: validate_url(url)?,
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    async fn download(&self) -> WebpageResult {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = match builder.build() {
            Ok(client) => client,
            Err(err) => return self.failure("webpage-err", err.to_string()),
        };

        let started = Instant::now();
        let page = match self.fetch_bytes(&client, self.url.clone()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let key = if err.is_timeout() {
                    "webpage-timeout"
                } else {
                    "webpage-err"
                };
                return self.failure(key, err.to_string());
            }
        };

        let body = String::from_utf8_lossy(&page);
        let asset_urls = extract_asset_urls(&self.url, &body);
        debug!(url = %self.url, assets = asset_urls.len(), "page fetched");

        let mut total_bytes = page.len();
        let mut failed_downloads = 0u32;
        for asset_url in &asset_urls {
            match self.fetch_bytes(&client, asset_url.clone()).await {
                Ok(bytes) => total_bytes += bytes.len(),
                Err(err) => {
                    warn!(asset = %asset_url, %err, "asset download failed");
                    failed_downloads += 1;
                }
            }
        }
        let elapsed = started.elapsed().as_secs_f64();

        WebpageResult {
            id: self.id.clone(),
            url: Some(self.url.to_string()),
            download_rate: Some(total_bytes as f64 * BITS_PER_BYTE / elapsed),
            download_rate_unit: Some(NetworkUnit::BitPerSecond),
            download_size: Some(total_bytes as f64),
            download_size_unit: Some(StorageUnit::Byte),
            asset_count: Some(asset_urls.len() as u32),
            failed_asset_downloads: Some(failed_downloads),
            elapsed_time: Some(elapsed),
            elapsed_time_unit: Some(TimeUnit::Second),
            errors: vec![],
        }
    }

    /// Body bytes of one GET. An error status is a failed download;
    /// the page byte count only includes what actually arrived.
    async fn fetch_bytes(
        &self,
        client: &reqwest::Client,
        url: Url,
    ) -> std::result::Result<Vec<u8>, reqwest::Error> {
        let response = client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    fn failure(&self, key: &str, traceback: String) -> WebpageResult {
        WebpageResult::failed(
            &self.id,
            Some(self.url.as_str()),
            MeasurementError::from_table(key, WEBPAGE_ERRORS, Some(traceback)),
        )
    }
}

#[async_trait]
impl Measurement for WebpageMeasurement {
    async fn measure(&self) -> Vec<Record> {
        vec![Record::Webpage(self.download().await)]
    }
}
