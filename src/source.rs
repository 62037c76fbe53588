//! Document retrieval.
//!
//! The bulletin is usually fetched over HTTP. The municipal server blocks
//! some regions, so a request can be routed through the ScrapingBee proxy API
//! with a chosen exit country. Local files are supported for offline runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ProxyConfig;
use crate::detect::{is_pdf_bytes, looks_like_html};
use crate::error::{Error, Result};

/// ScrapingBee HTTP API endpoint.
pub const SCRAPINGBEE_ENDPOINT: &str = "https://app.scrapingbee.com/api/v1/";

/// Something that can produce the raw document bytes for a URL.
pub trait DocumentSource {
    /// Fetch the document.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP retrieval, optionally through the scraping proxy.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    proxy: Option<ProxyConfig>,
}

impl HttpSource {
    /// Direct retrieval.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            proxy: None,
        })
    }

    /// Route requests through the proxy when it names a country.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy.is_active().then_some(proxy);
        self
    }

    fn request(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let Some(proxy) = &self.proxy else {
            log::info!("Downloading {}", url);
            return Ok(self.client.get(url).send()?);
        };

        let api_key = proxy
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("Missing ScrapingBee API key".to_string()))?;
        let country = proxy.country_code.as_deref().unwrap_or_default();
        log::info!("Downloading {} through proxy ({})", url, country);

        let premium = if proxy.premium { "true" } else { "false" };
        Ok(self
            .client
            .get(SCRAPINGBEE_ENDPOINT)
            .query(&[
                ("api_key", api_key),
                ("url", url),
                ("country_code", country),
                ("premium_proxy", premium),
            ])
            .send()?)
    }
}

impl DocumentSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.request(url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Retrieval(format!("{} returned HTTP {}", url, status)));
        }

        let bytes = response.bytes()?.to_vec();
        if looks_like_html(&bytes) {
            return Err(Error::Retrieval(format!(
                "{} returned an HTML page instead of a document",
                url
            )));
        }

        if !is_pdf_bytes(&bytes) {
            log::warn!("{} did not start with a PDF header", url);
        }

        log::info!("Downloaded {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Reads a local file, ignoring the URL.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Read from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSource for FileSource {
    fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            Error::Retrieval(format!("cannot read {}: {}", self.path.display(), e))
        })
    }
}

/// File name component of a URL, used to name the local copy.
pub fn url_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    (!name.is_empty()).then_some(name)
}
