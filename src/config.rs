//! Run configuration.
//!
//! Everything a run needs is passed in through [`Config`]; nothing is read
//! from process-wide state. The CLI fills it from flags and environment.

use std::path::{Path, PathBuf};

use crate::assemble::AssembleOptions;
use crate::error::{Error, Result};
use crate::parser::ParseOptions;
use crate::source::url_file_name;

/// Published location of the bulletin.
pub const DEFAULT_SOURCE_URL: &str = "http://www1.haifa.muni.il/trees/rptPirsum.pdf";

/// Appended to every street address before geocoding.
pub const DEFAULT_CITY_SUFFIX: &str = ", חיפה, ישראל";

/// Local file name used when the URL has none.
const FALLBACK_FILE_NAME: &str = "bulletin.pdf";

/// Scraping proxy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// ScrapingBee API key
    pub api_key: Option<String>,
    /// Exit country; the proxy is used only when this is set
    pub country_code: Option<String>,
    /// Use premium (residential) proxies
    pub premium: bool,
}

impl ProxyConfig {
    /// Whether requests should go through the proxy.
    pub fn is_active(&self) -> bool {
        self.country_code.is_some()
    }
}

/// Geocoding settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodingConfig {
    /// Google Maps Platform API key
    pub api_key: Option<String>,
    /// Column holding the street name
    pub street_column: String,
    /// Column holding the house number
    pub house_column: String,
    /// Appended to `"{street} {house}"`
    pub city_suffix: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            street_column: "רח".to_string(),
            house_column: "בית".to_string(),
            city_suffix: DEFAULT_CITY_SUFFIX.to_string(),
        }
    }
}

/// Region used when none is given.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// S3 bucket settings. An `endpoint` points the client at an S3-compatible
/// service such as MinIO.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl S3Config {
    /// Settings for `bucket` in the default region, without credentials.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_S3_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Archive destination: a local directory or an S3 bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Root directory of the archive (e.g. a mounted bucket)
    pub root: Option<PathBuf>,
    /// S3 bucket; exclusive with `root`
    pub s3: Option<S3Config>,
    /// Optional key prefix inside the archive
    pub prefix: Option<String>,
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where to fetch the bulletin
    pub source_url: String,
    /// Directory receiving the PDF and exports
    pub output_dir: PathBuf,
    /// Scraping proxy
    pub proxy: ProxyConfig,
    /// Geocoding enrichment
    pub geocoding: GeocodingConfig,
    /// Archival
    pub archive: ArchiveConfig,
    /// Page analysis
    pub parse: ParseOptions,
    /// Record assembly
    pub assemble: AssembleOptions,
    /// Fetch and parse even when a columnar file exists
    pub force_download: bool,
    /// Write the spreadsheet export
    pub save_spreadsheet: bool,
    /// Geocode addresses
    pub enrich: bool,
    /// Copy outputs to the archive
    pub upload: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            output_dir: std::env::temp_dir().join("felling"),
            proxy: ProxyConfig::default(),
            geocoding: GeocodingConfig::default(),
            archive: ArchiveConfig::default(),
            parse: ParseOptions::default(),
            assemble: AssembleOptions::default(),
            force_download: false,
            save_spreadsheet: true,
            enrich: false,
            upload: false,
        }
    }
}

impl Config {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bulletin URL.
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set proxy settings.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Set geocoding settings.
    pub fn with_geocoding(mut self, geocoding: GeocodingConfig) -> Self {
        self.geocoding = geocoding;
        self
    }

    /// Set archive settings.
    pub fn with_archive(mut self, archive: ArchiveConfig) -> Self {
        self.archive = archive;
        self
    }

    /// Set page analysis options.
    pub fn with_parse_options(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }

    /// Set assembly options.
    pub fn with_assemble_options(mut self, assemble: AssembleOptions) -> Self {
        self.assemble = assemble;
        self
    }

    /// Always fetch and parse, ignoring a cached columnar file.
    pub fn with_force_download(mut self, force: bool) -> Self {
        self.force_download = force;
        self
    }

    /// Enable or disable the spreadsheet export.
    pub fn with_spreadsheet(mut self, save: bool) -> Self {
        self.save_spreadsheet = save;
        self
    }

    /// Enable or disable geocoding.
    pub fn with_enrich(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    /// Enable or disable archival.
    pub fn with_upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }

    /// Local copy of the bulletin.
    pub fn pdf_path(&self) -> PathBuf {
        let name = url_file_name(&self.source_url).unwrap_or(FALLBACK_FILE_NAME);
        self.output_dir.join(name)
    }

    /// Parquet export, next to the PDF. Also the reuse cache.
    pub fn columnar_path(&self) -> PathBuf {
        self.pdf_path().with_extension("parquet")
    }

    /// Excel export, next to the PDF.
    pub fn spreadsheet_path(&self) -> PathBuf {
        self.pdf_path().with_extension("xlsx")
    }

    /// Reject combinations that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(Error::Config("source URL is empty".to_string()));
        }
        if self.proxy.is_active() && self.proxy.api_key.is_none() {
            return Err(Error::Config(
                "proxy country given but no ScrapingBee API key".to_string(),
            ));
        }
        if self.enrich && self.geocoding.api_key.is_none() {
            return Err(Error::Config(
                "enrichment requested but no geocoding API key".to_string(),
            ));
        }
        if self.archive.root.is_some() && self.archive.s3.is_some() {
            return Err(Error::Config(
                "archive root and S3 bucket are exclusive".to_string(),
            ));
        }
        if let Some(s3) = &self.archive.s3 {
            if s3.bucket.trim().is_empty() {
                return Err(Error::Config("S3 bucket name is empty".to_string()));
            }
            if s3.access_key_id.is_none() || s3.secret_access_key.is_none() {
                return Err(Error::Config(
                    "S3 bucket given but no access key".to_string(),
                ));
            }
        }
        if self.upload && self.archive.root.is_none() && self.archive.s3.is_none() {
            return Err(Error::Config(
                "upload requested but no archive root or S3 bucket".to_string(),
            ));
        }
        Ok(())
    }

    /// Output files that exist, in archival order.
    pub fn existing_outputs(&self) -> Vec<PathBuf> {
        [self.pdf_path(), self.columnar_path(), self.spreadsheet_path()]
            .into_iter()
            .filter(|p| Path::exists(p))
            .collect()
    }
}
