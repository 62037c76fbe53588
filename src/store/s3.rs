//! S3 (and S3-compatible) archive.

use std::path::Path;

use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::runtime::Runtime;

use super::archive::Archive;
use crate::config::S3Config;
use crate::error::{Error, Result};

/// Archive into an S3 bucket.
///
/// The client is async; uploads block on a private current-thread runtime
/// so the rest of the pipeline stays synchronous.
pub struct S3Archive {
    client: Client,
    bucket: String,
    runtime: Runtime,
}

impl S3Archive {
    /// Build a client for `config.bucket`. No request is made here.
    pub fn new(config: &S3Config) -> Result<Self> {
        let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key)
        else {
            return Err(Error::Config("S3 bucket given but no access key".to_string()));
        };

        let credentials = Credentials::new(
            key_id,
            secret,
            config.session_token.clone(),
            None,
            "felling",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .behavior_version_latest();

        if let Some(endpoint) = &config.endpoint {
            // S3-compatible services want path-style addressing.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            runtime,
        })
    }

    /// `s3://bucket/key`, for logs.
    pub fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

impl Archive for S3Archive {
    fn upload(&self, local: &Path, key: &str) -> Result<()> {
        if key.is_empty() || key.starts_with('/') {
            return Err(Error::Archive(format!("invalid archive key '{}'", key)));
        }

        let body = std::fs::read(local)
            .map_err(|e| Error::Archive(format!("cannot read {}: {}", local.display(), e)))?;
        log::info!("Uploading {} to {}", local.display(), self.location(key));

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send();
        self.runtime.block_on(request).map_err(|e| {
            Error::Archive(format!("{}: {}", self.location(key), DisplayErrorContext(&e)))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config::new("trees")
            .with_endpoint("http://127.0.0.1:9")
            .with_credentials("id", "secret")
    }

    #[test]
    fn test_client_built_offline() {
        let archive = S3Archive::new(&config()).unwrap();
        assert_eq!(archive.location("haifa/a.pdf"), "s3://trees/haifa/a.pdf");
    }

    #[test]
    fn test_missing_credentials() {
        let result = S3Archive::new(&S3Config::new("trees"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_bad_key_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = S3Archive::new(&config()).unwrap();

        let file = dir.path().join("a.csv");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(archive.upload(&file, "/a.csv"), Err(Error::Archive(_))));
        assert!(matches!(archive.upload(&file, ""), Err(Error::Archive(_))));

        let missing = dir.path().join("absent.csv");
        assert!(matches!(archive.upload(&missing, "a.csv"), Err(Error::Archive(_))));
    }
}
