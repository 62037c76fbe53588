//! Archival of run outputs.
//!
//! Each file is stored twice: under a "latest" key that every run
//! overwrites, and under a date-partitioned backup key.

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use super::write_atomic;
use crate::error::{Error, Result};

/// Destination for archived files.
pub trait Archive {
    /// Copy `local` to `key`. Uploading the same file twice is harmless.
    fn upload(&self, local: &Path, key: &str) -> Result<()>;
}

/// An archive rooted at a local directory (a mounted bucket, a synced
/// folder).
#[derive(Debug, Clone)]
pub struct LocalArchive {
    root: PathBuf,
}

impl LocalArchive {
    /// Archive into `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where `key` lands on disk.
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(Error::Archive(format!("invalid archive key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

impl Archive for LocalArchive {
    fn upload(&self, local: &Path, key: &str) -> Result<()> {
        let target = self.resolve(key)?;
        log::info!("Archiving {} to {}", local.display(), target.display());

        let mut source = File::open(local)
            .map_err(|e| Error::Archive(format!("cannot read {}: {}", local.display(), e)))?;
        write_atomic(&target, |out| {
            io::copy(&mut source, out)?;
            Ok(())
        })
    }
}

/// The "latest" key and the dated backup key for a file.
///
/// ```
/// use chrono::NaiveDate;
/// use felling::store::archive_keys;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
/// let [latest, backup] = archive_keys("rptPirsum.pdf", Some("haifa"), date);
/// assert_eq!(latest, "haifa/rptPirsum.pdf");
/// assert_eq!(backup, "year=2024/month=3/day=7/haifa/rptPirsum.pdf");
/// ```
pub fn archive_keys(file_name: &str, prefix: Option<&str>, date: NaiveDate) -> [String; 2] {
    let latest = match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, file_name),
        None => file_name.to_string(),
    };
    let backup = format!(
        "year={}/month={}/day={}/{}",
        date.year(),
        date.month(),
        date.day(),
        latest
    );
    [latest, backup]
}

/// Upload each file under both of its keys; returns the keys written.
pub fn upload_outputs<A: Archive + ?Sized>(
    archive: &A,
    files: &[PathBuf],
    prefix: Option<&str>,
    date: NaiveDate,
) -> Result<Vec<String>> {
    let mut uploaded = Vec::new();
    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Archive(format!("no file name in {}", file.display())))?;

        for key in archive_keys(name, prefix, date) {
            archive.upload(file, &key)?;
            uploaded.push(key);
        }
    }
    Ok(uploaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 5).unwrap()
    }

    #[test]
    fn test_keys_without_prefix() {
        let [latest, backup] = archive_keys("a.csv", None, date());
        assert_eq!(latest, "a.csv");
        assert_eq!(backup, "year=2024/month=11/day=5/a.csv");
    }

    #[test]
    fn test_empty_prefix_ignored() {
        let [latest, _] = archive_keys("a.csv", Some("/"), date());
        assert_eq!(latest, "a.csv");
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let archive = LocalArchive::new("/bucket");
        assert!(archive.resolve("../etc/passwd").is_err());
        assert!(archive.resolve("/abs").is_err());
        assert_eq!(
            archive.resolve("x/y.pdf").unwrap(),
            PathBuf::from("/bucket/x/y.pdf")
        );
    }

    #[test]
    fn test_upload_twice_is_idempotent() {
        let src = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let file = src.path().join("a.csv");
        std::fs::write(&file, "x,y\n").unwrap();

        let archive = LocalArchive::new(root.path());
        for _ in 0..2 {
            let keys = upload_outputs(&archive, &[file.clone()], Some("p"), date()).unwrap();
            assert_eq!(keys.len(), 2);
        }

        let backup = root.path().join("year=2024/month=11/day=5/p/a.csv");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "x,y\n");
        assert_eq!(std::fs::read_to_string(root.path().join("p/a.csv")).unwrap(), "x,y\n");
    }
}
