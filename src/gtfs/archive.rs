//! The cached feed archive on disk.
//!
//! The archive is kept at `<cache_dir>/gtfs.zip` and aged by its
//! modification time. Downloads go to a sibling temp file that is renamed
//! into place, so a reader never sees a half-written archive.

use super::GtfsError;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use zip::ZipArchive;
use zip::result::ZipError;

pub const ARCHIVE_FILENAME: &str = "gtfs.zip";

/// Age of the archive, or `None` when it does not exist.
pub fn archive_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

pub fn needs_download(age: Option<Duration>, refresh: Duration) -> bool {
    age.is_none_or(|age| age > refresh)
}

/// Fetch `url` into `dest`. Redirects are followed by the client.
pub async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64, GtfsError> {
    info!(url, "downloading transit feed");
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(GtfsError::DownloadStatus(status.as_u16()));
    }
    let bytes = response.bytes().await?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = dest.with_extension("zip.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, dest).await?;

    info!(path = %dest.display(), bytes = bytes.len(), "transit feed saved");
    Ok(bytes.len() as u64)
}

/// Opened archive handing out tables as text.
pub struct FeedArchive {
    zip: ZipArchive<File>,
}

impl FeedArchive {
    pub fn open(path: &Path) -> Result<Self, GtfsError> {
        let zip = ZipArchive::new(File::open(path)?)?;
        debug!(path = %path.display(), entries = zip.len(), "feed archive opened");
        Ok(Self { zip })
    }

    /// Contents of `name`, or an empty table when the archive lacks it.
    pub fn table(&mut self, name: &str) -> Result<String, GtfsError> {
        let mut entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                debug!(table = name, "table missing from feed");
                return Ok(String::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        Ok(text)
    }
}
