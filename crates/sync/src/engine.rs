//! Downloads driven by the Content Directory tree or its date index

use crate::cancel::SyncCancel;
use alphasync_core::{Config, ContainerNode, DateIndex, Error, ItemNode, Node, Result, TransportError};
use alphasync_upnp::http;
use futures_util::StreamExt;
use reqwest::Client;
use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Longest wait for response headers or the next body chunk
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(50);

pub struct SyncEngine {
    http: Client,
    idle_timeout: Duration,
}

impl SyncEngine {
    /// Downloads may stream for as long as data keeps arriving; the
    /// configured request timeout bounds connecting and each stall.
    pub fn new(config: &Config) -> Result<Self> {
        let idle_timeout = config.http.request_timeout();
        let http = http::build_streaming_client(idle_timeout)?;
        Ok(Self::with_client(http).with_idle_timeout(idle_timeout))
    }

    pub fn with_client(http: Client) -> Self {
        Self {
            http,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Download `url` to `dest`, replacing whatever is there.
    ///
    /// The body is streamed to a `.part` sibling and renamed into place once
    /// complete, so an interrupted transfer never leaves a file under the
    /// final name.
    pub async fn download_single(&self, url: &str, dest: &Path) -> Result<()> {
        let partial = partial_path(dest)?;
        debug!(url = %url, dest = %dest.display(), "Downloading");

        remove_existing(dest).await?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let response = timeout(self.idle_timeout, http::get(&self.http, url))
            .await
            .map_err(|elapsed| TransportError::request(url, elapsed))??;
        let written = match stream_to_file(response, url, &partial, self.idle_timeout).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        fs::rename(&partial, dest).await?;

        info!(dest = %dest.display(), size = written, "Downloaded");
        Ok(())
    }

    /// Walk the tree depth-first and download the original of every photo
    /// directly into `dest`, flattening the folder structure.
    ///
    /// Existing files with the same name are overwritten. Videos are not
    /// fetched on this path.
    pub fn download_all_from_container<'a>(
        &'a self,
        container: &'a ContainerNode,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for child in &container.children {
                match child {
                    Node::Container(sub) => self.download_all_from_container(sub, dest).await?,
                    Node::Item(item) if item.is_photo() => {
                        let Some(name) = path_segment(&item.title) else {
                            warn!("Item {} has unusable title {:?}, not downloading", item.id, item.title);
                            continue;
                        };
                        match item.original_url() {
                            Some(url) => self.download_single(url, &dest.join(name)).await?,
                            None => warn!("{} has no original variant, not downloading", item.title),
                        }
                    }
                    Node::Item(item) => debug!("Tree walk skips non-photo {}", item.title),
                }
            }
            Ok(())
        })
    }

    /// Download every indexed item to `dest/<date>/<title>`, skipping files
    /// already present by name.
    ///
    /// `cancel` is checked after each item. Returns `false` when the walk
    /// stopped early because of it (the flag is cleared), `true` otherwise.
    pub async fn download_all_from_date_index(
        &self,
        dest: &Path,
        index: &DateIndex,
        cancel: &SyncCancel,
    ) -> Result<bool> {
        for (date, items) in index.iter() {
            if !self.download_date_items(date, items, dest, cancel).await? {
                return Ok(false);
            }
        }
        info!("Date index sync complete: {} date folder(s)", index.len());
        Ok(true)
    }

    /// Date-index sync restricted to a single date key
    pub async fn download_date(
        &self,
        date: &str,
        dest: &Path,
        index: &DateIndex,
        cancel: &SyncCancel,
    ) -> Result<bool> {
        let items = index
            .get(date)
            .ok_or_else(|| Error::RecordNotFound(date.to_string()))?;
        self.download_date_items(date, items, dest, cancel).await
    }

    async fn download_date_items(
        &self,
        date: &str,
        items: &[ItemNode],
        dest: &Path,
        cancel: &SyncCancel,
    ) -> Result<bool> {
        let Some(date_dir) = path_segment(date) else {
            warn!("Date folder {:?} is not a usable directory name, skipping it", date);
            return Ok(true);
        };
        let folder = dest.join(date_dir);
        let present = list_file_names(&folder).await?;
        info!(
            "Syncing {} item(s) for {} ({} already present)",
            items.len(),
            date,
            present.len()
        );

        for item in items {
            match path_segment(&item.title) {
                None => warn!("Item {} has unusable title {:?}, not downloading", item.id, item.title),
                Some(_) if present.contains(&item.title) => {
                    info!("{} already present in {}, skipping", item.title, date)
                }
                Some(name) => match item.original_url() {
                    Some(url) => self.download_single(url, &folder.join(name)).await?,
                    None => warn!("{} has no original variant, not downloading", item.title),
                },
            }

            if cancel.take() {
                warn!("Sync cancelled after {} in {}", item.title, date);
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// A camera-supplied name usable as a single path component under a sync
/// root: not empty, not absolute, not `.` or `..`, and free of separators.
fn path_segment(name: &str) -> Option<&Path> {
    if name.contains(['/', '\\']) {
        return None;
    }
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(path),
        _ => None,
    }
}

async fn stream_to_file(
    response: reqwest::Response,
    url: &str,
    path: &Path,
    idle_timeout: Duration,
) -> Result<u64> {
    let mut file = File::create(path).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    loop {
        let next = timeout(idle_timeout, stream.next())
            .await
            .map_err(|elapsed| TransportError::request(url, elapsed))?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(|e| TransportError::request(url, e))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

fn partial_path(dest: &Path) -> Result<PathBuf> {
    let name = dest.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("download destination {} has no file name", dest.display()),
        )
    })?;
    let mut partial = name.to_os_string();
    partial.push(".part");
    Ok(dest.with_file_name(partial))
}

async fn remove_existing(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await?,
        Ok(_) => fs::remove_file(path).await?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Names of the entries in `dir`; empty if it does not exist yet
async fn list_file_names(dir: &Path) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path() {
        let partial = partial_path(Path::new("/tmp/2024-01-01/DSC00001.JPG")).unwrap();
        assert_eq!(partial, PathBuf::from("/tmp/2024-01-01/DSC00001.JPG.part"));
        assert!(partial_path(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let names = list_file_names(&dir.path().join("missing")).await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_remove_existing_file_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        let sub = dir.path().join("b.jpg");
        std::fs::write(&file, b"x").unwrap();
        std::fs::create_dir_all(sub.join("nested")).unwrap();

        remove_existing(&file).await.unwrap();
        remove_existing(&sub).await.unwrap();
        remove_existing(&dir.path().join("none")).await.unwrap();

        assert!(!file.exists());
        assert!(!sub.exists());
    }
}
