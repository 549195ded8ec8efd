//! Camera session: discovery, tree generation and sync chained together
//!
//! Each stage needs the previous one's output. Calling a stage early fails
//! with a typed error (`ServiceNotFound`, `TreeNotBuilt`) rather than doing
//! partial work.

use crate::cancel::SyncCancel;
use crate::engine::SyncEngine;
use alphasync_core::{
    Config, ContentTree, DeviceAddress, Error, Result, ServiceKind, SsdpSocket, TransportError,
};
use alphasync_upnp::{current_content_urls, http, ContentDirectoryClient, Discovery};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub struct CameraSession {
    config: Config,
    discovery: Discovery,
    content_directory: Option<ContentDirectoryClient>,
    tree: Option<ContentTree>,
    engine: SyncEngine,
}

impl CameraSession {
    pub fn new(config: Config) -> Result<Self> {
        let discovery = Discovery::new(&config)?;
        let engine = SyncEngine::new(&config)?;
        Ok(Self {
            config,
            discovery,
            content_directory: None,
            tree: None,
            engine,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn tree(&self) -> Option<&ContentTree> {
        self.tree.as_ref()
    }

    /// Locate the camera over SSDP
    pub async fn ssdp(&mut self, wait_for: Duration, send_every: Duration) -> Result<DeviceAddress> {
        self.discovery.ssdp(wait_for, send_every).await
    }

    /// [`CameraSession::ssdp`] over a caller-supplied socket
    pub async fn ssdp_with<S: SsdpSocket>(
        &mut self,
        socket: S,
        wait_for: Duration,
        send_every: Duration,
    ) -> Result<DeviceAddress> {
        self.discovery.ssdp_with(socket, wait_for, send_every).await
    }

    /// Resolve the camera services and prepare the Content Directory client
    pub async fn discover_available_services(&mut self) -> Result<()> {
        self.discovery.discover_available_services().await?;
        self.tree = None;

        self.content_directory = match self.discovery.services().content_directory.as_ref() {
            Some(service) => {
                let control_url = self.discovery.construct_url(&service.control_path)?;
                let http = http::build_client(self.config.http.browse_timeout())?;
                Some(ContentDirectoryClient::with_client(http, control_url))
            }
            None => None,
        };
        Ok(())
    }

    /// Build the Content Directory tree, replacing any previous one
    pub async fn generate_tree(&mut self) -> Result<&ContentTree> {
        let client = self
            .content_directory
            .as_ref()
            .ok_or(Error::ServiceNotFound(ServiceKind::ContentDirectory))?;

        let tree = client.generate_tree().await?;
        info!("Total items in tree: {}", tree.root.item_count());
        Ok(self.tree.insert(tree))
    }

    fn built_tree(&self) -> Result<&ContentTree> {
        self.tree.as_ref().ok_or(Error::TreeNotBuilt)
    }

    /// Download every photo in the tree flat into `dest`
    pub async fn sync_tree(&self, dest: &Path) -> Result<()> {
        let tree = self.built_tree()?;
        self.engine.download_all_from_container(&tree.root, dest).await
    }

    /// Sync the whole date index into `dest/<date>/`
    pub async fn sync_by_date(&self, dest: &Path, cancel: &SyncCancel) -> Result<bool> {
        let tree = self.built_tree()?;
        self.engine
            .download_all_from_date_index(dest, &tree.index, cancel)
            .await
    }

    /// Sync a single date folder into `dest/<date>/`
    pub async fn sync_date(&self, date: &str, dest: &Path, cancel: &SyncCancel) -> Result<bool> {
        let tree = self.built_tree()?;
        self.engine.download_date(date, dest, &tree.index, cancel).await
    }

    /// Save the camera's current live-view image.
    ///
    /// The Digital Imaging description lists the same photo at several
    /// sizes; the last entry is fetched. When `save_path` is an existing
    /// directory the file is named after the current local time.
    pub async fn get_single_image(&self, save_path: &Path) -> Result<PathBuf> {
        let service = self.discovery.services().require(ServiceKind::DigitalImaging)?;
        let url = self.discovery.construct_url(&service.description_path)?;

        let document = self.discovery.request_xml(&url).await?;
        let urls = current_content_urls(&document)?;
        let target = urls
            .last()
            .ok_or_else(|| TransportError::malformed("Digital Imaging description lists no image URLs"))?;
        debug!("Live-view image has {} size(s), using {}", urls.len(), target);

        let dest = match tokio::fs::metadata(save_path).await {
            Ok(meta) if meta.is_dir() => save_path.join(live_view_file_name()),
            _ => save_path.to_path_buf(),
        };

        self.engine.download_single(target, &dest).await?;
        Ok(dest)
    }
}

fn live_view_file_name() -> String {
    chrono::Local::now().format("%H-%M-%S.jpg").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_view_file_name_shape() {
        let name = live_view_file_name();
        assert_eq!(name.len(), "00-00-00.jpg".len());
        assert!(name.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_stages_require_predecessors() {
        let mut session = CameraSession::new(Config::default()).unwrap();
        let dest = Path::new("unused");
        let cancel = SyncCancel::new();

        assert!(matches!(
            session.generate_tree().await,
            Err(Error::ServiceNotFound(ServiceKind::ContentDirectory))
        ));
        assert!(matches!(session.sync_tree(dest).await, Err(Error::TreeNotBuilt)));
        assert!(matches!(session.sync_by_date(dest, &cancel).await, Err(Error::TreeNotBuilt)));
        assert!(matches!(
            session.sync_date("2024-01-01", dest, &cancel).await,
            Err(Error::TreeNotBuilt)
        ));
        assert!(matches!(
            session.get_single_image(dest).await,
            Err(Error::ServiceNotFound(ServiceKind::DigitalImaging))
        ));
    }
}
