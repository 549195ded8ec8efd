//! Content Directory Browse client and tree builder
//!
//! `generate_tree` walks the camera's folder hierarchy depth-first, one Browse
//! call at a time, and returns both the materialised tree and the date index.
//! The index is threaded through the recursion explicitly instead of living on
//! the client, so a build either completes or yields nothing.

use crate::didl;
use crate::http;
use crate::soap;
use alphasync_core::{
    ContainerNode, ContentTree, DateIndex, DeviceAddress, Node, Result, ServiceDescriptor,
    TransportError,
};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Service type the Browse action is addressed to
pub const CONTENT_DIRECTORY_URN: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowseFlag {
    DirectChildren,
    Metadata,
}

impl BrowseFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowseFlag::DirectChildren => "BrowseDirectChildren",
            BrowseFlag::Metadata => "BrowseMetadata",
        }
    }
}

/// Arguments of a Browse action
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseRequest {
    pub object_id: String,
    pub browse_flag: BrowseFlag,
    pub filter: String,
    pub starting_index: u32,
    /// Zero asks for every child
    pub requested_count: u32,
    pub sort_criteria: String,
}

impl BrowseRequest {
    /// List all direct children of `object_id`
    pub fn direct_children(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            browse_flag: BrowseFlag::DirectChildren,
            filter: "*".to_string(),
            starting_index: 0,
            requested_count: 0,
            sort_criteria: String::new(),
        }
    }

    pub fn starting_at(mut self, index: u32) -> Self {
        self.starting_index = index;
        self
    }

    fn to_args(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ObjectID", self.object_id.clone()),
            ("BrowseFlag", self.browse_flag.as_str().to_string()),
            ("Filter", self.filter.clone()),
            ("StartingIndex", self.starting_index.to_string()),
            ("RequestedCount", self.requested_count.to_string()),
            ("SortCriteria", self.sort_criteria.clone()),
        ]
    }
}

/// Decoded `BrowseResponse` body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseResponse {
    /// DIDL-Lite document, already unescaped
    pub result: String,
    pub number_returned: u32,
    pub total_matches: u32,
    pub update_id: String,
}

pub struct ContentDirectoryClient {
    http: Client,
    control_url: String,
}

impl ContentDirectoryClient {
    /// Create a client for the Content Directory `service` on the device at `address`
    pub fn new(address: &DeviceAddress, service: &ServiceDescriptor, browse_timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(
            http::build_client(browse_timeout)?,
            address.url(&service.control_path),
        ))
    }

    pub fn with_client(http: Client, control_url: impl Into<String>) -> Self {
        Self {
            http,
            control_url: control_url.into(),
        }
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    /// Issue one Browse action
    pub async fn browse(&self, request: &BrowseRequest) -> Result<BrowseResponse> {
        debug!(
            "Browse ObjectID={} StartingIndex={}",
            request.object_id, request.starting_index
        );

        let body = soap::call(
            &self.http,
            &self.control_url,
            CONTENT_DIRECTORY_URN,
            "Browse",
            &request.to_args(),
        )
        .await?;

        let result = body
            .child("Result")
            .ok_or_else(|| TransportError::malformed("BrowseResponse has no Result"))?
            .text()
            .to_string();
        let counter = |name: &str| {
            body.child_text(name)
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(0)
        };

        let response = BrowseResponse {
            result,
            number_returned: counter("NumberReturned"),
            total_matches: counter("TotalMatches"),
            update_id: body.child_text("UpdateID").unwrap_or_default().to_string(),
        };

        debug!(
            "Browse ObjectID={} returned {} of {}",
            request.object_id, response.number_returned, response.total_matches
        );
        Ok(response)
    }

    /// Browse and decode every direct child of a container.
    ///
    /// A single request normally returns everything; if the device reports
    /// more matches than it returned, the remainder is requested page by page.
    pub async fn browse_children(&self, object_id: &str, parent_title: &str) -> Result<Vec<Node>> {
        let mut children = Vec::new();
        let mut request = BrowseRequest::direct_children(object_id);

        loop {
            let response = self.browse(&request).await?;
            children.extend(didl::decode(&response.result, parent_title)?);

            let fetched = request
                .starting_index
                .checked_add(response.number_returned)
                .ok_or_else(|| {
                    TransportError::malformed(format!(
                        "Browse of {} returned more than {} children",
                        object_id,
                        u32::MAX
                    ))
                })?;
            if response.number_returned == 0 || fetched >= response.total_matches {
                break;
            }
            debug!("ObjectID={} has more children, continuing at {}", object_id, fetched);
            request = request.starting_at(fetched);
        }

        Ok(children)
    }

    /// Build the full container/item tree and its date index.
    ///
    /// Any Browse failure aborts the whole build.
    pub async fn generate_tree(&self) -> Result<ContentTree> {
        info!("Generating Content Directory tree from {}", self.control_url);

        let mut index = DateIndex::new();
        let root = self.expand(ContainerNode::root(), &mut index).await?;

        info!(
            "Content Directory tree complete: {} date folder(s), {} item(s)",
            index.len(),
            index.total_items()
        );
        Ok(ContentTree { root, index })
    }

    /// Populate `container` depth-first and hand it back fully built.
    ///
    /// Child containers are expanded before they are attached, so no container
    /// is ever observable with unpopulated children. A container listing items
    /// (or nothing at all) records its direct items under its own title.
    fn expand<'a>(
        &'a self,
        mut container: ContainerNode,
        index: &'a mut DateIndex,
    ) -> Pin<Box<dyn Future<Output = Result<ContainerNode>> + Send + 'a>> {
        Box::pin(async move {
            let children = self.browse_children(&container.id, &container.title).await?;
            let has_containers = children.iter().any(Node::is_container);

            let mut items = Vec::new();
            for child in children {
                match child {
                    Node::Container(sub) => {
                        let sub = self.expand(sub, index).await?;
                        container.children.push(Node::Container(sub));
                    }
                    Node::Item(item) => {
                        items.push(item.clone());
                        container.children.push(Node::Item(item));
                    }
                }
            }

            if !has_containers || !items.is_empty() {
                debug!("Indexed {} item(s) under {}", items.len(), container.title);
                if index.record(container.title.clone(), items).is_some() {
                    warn!("Date folder {} listed twice, keeping the latest listing", container.title);
                }
            }

            Ok(container)
        })
    }
}
