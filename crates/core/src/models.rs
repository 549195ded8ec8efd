use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Object ID of the Content Directory root container
pub const ROOT_ID: &str = "0";

/// The camera services discovery knows how to bind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    ContentDirectory,
    ConnectionManager,
    XPushList,
    DigitalImaging,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::ContentDirectory,
        ServiceKind::ConnectionManager,
        ServiceKind::XPushList,
        ServiceKind::DigitalImaging,
    ];

    /// Substring of a `serviceId` identifying this service
    pub fn id_marker(&self) -> &'static str {
        match self {
            ServiceKind::ContentDirectory => "ContentDirectory",
            ServiceKind::ConnectionManager => "ConnectionManager",
            ServiceKind::XPushList => "XPushList",
            ServiceKind::DigitalImaging => "DigitalImaging",
        }
    }

    pub fn classify(service_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| service_id.contains(kind.id_marker()))
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id_marker())
    }
}

/// One `<service>` entry of the device's service directory
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service_type: String,
    pub service_id: String,
    pub control_path: String,
    pub event_sub_path: String,
    pub description_path: String,
}

/// The four service slots resolved by discovery
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ServiceSet {
    pub content_directory: Option<ServiceDescriptor>,
    pub connection_manager: Option<ServiceDescriptor>,
    pub x_push_list: Option<ServiceDescriptor>,
    pub digital_imaging: Option<ServiceDescriptor>,
}

impl ServiceSet {
    /// Bind each descriptor to its slot by `serviceId`.
    ///
    /// When several entries classify the same way the last one in list order
    /// wins. Entries matching none of the four kinds are ignored.
    pub fn classify<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = ServiceDescriptor>,
    {
        let mut set = ServiceSet::default();
        for descriptor in descriptors {
            if let Some(kind) = ServiceKind::classify(&descriptor.service_id) {
                *set.slot_mut(kind) = Some(descriptor);
            }
        }
        set
    }

    pub fn get(&self, kind: ServiceKind) -> Option<&ServiceDescriptor> {
        match kind {
            ServiceKind::ContentDirectory => self.content_directory.as_ref(),
            ServiceKind::ConnectionManager => self.connection_manager.as_ref(),
            ServiceKind::XPushList => self.x_push_list.as_ref(),
            ServiceKind::DigitalImaging => self.digital_imaging.as_ref(),
        }
    }

    /// Like [`ServiceSet::get`] but fails with `ServiceNotFound`
    pub fn require(&self, kind: ServiceKind) -> Result<&ServiceDescriptor> {
        self.get(kind).ok_or(Error::ServiceNotFound(kind))
    }

    fn slot_mut(&mut self, kind: ServiceKind) -> &mut Option<ServiceDescriptor> {
        match kind {
            ServiceKind::ContentDirectory => &mut self.content_directory,
            ServiceKind::ConnectionManager => &mut self.connection_manager,
            ServiceKind::XPushList => &mut self.x_push_list,
            ServiceKind::DigitalImaging => &mut self.digital_imaging,
        }
    }
}

/// Host and port every service call is addressed to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub host: String,
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Extract `host:port` from a URL such as `http://192.168.122.1:64321/dd.xml`.
    /// A missing port means 80.
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .trim()
            .strip_prefix("http://")
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
        let authority = rest.split('/').next().unwrap_or_default();

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidUrl(url.to_string()))?;
                (host, port)
            }
            None => (authority, 80),
        };

        if host.is_empty() {
            return Err(Error::InvalidUrl(url.to_string()));
        }

        Ok(Self::new(host, port))
    }

    /// Build an absolute URL for a path advertised by the device.
    /// Paths that are already absolute URLs are returned as-is.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("http://{}:{}{}", self.host, self.port, path)
        } else {
            format!("http://{}:{}/{}", self.host, self.port, path)
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Descriptive fields of the device description, all optional
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub udn: Option<String>,
}

/// Kind of a Content Directory item, from its `upnp:class`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Photo,
    Video,
    Other(String),
}

impl MediaClass {
    pub fn from_upnp_class(class: &str) -> Self {
        let class = class.trim();
        if class.starts_with("object.item.imageItem") {
            MediaClass::Photo
        } else if class.starts_with("object.item.videoItem") {
            MediaClass::Video
        } else {
            MediaClass::Other(class.to_string())
        }
    }
}

/// Size variant of an item resource, tagged by filename prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeTag {
    Thumbnail,
    Small,
    Large,
    Original,
}

impl SizeTag {
    pub fn prefix(&self) -> &'static str {
        match self {
            SizeTag::Thumbnail => "TN_",
            SizeTag::Small => "SM_",
            SizeTag::Large => "LRG_",
            SizeTag::Original => "ORG_",
        }
    }

    /// Tag a resource URL by substring; `None` for anything unrecognised
    pub fn classify(url: &str) -> Option<Self> {
        [SizeTag::Large, SizeTag::Original, SizeTag::Small, SizeTag::Thumbnail]
            .into_iter()
            .find(|tag| url.contains(tag.prefix()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVariants {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

impl ResourceVariants {
    /// Tag every URL; untagged URLs are dropped
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut variants = ResourceVariants::default();
        for url in urls {
            let url = url.into();
            if let Some(tag) = SizeTag::classify(&url) {
                variants.insert(tag, url);
            }
        }
        variants
    }

    /// Record `url` for `tag` unless that size already has one
    pub fn insert(&mut self, tag: SizeTag, url: String) {
        let slot = match tag {
            SizeTag::Thumbnail => &mut self.thumbnail,
            SizeTag::Small => &mut self.small,
            SizeTag::Large => &mut self.large,
            SizeTag::Original => &mut self.original,
        };
        if slot.is_none() {
            *slot = Some(url);
        }
    }

    pub fn get(&self, tag: SizeTag) -> Option<&str> {
        match tag {
            SizeTag::Thumbnail => self.thumbnail.as_deref(),
            SizeTag::Small => self.small.as_deref(),
            SizeTag::Large => self.large.as_deref(),
            SizeTag::Original => self.original.as_deref(),
        }
    }
}

/// A photo or video leaf of the Content Directory tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemNode {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    pub class: MediaClass,
    /// Title of the folder the item was listed under
    pub date_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub variants: ResourceVariants,
}

impl ItemNode {
    pub fn is_photo(&self) -> bool {
        self.class == MediaClass::Photo
    }

    pub fn original_url(&self) -> Option<&str> {
        self.variants.get(SizeTag::Original)
    }
}

/// A folder of the Content Directory tree, usually a capture date
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerNode {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u32>,
    pub children: Vec<Node>,
}

impl ContainerNode {
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            title: title.into(),
            child_count: None,
            children: Vec::new(),
        }
    }

    /// The synthetic root every tree hangs off
    pub fn root() -> Self {
        Self::new(ROOT_ID, "-1", "Root")
    }

    /// Number of items anywhere below this container
    pub fn item_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                Node::Container(container) => container.item_count(),
                Node::Item(_) => 1,
            })
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Container(ContainerNode),
    Item(ItemNode),
}

impl Node {
    pub fn is_container(&self) -> bool {
        matches!(self, Node::Container(_))
    }

    pub fn id(&self) -> &str {
        match self {
            Node::Container(container) => &container.id,
            Node::Item(item) => &item.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Node::Container(container) => &container.title,
            Node::Item(item) => &item.title,
        }
    }
}

/// Items grouped by the title of the leaf folder they were listed under
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateIndex {
    entries: BTreeMap<String, Vec<ItemNode>>,
}

impl DateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the item list for `date_key`, replacing any earlier list.
    /// Returns the replaced list.
    pub fn record(&mut self, date_key: impl Into<String>, items: Vec<ItemNode>) -> Option<Vec<ItemNode>> {
        self.entries.insert(date_key.into(), items)
    }

    pub fn get(&self, date_key: &str) -> Option<&[ItemNode]> {
        self.entries.get(date_key).map(Vec::as_slice)
    }

    pub fn contains(&self, date_key: &str) -> bool {
        self.entries.contains_key(date_key)
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ItemNode])> {
        self.entries
            .iter()
            .map(|(date, items)| (date.as_str(), items.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_items(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Output of one tree-generation pass
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContentTree {
    pub root: ContainerNode,
    pub index: DateIndex,
}
