//! UPnP plumbing for talking to the camera's media server
//!
//! This crate provides:
//! - SSDP search for the camera (`ssdp`)
//! - Service directory fetch and classification (`discovery`, `device_description`)
//! - SOAP envelopes and action calls (`soap`)
//! - DIDL-Lite decoding of Browse results (`didl`)
//! - The recursive Content Directory tree builder (`content_directory`)
//! - A small XML tree parser on top of quick-xml (`xml`)

pub mod content_directory;
pub mod device_description;
pub mod didl;
pub mod discovery;
pub mod http;
pub mod soap;
pub mod ssdp;
pub mod xml;

pub use content_directory::{BrowseFlag, BrowseRequest, BrowseResponse, ContentDirectoryClient};
pub use device_description::{current_content_urls, parse_service_directory, ServiceDirectory};
pub use discovery::Discovery;
pub use ssdp::{SearchState, SsdpResponse, SsdpSearch, UdpSsdpSocket, M_SEARCH, SSDP_MULTICAST_ADDR};
pub use xml::XmlElement;
