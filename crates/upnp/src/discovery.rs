//! Camera discovery: SSDP search followed by the service directory fetch
//!
//! `Discovery` resolves the device address and the four camera services that
//! later stages depend on.

use crate::device_description::parse_service_directory;
use crate::http;
use crate::ssdp::{SsdpSearch, UdpSsdpSocket};
use crate::xml::{self, XmlElement};
use alphasync_core::{
    Config, DeviceAddress, DeviceInfo, Error, Result, ServiceKind, ServiceSet, SsdpSocket,
};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

pub struct Discovery {
    http: Client,
    fallback_url: String,
    marker: String,
    discovered_location: Option<String>,
    address: Option<DeviceAddress>,
    device_info: DeviceInfo,
    services: ServiceSet,
}

impl Discovery {
    pub fn new(config: &Config) -> Result<Self> {
        let http = http::build_client(config.http.request_timeout())?;
        Ok(Self::with_client(http, &config.device.fallback_url, &config.ssdp.marker))
    }

    pub fn with_client(http: Client, fallback_url: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            http,
            fallback_url: fallback_url.into(),
            marker: marker.into(),
            discovered_location: None,
            address: None,
            device_info: DeviceInfo::default(),
            services: ServiceSet::default(),
        }
    }

    /// Search the local network for the camera over SSDP.
    ///
    /// On success the LOCATION URL replaces the fallback service directory URL.
    pub async fn ssdp(&mut self, wait_for: Duration, send_every: Duration) -> Result<DeviceAddress> {
        let socket = UdpSsdpSocket::bind()?;
        self.ssdp_with(socket, wait_for, send_every).await
    }

    /// [`Discovery::ssdp`] over a caller-supplied socket
    pub async fn ssdp_with<S: SsdpSocket>(
        &mut self,
        socket: S,
        wait_for: Duration,
        send_every: Duration,
    ) -> Result<DeviceAddress> {
        let mut search = SsdpSearch::new(wait_for, send_every, self.marker.clone());
        let response = search.run(socket).await?;

        self.discovered_location = Some(response.location);
        self.address = Some(response.address.clone());
        Ok(response.address)
    }

    /// URL the service directory will be fetched from
    pub fn service_directory_url(&self) -> &str {
        self.discovered_location
            .as_deref()
            .unwrap_or(&self.fallback_url)
    }

    /// Fetch the service directory and bind the camera services.
    ///
    /// Every sub-step failure is reported as `Error::Discovery` wrapping the cause.
    pub async fn discover_available_services(&mut self) -> Result<()> {
        let url = self.service_directory_url().to_string();
        info!("Discovering available services from {}", url);

        let (address, directory) = async {
            let address = DeviceAddress::from_url(&url)?;
            let document = self.request_xml(&url).await?;
            let directory = parse_service_directory(&document)?;
            Ok::<_, Error>((address, directory))
        }
        .await
        .map_err(Error::discovery)?;

        debug!("Service directory lists {} service(s)", directory.services.len());
        let services = ServiceSet::classify(directory.services);

        for kind in ServiceKind::ALL {
            match services.get(kind) {
                Some(service) => info!("{} control URL: {}", kind, address.url(&service.control_path)),
                None => debug!("{} not offered by device", kind),
            }
        }

        self.address = Some(address);
        self.device_info = directory.device;
        self.services = services;
        Ok(())
    }

    /// GET a URL and parse the body as XML
    pub async fn request_xml(&self, url: &str) -> Result<XmlElement> {
        let text = http::get_text(&self.http, url).await?;
        Ok(xml::parse(&text)?)
    }

    pub fn address(&self) -> Option<&DeviceAddress> {
        self.address.as_ref()
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn services(&self) -> &ServiceSet {
        &self.services
    }

    /// Absolute URL of a device path, once an address is known
    pub fn construct_url(&self, path: &str) -> Result<String> {
        let address = self
            .address
            .as_ref()
            .ok_or_else(|| Error::InvalidUrl(format!("no device address for {}", path)))?;
        Ok(address.url(path))
    }

    pub fn http_client(&self) -> &Client {
        &self.http
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphasync_core::DEFAULT_FALLBACK_URL;

    #[test]
    fn test_fallback_url_until_ssdp_succeeds() {
        let discovery = Discovery::new(&Config::default()).unwrap();
        assert_eq!(discovery.service_directory_url(), DEFAULT_FALLBACK_URL);
        assert!(discovery.address().is_none());
        assert!(discovery.construct_url("/dd.xml").is_err());
    }
}
