//! Typed views over the camera's UPnP description documents

use crate::xml::XmlElement;
use alphasync_core::{DeviceInfo, ServiceDescriptor, TransportError};

/// Contents of the service directory (`dd.xml`)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceDirectory {
    pub device: DeviceInfo,
    /// Raw service entries in document order
    pub services: Vec<ServiceDescriptor>,
}

/// Extract device metadata and the service list from a parsed device description.
///
/// Fails when the `root/device/serviceList` structure is missing, so that
/// callers never proceed with an undefined service list.
pub fn parse_service_directory(document: &XmlElement) -> Result<ServiceDirectory, TransportError> {
    if document.local_name() != "root" {
        return Err(TransportError::malformed(format!(
            "expected <root> device description, found <{}>",
            document.name
        )));
    }

    let device = document
        .child("device")
        .ok_or_else(|| TransportError::malformed("device description has no <device>"))?;
    let service_list = device
        .child("serviceList")
        .ok_or_else(|| TransportError::malformed("device description has no <serviceList>"))?;

    let services = service_list
        .children_named("service")
        .map(|service| {
            let field = |name: &str| service.child_text(name).unwrap_or_default().to_string();
            ServiceDescriptor {
                service_type: field("serviceType"),
                service_id: field("serviceId"),
                control_path: field("controlURL"),
                event_sub_path: field("eventSubURL"),
                description_path: field("SCPDURL"),
            }
        })
        .collect();

    let text = |name: &str| {
        device
            .child_text(name)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    Ok(ServiceDirectory {
        device: DeviceInfo {
            friendly_name: text("friendlyName"),
            manufacturer: text("manufacturer"),
            model_name: text("modelName"),
            udn: text("UDN"),
        },
        services,
    })
}

/// Same-photo size variants listed by the Digital Imaging description,
/// smallest first.
pub fn current_content_urls(document: &XmlElement) -> Result<Vec<String>, TransportError> {
    let urls = document
        .path(&["X_DigitalImagingDeviceInfo", "X_CurrentContent_URL"])
        .ok_or_else(|| TransportError::malformed("Digital Imaging description has no X_CurrentContent_URL"))?
        .children_named("X_CurrentContent_URL_URL")
        .map(|url| url.text().to_string())
        .filter(|url| !url.is_empty())
        .collect();

    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse;

    const DEVICE_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0" xmlns:dlna="urn:schemas-dlna-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>ILCE-6100</friendlyName>
    <manufacturer>Sony Corporation</manufacturer>
    <modelName>SonyImagingDevice</modelName>
    <UDN>uuid:00000000-0000-0010-8000-d44da4ab1abb</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
        <SCPDURL>/CdsDesc.xml</SCPDURL>
        <controlURL>/upnp/control/ContentDirectory</controlURL>
        <eventSubURL>/upnp/event/ContentDirectory</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-sony-com:service:DigitalImaging:1</serviceType>
        <serviceId>urn:schemas-sony-com:serviceId:DigitalImaging</serviceId>
        <SCPDURL>/DigitalImagingDesc.xml</SCPDURL>
        <controlURL>/upnp/control/DigitalImaging</controlURL>
        <eventSubURL></eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    #[test]
    fn test_parse_service_directory() {
        let directory = parse_service_directory(&parse(DEVICE_XML).unwrap()).unwrap();

        assert_eq!(directory.device.friendly_name.as_deref(), Some("ILCE-6100"));
        assert_eq!(directory.device.model_name.as_deref(), Some("SonyImagingDevice"));
        assert_eq!(directory.services.len(), 2);

        let cds = &directory.services[0];
        assert_eq!(cds.service_id, "urn:upnp-org:serviceId:ContentDirectory");
        assert_eq!(cds.control_path, "/upnp/control/ContentDirectory");
        assert_eq!(cds.description_path, "/CdsDesc.xml");
        assert_eq!(directory.services[1].event_sub_path, "");
    }

    #[test]
    fn test_missing_service_list_is_malformed() {
        let xml = "<root><device><friendlyName>x</friendlyName></device></root>";
        let result = parse_service_directory(&parse(xml).unwrap());
        assert!(matches!(result, Err(TransportError::MalformedResponse(_))));
    }

    #[test]
    fn test_current_content_urls() {
        let xml = r#"<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <X_DigitalImagingDeviceInfo>
    <X_CurrentContent_URL>
      <X_CurrentContent_URL_URL>http://192.168.122.1:60152/SM_live.JPG</X_CurrentContent_URL_URL>
      <X_CurrentContent_URL_URL>http://192.168.122.1:60152/LRG_live.JPG</X_CurrentContent_URL_URL>
    </X_CurrentContent_URL>
  </X_DigitalImagingDeviceInfo>
</scpd>"#;

        let urls = current_content_urls(&parse(xml).unwrap()).unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls.last().unwrap(), "http://192.168.122.1:60152/LRG_live.JPG");
    }
}
