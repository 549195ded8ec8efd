//! End-to-end session against a mock camera: discovery, tree, sync, live view.

use alphasync_core::{Config, Error, ServiceKind};
use alphasync_sync::{CameraSession, SyncCancel};
use alphasync_upnp::xml::escape_xml;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn device_description(with_imaging: bool) -> String {
    let imaging = if with_imaging {
        r#"<service>
        <serviceType>urn:schemas-sony-com:service:DigitalImaging:1</serviceType>
        <serviceId>urn:schemas-sony-com:serviceId:DigitalImaging</serviceId>
        <SCPDURL>/DigitalImagingDesc.xml</SCPDURL>
        <controlURL>/upnp/control/DigitalImaging</controlURL>
        <eventSubURL></eventSubURL>
      </service>"#
    } else {
        ""
    };

    format!(
        r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <friendlyName>ILCE-6100</friendlyName>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
        <SCPDURL>/CdsDesc.xml</SCPDURL>
        <controlURL>/upnp/control/ContentDirectory</controlURL>
        <eventSubURL>/upnp/event/ContentDirectory</eventSubURL>
      </service>
      {imaging}
    </serviceList>
  </device>
</root>"#
    )
}

fn browse_response(entries: &str) -> String {
    let didl = format!(
        r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">{}</DIDL-Lite>"#,
        entries
    );
    format!(
        r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"><Result>{}</Result><NumberReturned>1</NumberReturned><TotalMatches>1</TotalMatches><UpdateID>1</UpdateID></u:BrowseResponse></s:Body></s:Envelope>"#,
        escape_xml(&didl)
    )
}

async fn mount_camera(server: &MockServer, with_imaging: bool) {
    Mock::given(method("GET"))
        .and(path("/dd.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(device_description(with_imaging)))
        .mount(server)
        .await;

    let day = r#"<container id="D1" parentID="0" restricted="1"><dc:title>2024-01-01</dc:title><upnp:class>object.container</upnp:class></container>"#;
    let photo = format!(
        r#"<item id="I1" parentID="D1" restricted="1"><dc:title>DSC00001.JPG</dc:title><upnp:class>object.item.imageItem.photo</upnp:class><res>{uri}/TN_DSC00001.JPG</res><res>{uri}/ORG_DSC00001.JPG</res></item>"#,
        uri = server.uri()
    );

    Mock::given(method("POST"))
        .and(path("/upnp/control/ContentDirectory"))
        .and(body_string_contains("<ObjectID>0</ObjectID>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(browse_response(day)))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upnp/control/ContentDirectory"))
        .and(body_string_contains("<ObjectID>D1</ObjectID>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(browse_response(&photo)))
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.device.fallback_url = format!("{}/dd.xml", server.uri());
    config
}

#[tokio::test]
async fn test_discover_tree_and_sync_by_date() {
    let server = MockServer::start().await;
    mount_camera(&server, false).await;
    Mock::given(method("GET"))
        .and(path("/ORG_DSC00001.JPG"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"original".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = CameraSession::new(config(&server)).unwrap();
    session.discover_available_services().await.unwrap();
    assert_eq!(
        session.discovery().device_info().friendly_name.as_deref(),
        Some("ILCE-6100")
    );

    let tree = session.generate_tree().await.unwrap();
    assert_eq!(tree.root.item_count(), 1);
    assert!(tree.index.contains("2024-01-01"));

    let dir = tempfile::tempdir().unwrap();
    let cancel = SyncCancel::new();
    assert!(session.sync_by_date(dir.path(), &cancel).await.unwrap());
    // Second run finds the file and skips it
    assert!(session.sync_by_date(dir.path(), &cancel).await.unwrap());

    let file = dir.path().join("2024-01-01").join("DSC00001.JPG");
    assert_eq!(std::fs::read(file).unwrap(), b"original");

    assert!(matches!(
        session.sync_date("2099-01-01", dir.path(), &cancel).await,
        Err(Error::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_sync_tree_writes_flat() {
    let server = MockServer::start().await;
    mount_camera(&server, false).await;
    Mock::given(method("GET"))
        .and(path("/ORG_DSC00001.JPG"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"original".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = CameraSession::new(config(&server)).unwrap();
    session.discover_available_services().await.unwrap();
    session.generate_tree().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    session.sync_tree(dir.path()).await.unwrap();
    assert!(dir.path().join("DSC00001.JPG").exists());
}

#[tokio::test]
async fn test_single_image_uses_last_size() {
    let server = MockServer::start().await;
    mount_camera(&server, true).await;

    let scpd = format!(
        r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <X_DigitalImagingDeviceInfo>
    <X_CurrentContent_URL>
      <X_CurrentContent_URL_URL>{uri}/liveview/small.jpg</X_CurrentContent_URL_URL>
      <X_CurrentContent_URL_URL>{uri}/liveview/large.jpg</X_CurrentContent_URL_URL>
    </X_CurrentContent_URL>
  </X_DigitalImagingDeviceInfo>
</scpd>"#,
        uri = server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/DigitalImagingDesc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(scpd))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/liveview/large.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"large".to_vec()))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/liveview/small.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = CameraSession::new(config(&server)).unwrap();
    session.discover_available_services().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let explicit = dir.path().join("shot.jpg");
    let saved = session.get_single_image(&explicit).await.unwrap();
    assert_eq!(saved, explicit);
    assert_eq!(std::fs::read(&saved).unwrap(), b"large");

    // A directory gets a time-stamped file name
    let saved = session.get_single_image(dir.path()).await.unwrap();
    assert_eq!(saved.parent(), Some(dir.path()));
    assert!(saved.extension().is_some_and(|ext| ext == "jpg"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"large");
}

#[tokio::test]
async fn test_single_image_requires_digital_imaging() {
    let server = MockServer::start().await;
    mount_camera(&server, false).await;

    let mut session = CameraSession::new(config(&server)).unwrap();
    session.discover_available_services().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        session.get_single_image(dir.path()).await,
        Err(Error::ServiceNotFound(ServiceKind::DigitalImaging))
    ));
}

#[tokio::test]
async fn test_failed_discovery_keeps_previous_stages_unusable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut session = CameraSession::new(config(&server)).unwrap();
    assert!(matches!(
        session.discover_available_services().await,
        Err(Error::Discovery(_))
    ));
    assert!(matches!(
        session.generate_tree().await,
        Err(Error::ServiceNotFound(ServiceKind::ContentDirectory))
    ));
}
