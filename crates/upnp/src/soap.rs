//! SOAP envelopes and action calls for UPnP control URLs

use crate::http::ensure_success;
use crate::xml::{self, escape_xml, XmlElement};
use alphasync_core::TransportError;
use reqwest::Client;
use tracing::debug;

/// Build a SOAP envelope for `action` with the given ordered arguments
pub fn envelope(service_type: &str, action: &str, args: &[(&str, String)]) -> String {
    let mut body = String::new();
    for (name, value) in args {
        body.push_str(&format!("<{name}>{}</{name}>", escape_xml(value)));
    }

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{service_type}">{body}</u:{action}></s:Body></s:Envelope>"#
    )
}

/// POST an action to a control URL and return its `<u:{action}Response>` element
pub async fn call(
    client: &Client,
    control_url: &str,
    service_type: &str,
    action: &str,
    args: &[(&str, String)],
) -> Result<XmlElement, TransportError> {
    let body = envelope(service_type, action, args);
    let soap_action = format!("\"{}#{}\"", service_type, action);

    debug!("Sending SOAP action {} to {}", soap_action, control_url);

    let response = client
        .post(control_url)
        .header("Content-Type", "text/xml")
        .header("SOAPACTION", soap_action)
        .body(body)
        .send()
        .await
        .map_err(|e| TransportError::request(control_url, e))?;

    let response = ensure_success(response, control_url)?;
    let text = response
        .text()
        .await
        .map_err(|e| TransportError::request(control_url, e))?;

    action_response(&xml::parse(&text)?, action)
}

/// Locate the action's response element inside a parsed envelope
pub fn action_response(envelope: &XmlElement, action: &str) -> Result<XmlElement, TransportError> {
    let body = envelope
        .child("Body")
        .ok_or_else(|| TransportError::malformed("SOAP envelope has no Body"))?;

    if let Some(fault) = body.child("Fault") {
        let reason = fault.child_text("faultstring").unwrap_or("unknown fault");
        return Err(TransportError::malformed(format!("SOAP fault: {}", reason)));
    }

    let expected = format!("{}Response", action);
    body.child(&expected)
        .cloned()
        .ok_or_else(|| TransportError::malformed(format!("SOAP Body has no {}", expected)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_escapes_arguments() {
        let xml = envelope(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "Browse",
            &[("ObjectID", "a&b".to_string()), ("Filter", "*".to_string())],
        );

        assert!(xml.contains(r#"<u:Browse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">"#));
        assert!(xml.contains("<ObjectID>a&amp;b</ObjectID><Filter>*</Filter>"));
        assert!(xml.ends_with("</u:Browse></s:Body></s:Envelope>"));
    }

    #[test]
    fn test_action_response_and_fault() {
        let ok = xml::parse(
            r#"<s:Envelope xmlns:s="x"><s:Body><u:BrowseResponse><Result/></u:BrowseResponse></s:Body></s:Envelope>"#,
        )
        .unwrap();
        assert_eq!(action_response(&ok, "Browse").unwrap().local_name(), "BrowseResponse");

        let fault = xml::parse(
            r#"<s:Envelope xmlns:s="x"><s:Body><s:Fault><faultstring>UPnPError</faultstring></s:Fault></s:Body></s:Envelope>"#,
        )
        .unwrap();
        match action_response(&fault, "Browse") {
            Err(TransportError::MalformedResponse(msg)) => assert!(msg.contains("UPnPError")),
            other => panic!("Expected SOAP fault, got {:?}", other),
        }
    }
}
