//! Minimal XML element tree built with quick-xml
//!
//! UPnP documents are small, so they are parsed eagerly into an owned tree
//! and then walked by local (namespace-stripped) element names.

use alphasync_core::TransportError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `dc:title`
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

impl XmlElement {
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// First child with the given local name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        let name = local(name);
        self.children.iter().find(|c| c.local_name() == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        let name = local(name);
        self.children.iter().filter(move |c| c.local_name() == name)
    }

    /// Follow a chain of child names from this element
    pub fn path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |element, name| element.child(name))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        let name = local(name);
        self.attributes
            .iter()
            .find(|(key, _)| local(key) == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(XmlElement::text)
    }
}

/// Parse a document and return its root element
pub fn parse(xml: &str) -> Result<XmlElement, TransportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from(&e)?),
            Ok(Event::Empty(e)) => {
                let element = element_from(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| TransportError::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| TransportError::Xml(e.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TransportError::Xml(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(TransportError::Xml(format!("unclosed element <{}>", open.name)));
    }

    root.ok_or_else(|| TransportError::Xml("document has no root element".to_string()))
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, TransportError> {
    let mut element = XmlElement {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Default::default()
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| TransportError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| TransportError::Xml(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Escape XML special characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_with_namespaces() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
      <Result>&lt;DIDL-Lite&gt;&lt;/DIDL-Lite&gt;</Result>
      <NumberReturned>1</NumberReturned>
    </u:BrowseResponse>
  </s:Body>
</s:Envelope>"#;

        let root = parse(xml).unwrap();
        assert_eq!(root.name, "s:Envelope");
        assert_eq!(root.local_name(), "Envelope");

        let response = root.path(&["Body", "BrowseResponse"]).unwrap();
        assert_eq!(response.child_text("Result"), Some("<DIDL-Lite></DIDL-Lite>"));
        assert_eq!(response.child_text("NumberReturned"), Some("1"));
    }

    #[test]
    fn test_attributes_and_empty_elements() {
        let root = parse(r#"<c id="7" parentID="0" restricted="1"><res/><res>x &amp; y</res></c>"#).unwrap();

        assert_eq!(root.attr("id"), Some("7"));
        assert_eq!(root.attr("parentID"), Some("0"));
        assert_eq!(root.children_named("res").count(), 2);
        assert_eq!(root.children[1].text(), "x & y");
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(parse("<a><b></a>"), Err(TransportError::Xml(_))));
        assert!(matches!(parse("<a>"), Err(TransportError::Xml(_))));
        assert!(matches!(parse(""), Err(TransportError::Xml(_))));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("Hello & <World>"), "Hello &amp; &lt;World&gt;");
        assert_eq!(escape_xml("It's \"quoted\""), "It&apos;s &quot;quoted&quot;");
    }
}
