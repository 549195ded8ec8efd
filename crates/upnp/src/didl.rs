//! DIDL-Lite decoding of Browse results
//!
//! The `Result` field of a Browse response is a DIDL-Lite document carried as
//! escaped text. Each `<container>` or `<item>` child becomes a [`Node`]; the
//! `upnp:class` decides which variant it is.

use crate::xml::{self, XmlElement};
use alphasync_core::{ContainerNode, ItemNode, MediaClass, Node, ResourceVariants, TransportError};

const CONTAINER_CLASS: &str = "object.container";

/// Decode a Browse `Result` string.
///
/// `parent_title` is the title of the container that was browsed; decoded
/// items take it as their date key. An empty result decodes to no nodes.
pub fn decode(result: &str, parent_title: &str) -> Result<Vec<Node>, TransportError> {
    if result.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document = xml::parse(result)?;
    if document.local_name() != "DIDL-Lite" {
        return Err(TransportError::malformed(format!(
            "expected DIDL-Lite, found <{}>",
            document.name
        )));
    }

    document
        .children
        .iter()
        .filter(|entry| matches!(entry.local_name(), "container" | "item"))
        .map(|entry| decode_entry(entry, parent_title))
        .collect()
}

fn decode_entry(entry: &XmlElement, parent_title: &str) -> Result<Node, TransportError> {
    let id = entry
        .attr("id")
        .ok_or_else(|| TransportError::malformed(format!("<{}> without id", entry.name)))?
        .to_string();
    let parent_id = entry.attr("parentID").unwrap_or_default().to_string();
    let title = entry.child_text("dc:title").unwrap_or_default().to_string();

    let is_container = match entry.child_text("upnp:class") {
        Some(class) => class.starts_with(CONTAINER_CLASS),
        None => entry.local_name() == "container",
    };

    if is_container {
        let mut container = ContainerNode::new(id, parent_id, title);
        container.child_count = entry
            .attr("childCount")
            .and_then(|count| count.trim().parse().ok());
        return Ok(Node::Container(container));
    }

    let class = MediaClass::from_upnp_class(entry.child_text("upnp:class").unwrap_or_default());
    let variants = ResourceVariants::from_urls(entry.children_named("res").map(|res| res.text()));

    Ok(Node::Item(ItemNode {
        id,
        parent_id,
        title,
        class,
        date_key: parent_title.to_string(),
        date: entry.child_text("dc:date").map(str::to_string),
        variants,
    }))
}
