//! XMP packet reading and writing.
//!
//! Only the handful of properties photo managers use for culling are
//! understood: `xmp:Rating`, `xmp:Label`, `dc:description` and `dc:subject`.
//! Properties are matched by namespace URI and local name, so documents
//! that bind different prefixes still read correctly. Both the element form
//! and the attribute-on-`rdf:Description` form are accepted.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use super::SidecarDocument;

/// `x:` namespace of the packet wrapper.
pub const NS_ADOBE_META: &str = "adobe:ns:meta/";
/// RDF syntax namespace.
pub const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
/// XMP basic namespace (`Rating`, `Label`).
pub const NS_XMP: &str = "http://ns.adobe.com/xap/1.0/";
/// Dublin Core namespace (`description`, `subject`).
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";

const TOOLKIT: &str = concat!("photo-critic ", env!("CARGO_PKG_VERSION"));

/// Raw property values found in a packet, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmpFields {
    /// Text of `xmp:Rating`.
    pub rating: Option<String>,
    /// Text of `xmp:Label`.
    pub label: Option<String>,
    /// The `x-default` (or first) alternative of `dc:description`.
    pub description: Option<String>,
    /// Items of the `dc:subject` bag.
    pub subjects: Vec<String>,
}

/// Serialize a sidecar document as an XMP packet.
pub fn write(doc: &SidecarDocument) -> String {
    let mut out = String::with_capacity(1024);

    out.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    out.push_str(&format!(
        "<x:xmpmeta xmlns:x=\"{NS_ADOBE_META}\" x:xmptk=\"{TOOLKIT}\">\n"
    ));
    out.push_str(&format!(" <rdf:RDF xmlns:rdf=\"{NS_RDF}\">\n"));
    out.push_str("  <rdf:Description rdf:about=\"\"\n");
    out.push_str(&format!("    xmlns:xmp=\"{NS_XMP}\"\n"));
    out.push_str(&format!("    xmlns:dc=\"{NS_DC}\">\n"));

    out.push_str(&format!("   <xmp:Rating>{}</xmp:Rating>\n", doc.rating));
    out.push_str(&format!("   <xmp:Label>{}</xmp:Label>\n", escape(&doc.label)));

    out.push_str("   <dc:description>\n    <rdf:Alt>\n");
    out.push_str(&format!(
        "     <rdf:li xml:lang=\"x-default\">{}</rdf:li>\n",
        escape(&doc.description)
    ));
    out.push_str("    </rdf:Alt>\n   </dc:description>\n");

    if !doc.subjects.is_empty() {
        out.push_str("   <dc:subject>\n    <rdf:Bag>\n");
        for subject in &doc.subjects {
            out.push_str(&format!("     <rdf:li>{}</rdf:li>\n", escape(subject)));
        }
        out.push_str("    </rdf:Bag>\n   </dc:subject>\n");
    }

    out.push_str("  </rdf:Description>\n");
    out.push_str(" </rdf:RDF>\n");
    out.push_str("</x:xmpmeta>\n");
    out.push_str("<?xpacket end=\"w\"?>\n");
    out
}

/// Read the culling properties out of an XMP packet.
///
/// Returns `None` when the text is not well-formed XML or contains no
/// `x:xmpmeta` / `rdf:RDF` element.
pub fn read(text: &str) -> Option<XmpFields> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = NsReader::from_str(text);
    let mut state = ReadState::default();

    loop {
        let (resolved, event) = match reader.read_resolved_event() {
            Ok(pair) => pair,
            Err(err) => {
                tracing::debug!("XMP parse error: {err}");
                return None;
            }
        };
        let node = match &event {
            Event::Start(e) | Event::Empty(e) => Node::classify(&resolved, e.local_name().as_ref()),
            Event::End(e) => Node::classify(&resolved, e.local_name().as_ref()),
            _ => None,
        };

        match event {
            Event::Start(e) => {
                state.depth += 1;
                if node == Some(Node::Description) {
                    state.read_attributes(&reader, &e);
                }
                state.open(node, &e);
            }
            Event::Empty(e) => match node {
                Some(Node::Container) => state.container = true,
                Some(Node::Description) => state.read_attributes(&reader, &e),
                _ => {}
            },
            Event::End(_) => {
                state.close();
                state.depth = state.depth.checked_sub(1)?;
            }
            Event::Text(t) => {
                let Ok(content) = t.unescape() else {
                    tracing::debug!("XMP text with invalid escape");
                    return None;
                };
                state.push_text(&content);
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                state.push_text(&String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if state.depth != 0 || !state.container {
        return None;
    }
    Some(state.fields)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Container,
    Description,
    Li,
    Rating,
    Label,
    DcDescription,
    Subject,
}

impl Node {
    fn classify(ns: &ResolveResult<'_>, local: &[u8]) -> Option<Self> {
        let ResolveResult::Bound(ns) = ns else {
            return None;
        };
        let ns = ns.as_ref();

        if ns == NS_ADOBE_META.as_bytes() && local == b"xmpmeta" {
            Some(Self::Container)
        } else if ns == NS_RDF.as_bytes() {
            match local {
                b"RDF" => Some(Self::Container),
                b"Description" => Some(Self::Description),
                b"li" => Some(Self::Li),
                _ => None,
            }
        } else if ns == NS_XMP.as_bytes() {
            match local {
                b"Rating" => Some(Self::Rating),
                b"Label" => Some(Self::Label),
                _ => None,
            }
        } else if ns == NS_DC.as_bytes() {
            match local {
                b"description" => Some(Self::DcDescription),
                b"subject" => Some(Self::Subject),
                _ => None,
            }
        } else {
            None
        }
    }

    fn is_property(self) -> bool {
        matches!(self, Self::Rating | Self::Label | Self::DcDescription | Self::Subject)
    }
}

/// An open property element and the text gathered directly inside it.
#[derive(Debug)]
struct OpenProperty {
    node: Node,
    depth: usize,
    text: String,
    alternatives: Vec<(Option<String>, String)>,
}

/// An open `rdf:li` inside a property.
#[derive(Debug)]
struct OpenItem {
    depth: usize,
    lang: Option<String>,
    text: String,
}

#[derive(Debug, Default)]
struct ReadState {
    depth: usize,
    container: bool,
    property: Option<OpenProperty>,
    item: Option<OpenItem>,
    fields: XmpFields,
}

impl ReadState {
    fn open(&mut self, node: Option<Node>, e: &BytesStart<'_>) {
        let Some(node) = node else { return };
        match node {
            Node::Container => self.container = true,
            Node::Li => {
                if self.property.is_some() && self.item.is_none() {
                    self.item = Some(OpenItem {
                        depth: self.depth,
                        lang: xml_lang(e),
                        text: String::new(),
                    });
                }
            }
            n if n.is_property() && self.property.is_none() => {
                self.property = Some(OpenProperty {
                    node: n,
                    depth: self.depth,
                    text: String::new(),
                    alternatives: Vec::new(),
                });
            }
            _ => {}
        }
    }

    fn close(&mut self) {
        if self.item.as_ref().is_some_and(|item| item.depth == self.depth) {
            if let (Some(item), Some(property)) = (self.item.take(), self.property.as_mut()) {
                property.alternatives.push((item.lang, item.text));
            }
            return;
        }

        if !self.property.as_ref().is_some_and(|p| p.depth == self.depth) {
            return;
        }
        let Some(property) = self.property.take() else { return };
        let fields = &mut self.fields;

        match property.node {
            Node::Rating => {
                fields.rating.get_or_insert_with(|| property.text.trim().to_string());
            }
            Node::Label => {
                fields.label.get_or_insert_with(|| property.text.trim().to_string());
            }
            Node::DcDescription => {
                let chosen = property
                    .alternatives
                    .iter()
                    .find(|(lang, _)| lang.as_deref() == Some("x-default"))
                    .or_else(|| property.alternatives.first())
                    .map(|(_, text)| text.clone())
                    .unwrap_or_else(|| property.text.trim().to_string());
                fields.description.get_or_insert(chosen);
            }
            Node::Subject => {
                fields.subjects.extend(
                    property
                        .alternatives
                        .into_iter()
                        .map(|(_, text)| text.trim().to_string())
                        .filter(|text| !text.is_empty()),
                );
            }
            _ => {}
        }
    }

    fn push_text(&mut self, content: &str) {
        if let Some(item) = self.item.as_mut() {
            item.text.push_str(content);
        } else if let Some(property) = self.property.as_mut() {
            property.text.push_str(content);
        }
    }

    /// Pick up properties written as attributes of `rdf:Description`.
    fn read_attributes(&mut self, reader: &NsReader<&[u8]>, e: &BytesStart<'_>) {
        for attr in e.attributes().flatten() {
            let (resolved, local) = reader.resolve_attribute(attr.key);
            let Some(node) = Node::classify(&resolved, local.as_ref()) else {
                continue;
            };
            let Ok(value) = attr.unescape_value() else {
                continue;
            };
            let value = value.trim().to_string();
            match node {
                Node::Rating => {
                    self.fields.rating.get_or_insert(value);
                }
                Node::Label => {
                    self.fields.label.get_or_insert(value);
                }
                Node::DcDescription => {
                    self.fields.description.get_or_insert(value);
                }
                _ => {}
            }
        }
    }
}

fn xml_lang(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"xml:lang")
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SidecarDocument {
        SidecarDocument {
            rating: 4,
            label: "Select".to_string(),
            description: "Score: 81/100. Warm <golden> light & calm sea.".to_string(),
            subjects: vec!["photo-critic".to_string(), "Select".to_string()],
        }
    }

    #[test]
    fn test_write_then_read_fields() {
        let xmp = write(&sample());
        let fields = read(&xmp).unwrap();
        assert_eq!(fields.rating.as_deref(), Some("4"));
        assert_eq!(fields.label.as_deref(), Some("Select"));
        assert_eq!(
            fields.description.as_deref(),
            Some("Score: 81/100. Warm <golden> light & calm sea.")
        );
        assert_eq!(fields.subjects, vec!["photo-critic", "Select"]);
    }

    #[test]
    fn test_write_escapes_markup() {
        let xmp = write(&sample());
        assert!(xmp.contains("Warm &lt;golden&gt; light &amp; calm sea."));
        assert!(xmp.contains(&format!("xmlns:xmp=\"{NS_XMP}\"")));
        assert!(xmp.contains(&format!("xmlns:dc=\"{NS_DC}\"")));
    }

    #[test]
    fn test_read_attribute_form() {
        let xmp = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
              <rdf:Description rdf:about=""
                  xmlns:xmp="http://ns.adobe.com/xap/1.0/"
                  xmp:Rating="2" xmp:Label="Reject"/>
            </rdf:RDF>
          </x:xmpmeta>"#;
        let fields = read(xmp).unwrap();
        assert_eq!(fields.rating.as_deref(), Some("2"));
        assert_eq!(fields.label.as_deref(), Some("Reject"));
        assert_eq!(fields.description, None);
    }

    #[test]
    fn test_read_matches_namespace_not_prefix() {
        let xmp = r#"<meta:xmpmeta xmlns:meta="adobe:ns:meta/">
            <r:RDF xmlns:r="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
              <r:Description xmlns:basic="http://ns.adobe.com/xap/1.0/"
                             xmlns:xmp="urn:not-xmp">
                <basic:Rating>5</basic:Rating>
                <xmp:Label>Select</xmp:Label>
              </r:Description>
            </r:RDF>
          </meta:xmpmeta>"#;
        let fields = read(xmp).unwrap();
        assert_eq!(fields.rating.as_deref(), Some("5"));
        assert_eq!(fields.label, None);
    }

    #[test]
    fn test_read_prefers_x_default_description() {
        let xmp = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
              <rdf:Description xmlns:dc="http://purl.org/dc/elements/1.1/">
                <dc:description><rdf:Alt>
                  <rdf:li xml:lang="fr-FR">Belle lumière.</rdf:li>
                  <rdf:li xml:lang="x-default">Nice light.</rdf:li>
                </rdf:Alt></dc:description>
              </rdf:Description>
            </rdf:RDF>
          </x:xmpmeta>"#;
        let fields = read(xmp).unwrap();
        assert_eq!(fields.description.as_deref(), Some("Nice light."));
    }

    #[test]
    fn test_read_rejects_non_xmp() {
        assert_eq!(read(""), None);
        assert_eq!(read("just some words"), None);
        assert_eq!(read("<html><body>hi</body></html>"), None);
        assert_eq!(read("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><unclosed>"), None);
        assert_eq!(read("<a></b>"), None);
    }

    #[test]
    fn test_read_bare_container_has_no_fields() {
        let fields = read("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>").unwrap();
        assert_eq!(fields, XmpFields::default());
    }
}
