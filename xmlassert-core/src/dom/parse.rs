//! Snapshot of a libxml document into an [`XmlTree`].
use super::{
    Attribute, DocumentType, Element, NamespaceDeclaration, NodeId, NodeKind, XmlDocument,
    XmlError, XmlTree,
};
use libxml::parser::Parser;
use libxml::tree::{Node, NodeType};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

pub(super) fn parse_document(payload: &str) -> Result<XmlDocument, XmlError> {
    let source = payload.trim();
    if source.is_empty() {
        return Err(XmlError::EmptyPayload);
    }

    // libxml recovers from broken markup, so well-formedness is checked up front.
    let doctype = scan_prolog(source)?;

    let document = Parser::default()
        .parse_string(source)
        .map_err(|e| XmlError::Parse(format!("{e:?}")))?;
    let root = document.get_root_element().ok_or(XmlError::MissingRoot)?;

    let mut builder = TreeBuilder {
        tree: XmlTree::new(),
        pointers: HashMap::new(),
    };

    if let Some(doctype) = doctype {
        builder
            .tree
            .push(NodeId::DOCUMENT, NodeKind::DocumentType(doctype));
    }

    let mut first = root;
    while let Some(previous) = first.get_prev_sibling() {
        first = previous;
    }
    let mut current = Some(first);
    while let Some(node) = current {
        builder.append(NodeId::DOCUMENT, &node);
        current = node.get_next_sibling();
    }

    Ok(XmlDocument {
        source: source.to_string(),
        document,
        tree: builder.tree,
        pointers: builder.pointers,
    })
}

struct TreeBuilder {
    tree: XmlTree,
    pointers: HashMap<usize, NodeId>,
}

impl TreeBuilder {
    fn append(&mut self, parent: NodeId, node: &Node) {
        let kind = match node.get_type() {
            Some(NodeType::ElementNode) => {
                let id = self.tree.push(parent, NodeKind::Element(snapshot_element(node)));
                self.pointers.insert(node.node_ptr() as usize, id);
                for child in node.get_child_nodes() {
                    self.append(id, &child);
                }
                return;
            }
            Some(NodeType::TextNode) | Some(NodeType::EntityRefNode) => {
                let text = node.get_content();
                if text.trim().is_empty() {
                    return;
                }
                NodeKind::Text(text)
            }
            Some(NodeType::CDataSectionNode) => NodeKind::CData(node.get_content()),
            Some(NodeType::CommentNode) => NodeKind::Comment(node.get_content()),
            Some(NodeType::PiNode) => NodeKind::ProcessingInstruction {
                target: node.get_name(),
                data: node.get_content(),
            },
            // the doctype comes from the prolog scan
            _ => return,
        };
        let id = self.tree.push(parent, kind);
        self.pointers.insert(node.node_ptr() as usize, id);
    }
}

fn snapshot_element(node: &Node) -> Element {
    let namespace = node.get_namespace();
    let prefix = namespace
        .as_ref()
        .map(|ns| ns.get_prefix())
        .filter(|prefix| !prefix.is_empty());
    let namespace_uri = namespace.map(|ns| ns.get_href());

    let mut attributes: Vec<Attribute> = node
        .get_properties_ns()
        .into_iter()
        .map(|((local_name, ns), value)| Attribute {
            local_name,
            prefix: ns
                .as_ref()
                .map(|ns| ns.get_prefix())
                .filter(|prefix| !prefix.is_empty()),
            namespace_uri: ns.map(|ns| ns.get_href()),
            value,
        })
        .collect();
    attributes.sort_by_key(Attribute::qualified_name);

    let namespace_declarations = node
        .get_namespace_declarations()
        .into_iter()
        .map(|ns| NamespaceDeclaration {
            prefix: ns.get_prefix(),
            uri: ns.get_href(),
        })
        .collect();

    Element {
        local_name: node.get_name(),
        prefix,
        namespace_uri,
        attributes,
        namespace_declarations,
    }
}

/// Walk the payload once with quick-xml: rejects ill-formed markup and extracts the
/// document type declaration.
fn scan_prolog(source: &str) -> Result<Option<DocumentType>, XmlError> {
    let mut reader = Reader::from_str(source);
    let mut doctype = None;
    loop {
        match reader.read_event() {
            Ok(Event::DocType(text)) => {
                doctype = Some(parse_doctype(&String::from_utf8_lossy(&text)));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(XmlError::Parse(format!(
                    "{e} (at byte {})",
                    reader.buffer_position()
                )));
            }
        }
    }
    Ok(doctype)
}

/// Parse the body of `<!DOCTYPE name PUBLIC "pub" "sys" [...]>`.
fn parse_doctype(raw: &str) -> DocumentType {
    let mut rest = raw.trim_start();
    let name_end = rest
        .find(|c: char| c.is_whitespace() || c == '[')
        .unwrap_or(rest.len());
    let name = rest[..name_end].to_string();
    rest = rest[name_end..].trim_start();

    let mut doctype = DocumentType {
        name,
        ..Default::default()
    };

    if let Some(after) = rest.strip_prefix("PUBLIC") {
        let (public_id, after) = quoted(after);
        let (system_id, _) = quoted(after);
        doctype.public_id = public_id;
        doctype.system_id = system_id;
    } else if let Some(after) = rest.strip_prefix("SYSTEM") {
        doctype.system_id = quoted(after).0;
    }
    doctype
}

fn quoted(input: &str) -> (Option<String>, &str) {
    let input = input.trim_start();
    let Some(quote) = input.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return (None, input);
    };
    let body = &input[1..];
    match body.find(quote) {
        Some(end) => (Some(body[..end].to_string()), &body[end + 1..]),
        None => (None, input),
    }
}
