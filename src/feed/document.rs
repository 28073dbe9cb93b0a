use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

/// SEC-003: Maximum allowed element nesting depth.
/// Prevents unbounded stack growth from maliciously crafted deeply nested documents.
const MAX_DEPTH: usize = 256;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Errors that can occur while parsing a feed document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The underlying XML reader rejected the input.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// An element used a prefix with no `xmlns:prefix` declaration in scope.
    #[error("Unbound namespace prefix: {0}")]
    UnboundPrefix(String),

    /// The body contained no element at all.
    #[error("Document has no root element")]
    NoRoot,

    /// A second top-level element followed the root.
    #[error("Document has more than one root element")]
    MultipleRoots,

    /// SEC-003: Element nesting depth exceeds safety limit.
    #[error("Element nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// One element of a parsed feed document.
///
/// `text` follows the usual tree-model convention: it holds only the
/// character data that precedes the first child element. Whitespace-only
/// text (indentation) is stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    namespace: String,
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    fn new(namespace: String, name: String) -> Self {
        Self {
            namespace,
            name,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Namespace URI, or the empty string for an unqualified element.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Local name with any prefix removed.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// True when the element has the given namespace URI and local name.
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }

    /// Iterates over this element and all of its descendants in document
    /// order (pre-order, depth-first).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    fn push_text(&mut self, text: &str) {
        // Character data after the first child is tail text, not element text
        if !self.children.is_empty() {
            return;
        }
        match &mut self.text {
            Some(existing) => existing.push_str(text),
            None => self.text = Some(text.to_string()),
        }
    }

    fn finish(&mut self) {
        if self.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.text = None;
        }
    }
}

/// Pre-order iterator returned by [`Element::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// An immutable parsed feed document.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parses a response body into a document tree.
    ///
    /// Element names are resolved against the `xmlns` declarations in scope,
    /// so every [`Element`] carries its full namespace URI rather than a
    /// document-specific prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the body is not well-formed XML, uses an
    /// undeclared prefix, has zero or several root elements, or nests
    /// deeper than the safety limit.
    ///
    /// # Security
    ///
    /// SEC-002: `quick-xml` never expands `<!ENTITY>` declarations; only the
    /// five predefined XML entities are resolved when unescaping.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = NsReader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|e| ParseError::Xml(e.to_string()))?;
            // Owned before the reader is borrowed again for attribute decoding
            let namespace = namespace_uri(resolved)?;

            match event {
                Event::Start(e) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(ParseError::MaxDepthExceeded(MAX_DEPTH));
                    }
                    let element = open_element(&reader, namespace, &e)?;
                    stack.push(element);
                }
                Event::Empty(e) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(ParseError::MaxDepthExceeded(MAX_DEPTH));
                    }
                    let element = open_element(&reader, namespace, &e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // End names are checked by the reader, so the stack cannot underflow
                    // on well-formed input
                    let mut element = stack.pop().ok_or_else(|| {
                        ParseError::Xml("unexpected closing tag".to_string())
                    })?;
                    element.finish();
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                    match stack.last_mut() {
                        Some(current) => current.push_text(&text),
                        None if text.trim().is_empty() => {}
                        None => {
                            return Err(ParseError::Xml(
                                "character data outside the root element".to_string(),
                            ))
                        }
                    }
                }
                Event::CData(c) => {
                    let text = std::str::from_utf8(&c)
                        .map_err(|e| ParseError::Xml(e.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        current.push_text(text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ParseError::Xml(format!(
                "unexpected end of input inside <{}>",
                stack.last().map(Element::name).unwrap_or_default()
            )));
        }

        root.map(|root| Self { root }).ok_or(ParseError::NoRoot)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }
}

fn namespace_uri(resolved: ResolveResult<'_>) -> Result<String, ParseError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(ParseError::UnboundPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn open_element(
    reader: &NsReader<&[u8]>,
    namespace: String,
    e: &BytesStart<'_>,
) -> Result<Element, ParseError> {
    let name = std::str::from_utf8(e.local_name().as_ref())
        .map_err(|err| ParseError::Xml(err.to_string()))?
        .to_string();
    let mut element = Element::new(namespace, name);

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| ParseError::Xml(err.to_string()))?;
        // Namespace declarations are scoping directives, not data
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = attribute_key(reader, attr.key)?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| ParseError::Xml(err.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

/// Unprefixed attributes keep their plain name. Prefixed ones use Clark
/// notation (`{uri}local`) so `a:id` and `b:id` stay distinct.
fn attribute_key(reader: &NsReader<&[u8]>, qname: QName<'_>) -> Result<String, ParseError> {
    let (resolved, local) = reader.resolve_attribute(qname);
    let local = std::str::from_utf8(local.as_ref())
        .map_err(|err| ParseError::Xml(err.to_string()))?;
    let namespace = match resolved {
        // The `xml` prefix is bound implicitly by the XML spec
        ResolveResult::Unknown(prefix) if prefix == b"xml" => XML_NAMESPACE.to_string(),
        resolved => namespace_uri(resolved)?,
    };

    if namespace.is_empty() {
        Ok(local.to_string())
    } else {
        Ok(format!("{{{}}}{}", namespace, local))
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(ParseError::MultipleRoots),
        None => *root = Some(element),
    }
    Ok(())
}
