use super::document::Element;

/// Ordered alias table for the namespaces used in one document.
///
/// Aliases are assigned in first-encounter, pre-order document order:
/// the URI of the first element visited becomes `ns0`, the next new URI
/// `ns1`, and so on. Unqualified elements contribute the empty-string
/// namespace, which gets an alias like any other.
///
/// The primary namespace is recorded separately from the root element's
/// URI instead of being inferred from alias `ns0`. For a document walked in
/// serialized order the two coincide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceMap {
    uris: Vec<String>,
    primary: String,
}

impl NamespaceMap {
    /// Walks `root` and every descendant in document order.
    pub fn resolve(root: &Element) -> Self {
        let mut uris: Vec<String> = Vec::new();
        for element in root.descendants() {
            if !uris.iter().any(|uri| uri == element.namespace()) {
                uris.push(element.namespace().to_string());
            }
        }

        Self {
            uris,
            primary: root.namespace().to_string(),
        }
    }

    /// Namespace URI of the document's root element.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Alias (`ns<k>`) assigned to `uri`, if the document uses it.
    pub fn alias(&self, uri: &str) -> Option<String> {
        self.uris
            .iter()
            .position(|known| known == uri)
            .map(|idx| format!("ns{}", idx))
    }

    /// URI behind an alias such as `ns1`.
    pub fn uri(&self, alias: &str) -> Option<&str> {
        let idx: usize = alias.strip_prefix("ns")?.parse().ok()?;
        self.uris.get(idx).map(String::as_str)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.uris.iter().any(|known| known == uri)
    }

    /// `(alias, uri)` pairs in alias order.
    pub fn iter(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.uris
            .iter()
            .enumerate()
            .map(|(idx, uri)| (format!("ns{}", idx), uri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}
