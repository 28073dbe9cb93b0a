use serde::Serialize;
use std::collections::BTreeMap;

use super::document::Element;
use super::namespace::NamespaceMap;

/// Separator between a tag name and one of its attribute names in a
/// flattened key, e.g. `contractActionType__description`. A prefixed
/// attribute keeps its namespace, e.g. `award__{urn:x}id`.
pub const ATTRIBUTE_SEPARATOR: &str = "__";

/// One flattened feed entry.
///
/// Values are opaque text. An element without text maps to `None`, which
/// serializes as JSON `null`. Whitespace-only text (indentation between
/// child elements) counts as no text and also maps to `None`. Keys are kept sorted so serialized output is
/// stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Option<String>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.fields.insert(key.into(), value);
    }

    /// Text value for `key`. Returns `None` both for a missing key and for
    /// a key whose element carried no text; use [`Record::contains_key`] to
    /// tell the two apart.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Value for `key` coerced to an integer, if it parses as one.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.trim().parse().ok()
    }

    /// Value for `key` coerced to a float, if it parses as one.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Flattens one entry subtree into a [`Record`].
///
/// Visits the entry and all its descendants in document order. Each
/// element contributes `clean_tag -> text`, and each of its attributes
/// contributes `clean_tag__attribute -> value`. For example
///
/// ```text
/// <ns1:contractActionType description="BPA">E</ns1:contractActionType>
/// ```
///
/// becomes `{"contractActionType": "E", "contractActionType__description": "BPA"}`.
///
/// A tag (or tag/attribute pair) that repeats within the entry overwrites
/// the earlier value: the last occurrence in document order wins.
pub fn flatten_entry(entry: &Element, namespaces: &NamespaceMap) -> Record {
    let mut record = Record::new();

    for element in entry.descendants() {
        let tag = clean_tag(element, namespaces);
        for (name, value) in element.attributes() {
            record.insert(
                format!("{}{}{}", tag, ATTRIBUTE_SEPARATOR, name),
                Some(value.clone()),
            );
        }
        record.insert(tag, element.text().map(str::to_string));
    }

    record
}

/// Tag name without its namespace.
///
/// Elements whose namespace is not part of the document's map keep Clark
/// notation (`{uri}local`) so they cannot collide with a known tag.
fn clean_tag(element: &Element, namespaces: &NamespaceMap) -> String {
    if element.namespace().is_empty() || namespaces.contains(element.namespace()) {
        element.name().to_string()
    } else {
        format!("{{{}}}{}", element.namespace(), element.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::document::Document;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn flatten_root(xml: &str) -> Record {
        let doc = Document::parse(xml.as_bytes()).unwrap();
        let namespaces = NamespaceMap::resolve(doc.root());
        flatten_entry(doc.root(), &namespaces)
    }

    #[test]
    fn test_attribute_keys_use_double_underscore() {
        let record = flatten_root(
            r#"<ns1:contractActionType xmlns:ns1="https://www.fpds.gov/FPDS" description="BPA">E</ns1:contractActionType>"#,
        );

        let mut expected = Record::new();
        expected.insert("contractActionType", Some("E".to_string()));
        expected.insert("contractActionType__description", Some("BPA".to_string()));
        assert_eq!(record, expected);
    }

    #[test]
    fn test_same_local_attribute_name_in_two_namespaces() {
        let record = flatten_root(r#"<x xmlns:a="urn:a" xmlns:b="urn:b" a:id="1" b:id="2"/>"#);

        assert_eq!(record.len(), 3);
        assert_eq!(record.get("x__{urn:a}id"), Some("1"));
        assert_eq!(record.get("x__{urn:b}id"), Some("2"));
    }

    #[test]
    fn test_indentation_only_text_is_none() {
        let record = flatten_root("<entry>\n    <title>t</title>\n</entry>");
        assert!(record.contains_key("entry"));
        assert_eq!(record.get("entry"), None);
        assert_eq!(record.get("title"), Some("t"));
    }

    #[test]
    fn test_entry_without_attributes_has_single_key() {
        let record = flatten_root("<entry>text</entry>");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("entry"), Some("text"));
        assert!(!record.keys().any(|k| k.contains(ATTRIBUTE_SEPARATOR)));
    }

    #[test]
    fn test_nested_elements_are_flattened() {
        let record = flatten_root(
            r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:ns1="https://www.fpds.gov/FPDS">
                <title>Award</title>
                <content type="application/xml">
                    <ns1:award version="1.5">
                        <ns1:contractActionType description="BPA" part8OrPart13="PART8">E</ns1:contractActionType>
                        <ns1:obligatedAmount>1250.50</ns1:obligatedAmount>
                    </ns1:award>
                </content>
            </entry>"#,
        );

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(
            keys,
            vec![
                "award",
                "award__version",
                "content",
                "content__type",
                "contractActionType",
                "contractActionType__description",
                "contractActionType__part8OrPart13",
                "entry",
                "obligatedAmount",
                "title",
            ]
        );
        assert_eq!(record.get("title"), Some("Award"));
        assert_eq!(record.get("award__version"), Some("1.5"));
        assert!(record.contains_key("entry"));
        assert_eq!(record.get("entry"), None);
        assert_eq!(record.get_f64("obligatedAmount"), Some(1250.5));
    }

    #[test]
    fn test_repeated_tag_last_write_wins() {
        let record = flatten_root(
            r#"<entry><name role="first">A</name><name role="second">B</name></entry>"#,
        );
        assert_eq!(record.get("name"), Some("B"));
        assert_eq!(record.get("name__role"), Some("second"));
    }

    #[test]
    fn test_element_without_text_maps_to_none() {
        let record = flatten_root(r#"<entry><empty flag="y"/></entry>"#);
        assert!(record.contains_key("empty"));
        assert_eq!(record.get("empty"), None);
        assert_eq!(record.get("empty__flag"), Some("y"));
    }

    #[test]
    fn test_unmapped_namespace_keeps_clark_notation() {
        let doc = Document::parse(br#"<p:a xmlns:p="urn:p">x</p:a>"#).unwrap();
        let other = Document::parse(b"<b/>").unwrap();
        let unrelated = NamespaceMap::resolve(other.root());

        let record = flatten_entry(doc.root(), &unrelated);
        assert_eq!(record.get("{urn:p}a"), Some("x"));
    }

    #[test]
    fn test_coercion_helpers() {
        let mut record = Record::new();
        record.insert("count", Some(" 42 ".to_string()));
        record.insert("amount", Some("-3.25".to_string()));
        record.insert("label", Some("n/a".to_string()));

        assert_eq!(record.get_i64("count"), Some(42));
        assert_eq!(record.get_f64("amount"), Some(-3.25));
        assert_eq!(record.get_i64("label"), None);
        assert_eq!(record.get_i64("missing"), None);
    }

    #[test]
    fn test_record_serializes_as_flat_object() {
        let record = flatten_root(r#"<entry kind="x"><v/></entry>"#);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"entry":null,"entry__kind":"x","v":null}"#);
    }

    fn child_strategy() -> impl Strategy<Value = (String, BTreeSet<String>)> {
        ("[a-c]{1,2}", prop::collection::btree_set("[x-z]", 0..3))
    }

    proptest! {
        #[test]
        fn prop_one_key_per_tag_and_attribute(
            children in prop::collection::vec(child_strategy(), 0..8)
        ) {
            let mut xml = String::from("<entry>");
            let mut expected: BTreeSet<String> = BTreeSet::from(["entry".to_string()]);
            for (tag, attrs) in &children {
                xml.push('<');
                xml.push_str(tag);
                for attr in attrs {
                    xml.push_str(&format!(" {}=\"v\"", attr));
                    expected.insert(format!("{}__{}", tag, attr));
                }
                xml.push_str("/>");
                expected.insert(tag.clone());
            }
            xml.push_str("</entry>");

            let record = flatten_root(&xml);
            let keys: BTreeSet<String> = record.keys().map(str::to_string).collect();
            prop_assert_eq!(keys, expected);
        }
    }
}
