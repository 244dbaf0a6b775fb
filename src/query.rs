//! Ordered accumulation of query-string contributions.
//!
//! Contributions arrive as raw strings (`"a=1&b=2"` or a flat JSON object) or
//! as serializable records. Every parsed pair is appended, never overwritten, so
//! repeated keys keep all of their values in call order.

use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Ordered multimap of query parameters.
///
/// Keys keep the position at which they were first added; values for one key
/// keep the order in which they were added.
///
/// # Examples
///
/// ```
/// use chainreq::QueryStore;
///
/// let mut query = QueryStore::new();
/// query.append("b", "1");
/// query.add_raw("a=2&b=3").unwrap();
///
/// let pairs: Vec<_> = query.pairs().collect();
/// assert_eq!(pairs, vec![("b", "1"), ("b", "3"), ("a", "2")]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStore {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one value for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Returns every value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    /// Returns `true` if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all pairs, grouped by key in first-insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| (key.as_str(), value.as_str()))
        })
    }

    /// Adds a raw contribution.
    ///
    /// A flat JSON object is tried first and its keys are added in document
    /// order. Anything else is parsed as `key=value&...`. Keys are kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if the input is neither; nothing is added
    /// in that case.
    pub fn add_raw(&mut self, content: &str) -> Result<()> {
        let pairs = match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(object)) => object_pairs(object, false),
            _ => parse_urlencoded(content).map_err(|reason| Error::InvalidQuery {
                input: content.to_string(),
                reason,
            })?,
        };
        self.extend(pairs);
        Ok(())
    }

    /// Adds a record by serializing it to a JSON object.
    ///
    /// Field names are lower-cased; `null` fields are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] if the record does not serialize to
    /// a JSON object.
    pub fn add_record<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<()> {
        let value =
            serde_json::to_value(record).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        match value {
            Value::Object(object) => {
                self.extend(object_pairs(object, true));
                Ok(())
            }
            other => Err(Error::SerializationFailed(format!(
                "query record must serialize to a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn extend(&mut self, pairs: Vec<(String, String)>) {
        for (key, value) in pairs {
            self.append(key, value);
        }
    }

    /// Writes the merged query into `url`.
    ///
    /// Pairs already present in the URL stay first, in their original order,
    /// followed by the stored pairs. The URL is left untouched when the store is
    /// empty.
    pub(crate) fn apply_to(&self, url: &mut Url) {
        if self.is_empty() {
            return;
        }
        let existing: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.extend_pairs(existing);
        for (key, value) in self.pairs() {
            serializer.append_pair(key, value);
        }
        url.set_query(Some(&serializer.finish()));
    }
}

fn object_pairs(object: serde_json::Map<String, Value>, lowercase: bool) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(object.len());
    for (key, value) in object {
        let key = if lowercase { key.to_lowercase() } else { key };
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(&item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(&other) {
                    pairs.push((key, text));
                }
            }
        }
    }
    pairs
}

/// Renders a JSON value the way it appears in a query string or form field.
///
/// Strings are unquoted, numbers keep their original digits, objects and arrays
/// become compact JSON text. `null` has no representation.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parses `key=value&key2=value2`, rejecting semicolon separators and broken
/// percent escapes.
pub(crate) fn parse_urlencoded(content: &str) -> std::result::Result<Vec<(String, String)>, String> {
    if content.contains(';') {
        return Err("invalid semicolon separator".to_string());
    }
    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                let end = (i + 3).min(bytes.len());
                return Err(format!(
                    "invalid URL escape \"{}\"",
                    String::from_utf8_lossy(&bytes[i..end])
                ));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(url::form_urlencoded::parse(bytes).into_owned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Search {
        #[serde(rename = "Query1")]
        query1: String,
        size: u32,
        tag: Option<String>,
    }

    fn pairs(store: &QueryStore) -> Vec<(String, String)> {
        store
            .pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_json_object_keeps_document_order() {
        let mut store = QueryStore::new();
        store.add_raw(r#"{"zeta":"1","alpha":"2"}"#).unwrap();
        assert_eq!(
            pairs(&store),
            vec![
                ("zeta".to_string(), "1".to_string()),
                ("alpha".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_raw_keys_are_not_lowercased() {
        let mut store = QueryStore::new();
        store.add_raw("Query=bicycle").unwrap();
        store.add_raw(r#"{"Size":"50x50"}"#).unwrap();
        assert_eq!(store.get("Query").unwrap(), ["bicycle"]);
        assert_eq!(store.get("Size").unwrap(), ["50x50"]);
    }

    #[test]
    fn test_record_keys_are_lowercased_and_nulls_skipped() {
        let mut store = QueryStore::new();
        store
            .add_record(&Search {
                query1: "test1".to_string(),
                size: 50,
                tag: None,
            })
            .unwrap();
        assert_eq!(store.get("query1").unwrap(), ["test1"]);
        assert_eq!(store.get("size").unwrap(), ["50"]);
        assert!(store.get("tag").is_none());
    }

    #[test]
    fn test_duplicate_keys_accumulate() {
        let mut store = QueryStore::new();
        store.add_raw("a=1&a=2").unwrap();
        store.append("a", "3");
        assert_eq!(store.get("a").unwrap(), ["1", "2", "3"]);
    }

    #[test]
    fn test_json_scalars_and_arrays() {
        let mut store = QueryStore::new();
        store
            .add_raw(r#"{"id":12345678901234567890,"ok":true,"tags":["x","y"]}"#)
            .unwrap();
        assert_eq!(store.get("id").unwrap(), ["12345678901234567890"]);
        assert_eq!(store.get("ok").unwrap(), ["true"]);
        assert_eq!(store.get("tags").unwrap(), ["x", "y"]);
    }

    #[test]
    fn test_malformed_query_is_rejected_atomically() {
        let mut store = QueryStore::new();
        let err = store.add_raw("a=1&b=%zz").unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
        assert!(err.to_string().contains("%zz"));
        assert!(store.is_empty());

        assert!(store.add_raw("a=1;b=2").is_err());
    }

    #[test]
    fn test_record_must_be_object() {
        let mut store = QueryStore::new();
        let err = store.add_record(&vec![1, 2]).unwrap_err();
        assert!(matches!(err, Error::SerializationFailed(_)));
    }

    #[test]
    fn test_apply_to_puts_url_params_first() {
        let mut store = QueryStore::new();
        store.append("b", "1");
        store.append("a", "2");
        let mut url = Url::parse("http://example.com/path?z=0").unwrap();
        store.apply_to(&mut url);
        assert_eq!(url.query(), Some("z=0&b=1&a=2"));
    }

    #[test]
    fn test_apply_to_encodes_special_characters() {
        let mut store = QueryStore::new();
        store.append("key with space", "value with space");
        store.append("key&special", "value=special");
        let mut url = Url::parse("http://example.com/").unwrap();
        store.apply_to(&mut url);
        assert_eq!(
            url.query(),
            Some("key+with+space=value+with+space&key%26special=value%3Dspecial")
        );
    }

    #[test]
    fn test_empty_store_leaves_url_untouched() {
        let store = QueryStore::new();
        let mut url = Url::parse("http://example.com/?raw=%41").unwrap();
        store.apply_to(&mut url);
        assert_eq!(url.query(), Some("raw=%41"));
    }
}
