//! Accumulation and serialization of request bodies.
//!
//! Every `send` contribution is sniffed: JSON objects merge key by key with the
//! last write winning, `key=value` strings merge with repeated keys turning into
//! lists and switch the store to form shape, records always merge like JSON
//! objects. The raw text of each string contribution is kept as well, for the
//! formats that send it verbatim.

use crate::content_type::ContentType;
use crate::query::{json_kind, parse_urlencoded, scalar_text};
use crate::{Error, Result};
use bytes::Bytes;
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A file sent as one part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// Form field name of the part.
    pub field: String,
    /// File name reported in the part's `Content-Disposition`.
    pub file_name: String,
    /// MIME type of the part.
    pub content_type: String,
    /// File contents.
    pub data: Bytes,
}

impl FileAttachment {
    /// Creates an attachment. An empty `content_type` becomes
    /// `application/octet-stream`.
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let content_type = content_type.into();
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: if content_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                content_type
            },
            data: data.into(),
        }
    }
}

/// Accumulated body contributions of one chain.
///
/// # Examples
///
/// ```
/// use chainreq::{BodyStore, ContentType};
///
/// let mut body = BodyStore::new();
/// body.add_raw("tag=a");
/// body.add_raw("tag=b");
/// body.add_raw(r#"{"id":123456789}"#);
///
/// assert_eq!(body.detected(), Some(ContentType::Form));
/// let encoded = body.encode(ContentType::Form, "unused").unwrap().unwrap();
/// assert_eq!(&encoded[..], b"id=123456789&tag=b&tag=a");
/// ```
#[derive(Debug, Clone, Default)]
pub struct BodyStore {
    fields: BTreeMap<String, Value>,
    items: Vec<Value>,
    raw: Vec<String>,
    files: Vec<FileAttachment>,
    form_shaped: bool,
    bounced: bool,
    // Strings that were neither JSON nor `key=value`, with the parse failure.
    unparsed: Vec<(String, String)>,
}

impl BodyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string contribution.
    ///
    /// JSON is tried first: objects merge into the keyed fields, arrays extend
    /// the item list and any other JSON value makes the raw text the body.
    /// Otherwise the text is parsed as `key=value&...` and the store becomes
    /// form-shaped. Text that is neither is kept as is; it can still be sent as
    /// a text, XML or HTML body, and fails to encode as anything else.
    pub fn add_raw(&mut self, content: &str) {
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(object)) => self.merge_json(object),
            Ok(Value::Array(items)) => self.items.extend(items),
            Ok(_) => self.bounced = true,
            Err(_) => match parse_urlencoded(content) {
                Ok(pairs) => {
                    self.merge_form(pairs);
                    self.form_shaped = true;
                }
                Err(reason) => self.unparsed.push((content.to_string(), reason)),
            },
        }
        self.raw.push(content.to_string());
    }

    /// Records a string contribution without sniffing it.
    pub fn add_verbatim(&mut self, content: &str) {
        self.raw.push(content.to_string());
    }

    /// Adds a record by round-tripping it through JSON.
    ///
    /// Objects merge with the last write winning regardless of the store's
    /// shape; sequences extend the item list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] if serialization fails or the record
    /// is neither an object nor a sequence.
    pub fn add_record<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<()> {
        let value =
            serde_json::to_value(record).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        match value {
            Value::Object(object) => self.merge_json(object),
            Value::Array(items) => self.items.extend(items),
            other => {
                return Err(Error::SerializationFailed(format!(
                    "body record must serialize to a JSON object or array, got {}",
                    json_kind(&other)
                )))
            }
        }
        Ok(())
    }

    /// Appends a file part.
    pub fn attach(&mut self, file: FileAttachment) {
        self.files.push(file);
    }

    fn merge_json(&mut self, object: Map<String, Value>) {
        for (key, value) in object {
            self.fields.insert(key, value);
        }
    }

    // A repeated key becomes a list holding the newest value first.
    fn merge_form(&mut self, pairs: Vec<(String, String)>) {
        for (key, value) in pairs {
            let merged = match self.fields.remove(&key) {
                None => Value::String(value),
                Some(Value::Array(previous)) => {
                    let mut list = Vec::with_capacity(previous.len() + 1);
                    list.push(Value::String(value));
                    list.extend(previous);
                    Value::Array(list)
                }
                Some(previous) => Value::Array(vec![Value::String(value), previous]),
            };
            self.fields.insert(key, merged);
        }
    }

    /// Keyed fields, sorted by key.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Items contributed by JSON arrays.
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Raw text of every string contribution, in call order.
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    /// Attached files, in call order.
    pub fn files(&self) -> &[FileAttachment] {
        &self.files
    }

    /// Returns `true` if nothing was ever contributed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.items.is_empty() && self.raw.is_empty() && self.files.is_empty()
    }

    /// The format implied by what was contributed, if anything was.
    ///
    /// Attached files imply multipart, any form string implies form, everything
    /// else is JSON.
    pub fn detected(&self) -> Option<ContentType> {
        if !self.files.is_empty() {
            Some(ContentType::Multipart)
        } else if self.form_shaped {
            Some(ContentType::Form)
        } else if self.is_empty() {
            None
        } else {
            Some(ContentType::Json)
        }
    }

    /// Serializes the store as `ty`.
    ///
    /// Returns `Ok(None)` when there is nothing to send. `boundary` is only used
    /// for multipart bodies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBody`] when a string that was neither JSON nor
    /// `key=value` must be encoded as JSON, form or multipart, and
    /// [`Error::ConfigurationError`] when the contributions cannot be expressed
    /// in `ty`, e.g. two raw strings for a text body or array items for a form
    /// body.
    pub fn encode(&self, ty: ContentType, boundary: &str) -> Result<Option<Bytes>> {
        if !ty.is_raw() {
            if let Some((input, reason)) = self.unparsed.first() {
                return Err(Error::InvalidBody {
                    input: input.clone(),
                    reason: reason.clone(),
                });
            }
        }
        match ty {
            ContentType::Json => {
                if self.bounced {
                    return self.single_raw(ty).map(Some);
                }
                match (self.fields.is_empty(), self.items.is_empty()) {
                    (true, true) => Ok(None),
                    (false, true) => to_json(&self.fields).map(Some),
                    (true, false) => to_json(&self.items).map(Some),
                    (false, false) => Err(Error::ConfigurationError(
                        "cannot send JSON object fields and array items in one body".to_string(),
                    )),
                }
            }
            ContentType::Form => {
                if self.bounced {
                    return self.single_raw(ty).map(Some);
                }
                self.reject_items(ty)?;
                if self.fields.is_empty() {
                    return Ok(None);
                }
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in self.flatten() {
                    serializer.append_pair(&key, &value);
                }
                Ok(Some(Bytes::from(serializer.finish())))
            }
            ContentType::Xml | ContentType::Html | ContentType::Text => {
                if self.raw.is_empty() {
                    if self.fields.is_empty() && self.items.is_empty() {
                        return Ok(None);
                    }
                    return Err(Error::ConfigurationError(format!(
                        "{} body needs a raw string, only records were sent",
                        ty
                    )));
                }
                self.single_raw(ty).map(Some)
            }
            ContentType::Multipart => {
                if self.bounced {
                    return Err(Error::ConfigurationError(
                        "a bare JSON value cannot be sent as multipart".to_string(),
                    ));
                }
                self.reject_items(ty)?;
                if self.fields.is_empty() && self.files.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.multipart(boundary)))
            }
        }
    }

    fn single_raw(&self, ty: ContentType) -> Result<Bytes> {
        match self.raw.as_slice() {
            [only] => Ok(Bytes::from(only.clone())),
            [] => Err(Error::ConfigurationError(format!(
                "{} body needs a raw string",
                ty
            ))),
            many => Err(Error::ConfigurationError(format!(
                "{} raw strings were sent but a {} body takes exactly one",
                many.len(),
                ty
            ))),
        }
    }

    fn reject_items(&self, ty: ContentType) -> Result<()> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigurationError(format!(
                "JSON array items cannot be sent as {}",
                ty
            )))
        }
    }

    /// Flattens the fields into form pairs: lists repeat the key, nested
    /// objects become JSON text, `null` is dropped.
    pub(crate) fn flatten(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.fields {
            match value {
                Value::Array(list) => {
                    pairs.extend(
                        list.iter()
                            .filter_map(scalar_text)
                            .map(|text| (key.clone(), text)),
                    );
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
        }
        pairs
    }

    fn multipart(&self, boundary: &str) -> Bytes {
        let mut buf = Vec::new();
        for (name, value) in self.flatten() {
            buf.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            buf.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    escape_quotes(&name)
                )
                .as_bytes(),
            );
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        for file in &self.files {
            buf.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            buf.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    escape_quotes(&file.field),
                    escape_quotes(&file.file_name)
                )
                .as_bytes(),
            );
            buf.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            buf.extend_from_slice(&file.data);
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        Bytes::from(buf)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Error::SerializationFailed(e.to_string()))
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Generates a random multipart boundary.
pub(crate) fn generate_boundary() -> String {
    let mut rng = rand::thread_rng();
    format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>())
}
