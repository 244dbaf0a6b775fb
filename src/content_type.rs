//! Body wire formats and the lookup table that maps short type tokens to them.

use crate::Error;
use std::borrow::Cow;

/// The wire format a request body is serialized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `application/xml`, sent verbatim
    Xml,
    /// `application/x-www-form-urlencoded`
    Form,
    /// `text/html`, sent verbatim
    Html,
    /// `text/plain`, sent verbatim
    Text,
    /// `multipart/form-data`
    Multipart,
}

impl ContentType {
    /// Returns the MIME type sent in the `Content-Type` header.
    ///
    /// Multipart bodies additionally carry a `boundary` parameter, which the
    /// assembler appends.
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
            ContentType::Form => "application/x-www-form-urlencoded",
            ContentType::Html => "text/html",
            ContentType::Text => "text/plain",
            ContentType::Multipart => "multipart/form-data",
        }
    }

    /// Returns `true` for formats whose body is the sent string passed through
    /// untouched.
    pub fn is_raw(self) -> bool {
        matches!(self, ContentType::Xml | ContentType::Html | ContentType::Text)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime())
    }
}

/// Immutable table of accepted type tokens.
///
/// An [`Agent`](crate::Agent) owns one registry and every chain it starts reads
/// from it. Lookups are exact and case-sensitive.
///
/// # Examples
///
/// ```
/// use chainreq::{ContentType, TypeRegistry};
///
/// let registry = TypeRegistry::standard().with_alias("plain", ContentType::Text);
///
/// assert_eq!(registry.resolve("form").unwrap(), ContentType::Form);
/// assert_eq!(registry.resolve("plain").unwrap(), ContentType::Text);
/// assert!(registry.resolve("JSON").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    entries: Vec<(Cow<'static, str>, ContentType)>,
}

const STANDARD: &[(&str, ContentType)] = &[
    ("json", ContentType::Json),
    ("xml", ContentType::Xml),
    ("urlencoded", ContentType::Form),
    ("form", ContentType::Form),
    ("form-data", ContentType::Form),
    ("html", ContentType::Html),
    ("text", ContentType::Text),
    ("multipart", ContentType::Multipart),
];

impl TypeRegistry {
    /// The built-in tokens: `json`, `xml`, `urlencoded`, `form`, `form-data`,
    /// `html`, `text` and `multipart`.
    pub fn standard() -> Self {
        Self {
            entries: STANDARD
                .iter()
                .map(|(token, ty)| (Cow::Borrowed(*token), *ty))
                .collect(),
        }
    }

    /// Returns a copy of this registry with one more token.
    ///
    /// An existing token with the same spelling is replaced.
    pub fn with_alias(mut self, token: impl Into<String>, ty: ContentType) -> Self {
        let token = token.into();
        self.entries.retain(|(existing, _)| **existing != *token);
        self.entries.push((Cow::Owned(token), ty));
        self
    }

    /// Looks up a type token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`] naming the token if it is not registered.
    pub fn resolve(&self, token: &str) -> Result<ContentType, Error> {
        self.entries
            .iter()
            .find(|(existing, _)| **existing == *token)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| Error::UnknownType(token.to_string()))
    }

    /// Looks up the MIME string a token maps to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`] if the token is not registered.
    pub fn mime(&self, token: &str) -> Result<&'static str, Error> {
        self.resolve(token).map(ContentType::mime)
    }

    /// Maps a `Content-Type` header value back to a format.
    ///
    /// Parameters such as `charset` are ignored and the comparison is
    /// case-insensitive. Returns `None` for MIME types no token maps to.
    pub fn from_mime(&self, value: &str) -> Option<ContentType> {
        let essence = value.split(';').next().unwrap_or_default().trim();
        self.entries
            .iter()
            .map(|(_, ty)| *ty)
            .find(|ty| ty.mime().eq_ignore_ascii_case(essence))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tokens() {
        let registry = TypeRegistry::standard();
        assert_eq!(registry.mime("json").unwrap(), "application/json");
        assert_eq!(registry.mime("xml").unwrap(), "application/xml");
        assert_eq!(
            registry.mime("form-data").unwrap(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            registry.mime("urlencoded").unwrap(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(registry.mime("html").unwrap(), "text/html");
        assert_eq!(registry.mime("text").unwrap(), "text/plain");
        assert_eq!(registry.mime("multipart").unwrap(), "multipart/form-data");
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let registry = TypeRegistry::standard();
        match registry.resolve("Json") {
            Err(Error::UnknownType(token)) => assert_eq!(token, "Json"),
            other => panic!("Expected UnknownType, got {:?}", other),
        }
    }

    #[test]
    fn test_from_mime_ignores_parameters() {
        let registry = TypeRegistry::standard();
        assert_eq!(
            registry.from_mime("Application/JSON; charset=utf-8"),
            Some(ContentType::Json)
        );
        assert_eq!(registry.from_mime("text/plain"), Some(ContentType::Text));
        assert_eq!(registry.from_mime("image/png"), None);
    }

    #[test]
    fn test_alias_does_not_touch_standard_table() {
        let custom = TypeRegistry::standard().with_alias("json", ContentType::Text);
        assert_eq!(custom.resolve("json").unwrap(), ContentType::Text);
        assert_eq!(
            TypeRegistry::standard().resolve("json").unwrap(),
            ContentType::Json
        );
    }
}
