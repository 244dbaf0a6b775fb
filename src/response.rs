//! Response returned by a terminal operation.
//!
//! The body is read into memory once, so it can be handed back as text and still
//! be read again from the [`Response`] afterwards.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// A completed HTTP exchange.
///
/// Non-2xx statuses are not errors; inspect [`Response::status`].
///
/// # Examples
///
/// ```no_run
/// use chainreq::Agent;
///
/// # async fn example() -> Result<(), chainreq::Errors> {
/// let (response, body) = Agent::new().get("https://api.example.com/users/1").end().await?;
///
/// println!("Status: {}", response.status);
/// println!("Request took {:?}", response.latency);
/// assert_eq!(response.text(), body);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The URL that finally answered, after redirects.
    pub url: Url,

    /// The HTTP version of the response.
    pub version: Version,

    /// The total latency of the request, including all retry attempts.
    pub latency: Duration,

    /// The number of attempts made to complete this request.
    ///
    /// This is `1` unless a retry policy re-sent the request.
    pub attempts: usize,

    body: Bytes,
}

impl Response {
    /// Creates a new `Response`.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        url: Url,
        version: Version,
        body: Bytes,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            status,
            headers,
            url,
            version,
            latency,
            attempts,
            body,
        }
    }

    /// The response body.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// The response body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// A fresh reader over the body. Each call starts from the beginning.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chainreq::Response;
    /// # use http::{HeaderMap, StatusCode, Version};
    /// # use std::time::Duration;
    /// use std::io::Read;
    ///
    /// let response = Response::new(
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     "http://example.com/".parse().unwrap(),
    ///     Version::HTTP_11,
    ///     "Just some text".into(),
    ///     Duration::from_millis(5),
    ///     1,
    /// );
    ///
    /// for _ in 0..2 {
    ///     let mut text = String::new();
    ///     response.reader().read_to_string(&mut text).unwrap();
    ///     assert_eq!(text, "Just some text");
    /// }
    /// ```
    pub fn reader(&self) -> impl std::io::Read + '_ {
        &self.body[..]
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chainreq::Response;
    /// # use http::{HeaderMap, HeaderValue, StatusCode, Version};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new(
    ///     StatusCode::OK,
    ///     headers,
    ///     "http://example.com/".parse().unwrap(),
    ///     Version::HTTP_11,
    ///     "{}".into(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// assert_eq!(response.header("content-type").unwrap(), "application/json");
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn response(body: &'static str, attempts: usize) -> Response {
        Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            Url::parse("http://example.com/").unwrap(),
            Version::HTTP_11,
            Bytes::from_static(body.as_bytes()),
            Duration::from_millis(1),
            attempts,
        )
    }

    #[test]
    fn test_json_body() {
        #[derive(Deserialize)]
        struct Item {
            id: u64,
        }

        let item: Item = response(r#"{"id":7}"#, 1).json().unwrap();
        assert_eq!(item.id, 7);
    }

    #[test]
    fn test_was_retried() {
        assert!(!response("", 1).was_retried());
        assert!(response("", 3).was_retried());
    }

    #[test]
    fn test_text_is_lossy() {
        let r = Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            Url::parse("http://example.com/").unwrap(),
            Version::HTTP_11,
            Bytes::from_static(&[b'o', b'k', 0xff]),
            Duration::ZERO,
            1,
        );
        assert_eq!(r.text(), "ok\u{fffd}");
    }
}
