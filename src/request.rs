//! The request chain and its terminal operations.
//!
//! A [`Request`] is started from an [`Agent`](crate::Agent) and threaded through
//! builder calls by value. Builder calls never fail: bad input is recorded on the
//! chain and surfaces from the terminal operation. Terminal operations consume the
//! chain, so an executed chain can never be mutated again; clone it first to
//! reuse a configuration.

use crate::agent::AgentInner;
use crate::body::{generate_boundary, BodyStore, FileAttachment};
use crate::content_type::ContentType;
use crate::error::Errors;
use crate::query::QueryStore;
use crate::response::Response;
use crate::retry::{Retry, RetryStrategy};
use crate::transport::{ProxySetting, RedirectPolicy, TransportConfig};
use crate::Error;
use base64::Engine;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::cookie::{CookieStore, Jar};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A cookie sent with a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
}

impl Cookie {
    /// Creates a cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// A fully assembled request that has not been sent.
///
/// Returned by [`Request::make_request`] for inspection. Assembling the same
/// chain twice yields equal values.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    /// HTTP method
    pub method: Method,
    /// Target URL with the merged query string
    pub url: Url,
    /// Every header that will be sent, except those added by the transport
    pub headers: HeaderMap,
    /// Serialized body, if any contribution was made
    pub body: Option<Bytes>,
}

impl PreparedRequest {
    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body.as_ref().map(|b| String::from_utf8_lossy(b))
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

/// One in-progress request.
///
/// Cloning copies every accumulator, header and error, so clones never affect
/// each other. Only the agent's HTTP client and cookie jar stay shared.
///
/// # Examples
///
/// ```no_run
/// use chainreq::{Agent, Cookie};
///
/// # async fn example() -> Result<(), chainreq::Errors> {
/// let agent = Agent::new();
///
/// let (response, body) = agent
///     .post("https://api.example.com/pets")
///     .set("X-Request-Id", "42")
///     .param("dry_run", "true")
///     .send(r#"{"name":"nemo"}"#)
///     .send(r#"{"kind":"fish"}"#)
///     .add_cookie(Cookie::new("session", "abc"))
///     .end()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Request {
    agent: Arc<AgentInner>,
    method: String,
    url: String,
    headers: HeaderMap,
    forced_type: Option<ContentType>,
    body: BodyStore,
    query: QueryStore,
    cookies: Vec<Cookie>,
    basic_auth: Option<(String, String)>,
    timeout: Option<Duration>,
    transport: Option<TransportConfig>,
    retry: Retry,
    boundary: String,
    log_curl: bool,
    errors: Vec<Error>,
}

impl Request {
    pub(crate) fn new(agent: Arc<AgentInner>, method: String, url: String) -> Self {
        Self {
            agent,
            method,
            url,
            headers: HeaderMap::new(),
            forced_type: None,
            body: BodyStore::new(),
            query: QueryStore::new(),
            cookies: Vec::new(),
            basic_auth: None,
            timeout: None,
            transport: None,
            retry: Retry::default(),
            boundary: generate_boundary(),
            log_curl: false,
            errors: Vec::new(),
        }
    }

    /// The HTTP method this chain was started with.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The target URL as given, before query merging.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Errors recorded so far, in the order they happened.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// The accumulated body contributions.
    pub fn body(&self) -> &BodyStore {
        &self.body
    }

    /// The accumulated query contributions.
    pub fn query_store(&self) -> &QueryStore {
        &self.query
    }

    fn header_parts(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
        let header_name = HeaderName::try_from(name)
            .map_err(|e| Error::InvalidHeader(format!("invalid header name {:?}: {}", name, e)))?;
        let header_value = HeaderValue::try_from(value)
            .map_err(|e| Error::InvalidHeader(format!("invalid value for {}: {}", name, e)))?;
        Ok((header_name, header_value))
    }

    /// Sets a header, replacing any value set before under the same name.
    pub fn set(mut self, name: &str, value: &str) -> Self {
        match Self::header_parts(name, value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Adds a header value, keeping the values already set under that name.
    pub fn append_header(mut self, name: &str, value: &str) -> Self {
        match Self::header_parts(name, value) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Sends HTTP Basic credentials in the `Authorization` header.
    pub fn set_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = Some((username.to_string(), password.to_string()));
        self
    }

    /// Adds a cookie to the request. Cookies the agent's cookie store holds for
    /// the URL are sent after it.
    pub fn add_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Adds several cookies to the request.
    pub fn add_cookies(mut self, cookies: impl IntoIterator<Item = Cookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Forces the body encoding by type token (`"json"`, `"form"`, `"xml"`...).
    ///
    /// An unknown token is recorded as [`Error::UnknownType`] and the encoding
    /// stays auto-detected.
    pub fn content_type(mut self, token: &str) -> Self {
        match self.agent.registry.resolve(token) {
            Ok(ty) => self.forced_type = Some(ty),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Adds a query contribution: a flat JSON object or `key=value&...`.
    pub fn query(mut self, content: &str) -> Self {
        if let Err(e) = self.query.add_raw(content) {
            self.errors.push(e);
        }
        self
    }

    /// Adds every field of a serializable record as query parameters.
    /// Keys are lower-cased.
    pub fn query_record<T: Serialize + ?Sized>(mut self, record: &T) -> Self {
        if let Err(e) = self.query.add_record(record) {
            self.errors.push(e);
        }
        self
    }

    /// Appends one query parameter as is.
    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.query.append(key, value);
        self
    }

    /// The type the body would be encoded as if sent now.
    pub fn effective_type(&self) -> ContentType {
        self.explicit_type()
            .or_else(|| self.body.detected())
            .unwrap_or(ContentType::Json)
    }

    fn explicit_type(&self) -> Option<ContentType> {
        self.forced_type.or_else(|| {
            let value = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
            self.agent.registry.from_mime(value)
        })
    }

    /// Adds a body contribution.
    ///
    /// JSON objects merge field by field, JSON arrays become array items and
    /// `key=value&...` strings switch the body to form encoding. When the type was
    /// already forced to text, XML or HTML the string is kept verbatim.
    ///
    /// A string that is none of these is only an error if the request is sent
    /// as JSON, form or multipart; the type may still be forced afterwards.
    pub fn send(mut self, content: &str) -> Self {
        if self.explicit_type().is_some_and(ContentType::is_raw) {
            self.body.add_verbatim(content);
        } else {
            self.body.add_raw(content);
        }
        self
    }

    /// Merges a serializable record into the body, overwriting fields of the
    /// same name.
    pub fn send_record<T: Serialize + ?Sized>(mut self, record: &T) -> Self {
        if let Err(e) = self.body.add_record(record) {
            self.errors.push(e);
        }
        self
    }

    /// Attaches in-memory file contents as a multipart part.
    pub fn attach_file(
        mut self,
        field: &str,
        file_name: &str,
        content_type: &str,
        data: impl Into<Bytes>,
    ) -> Self {
        self.body
            .attach(FileAttachment::new(field, file_name, content_type, data));
        self
    }

    /// Reads a file from disk and attaches it as a multipart part named after
    /// the file.
    pub fn attach_path(mut self, field: &str, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(data) => {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.body
                    .attach(FileAttachment::new(field, file_name, "", data));
            }
            Err(e) => self.errors.push(Error::FileRead {
                path: path.display().to_string(),
                source: Arc::new(e),
            }),
        }
        self
    }

    fn transport_mut(&mut self) -> &mut TransportConfig {
        let agent = &self.agent;
        self.transport
            .get_or_insert_with(|| agent.transport.clone())
    }

    /// Routes this request through a proxy. The empty string connects directly.
    pub fn proxy(mut self, proxy: &str) -> Self {
        match ProxySetting::parse(proxy) {
            Ok(setting) => self.transport_mut().proxy = setting,
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Bounds the whole exchange, connection included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the agent's redirect policy for this request.
    pub fn redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.transport_mut().redirect = policy;
        self
    }

    /// Accepts any server certificate for this request.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.transport_mut().accept_invalid_certs = accept;
        self
    }

    /// Re-sends the request while the response status is one of `statuses` and
    /// `strategy` still yields a delay. Transport failures are never retried.
    pub fn retry(
        mut self,
        strategy: RetryStrategy,
        statuses: impl IntoIterator<Item = StatusCode>,
    ) -> Self {
        self.retry = Retry::new(strategy, statuses);
        self
    }

    /// Logs the equivalent curl command at debug level before sending.
    pub fn log_curl(mut self, enabled: bool) -> Self {
        self.log_curl = enabled;
        self
    }

    /// Assembles the request without sending it.
    ///
    /// # Errors
    ///
    /// Returns every error recorded on the chain, or the first assembly error
    /// (bad method, bad URL, body that cannot be encoded as the effective type).
    pub fn make_request(&self) -> Result<PreparedRequest, Errors> {
        if !self.errors.is_empty() {
            return Err(Errors::from(self.errors.clone()));
        }
        self.assemble().map_err(Errors::from)
    }

    fn assemble(&self) -> Result<PreparedRequest, Error> {
        if self.method.is_empty() {
            return Err(Error::InvalidMethod(self.method.clone()));
        }
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| Error::InvalidMethod(self.method.clone()))?;
        let mut url = Url::parse(&self.url)?;

        let ty = self.effective_type();
        let body = self.body.encode(ty, &self.boundary)?;

        let mut headers = self.agent.default_headers.clone();
        if body.is_some() {
            let mime = match ty {
                ContentType::Multipart => format!("{}; boundary={}", ty.mime(), self.boundary),
                _ => ty.mime().to_string(),
            };
            let value = HeaderValue::try_from(mime)
                .map_err(|e| Error::InvalidHeader(format!("content type: {}", e)))?;
            headers.insert(CONTENT_TYPE, value);
        }

        // A multipart body is useless without its boundary, so it keeps ours.
        let keep_content_type = body.is_some() && ty == ContentType::Multipart;
        for name in self.headers.keys() {
            if !(keep_content_type && name == CONTENT_TYPE) {
                headers.remove(name);
            }
        }
        for (name, value) in &self.headers {
            if !(keep_content_type && name == CONTENT_TYPE) {
                headers.append(name.clone(), value.clone());
            }
        }

        if let Some((username, password)) = &self.basic_auth {
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, password));
            let value = HeaderValue::try_from(format!("Basic {}", credentials))
                .map_err(|e| Error::InvalidHeader(format!("authorization: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        if !self.cookies.is_empty() {
            let mut cookie_line = self
                .cookies
                .iter()
                .map(Cookie::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            if let Some(existing) = headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
                cookie_line = format!("{}; {}", existing, cookie_line);
            }
            let value = HeaderValue::try_from(cookie_line)
                .map_err(|e| Error::InvalidHeader(format!("cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        self.query.apply_to(&mut url);

        Ok(PreparedRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Renders the request as an equivalent curl command line.
    ///
    /// # Errors
    ///
    /// Fails the same way as [`Request::make_request`].
    pub fn as_curl_command(&self) -> Result<String, Errors> {
        Ok(self.make_request()?.to_curl())
    }

    /// Sends the request and returns the response with its body as text.
    ///
    /// Nothing is sent if any error was recorded on the chain.
    ///
    /// # Errors
    ///
    /// Returns the recorded errors, an assembly error or the transport failure.
    /// Non-2xx responses are not errors.
    pub async fn end(self) -> Result<(Response, String), Errors> {
        let response = self.execute().await?;
        let text = response.text();
        Ok((response, text))
    }

    /// Sends the request and returns the response with its raw body.
    ///
    /// # Errors
    ///
    /// Same as [`Request::end`].
    pub async fn end_bytes(self) -> Result<(Response, Bytes), Errors> {
        let response = self.execute().await?;
        let bytes = response.bytes().clone();
        Ok((response, bytes))
    }

    /// Sends the request and deserializes the JSON response body into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Request::end`], plus [`Error::DeserializationFailed`] when the
    /// body does not match `T`.
    pub async fn end_struct<T: DeserializeOwned>(self) -> Result<(Response, T), Errors> {
        let response = self.execute().await?;
        match response.json::<T>() {
            Ok(data) => Ok((response, data)),
            Err(e) => {
                let raw_response = response.text();
                tracing::error!(
                    error = %e,
                    raw_response = %raw_response,
                    "Failed to deserialize response"
                );
                Err(Errors::from(Error::DeserializationFailed {
                    raw_response,
                    serde_error: e.to_string(),
                    status: response.status,
                }))
            }
        }
    }

    /// Like [`Request::end`], but also hands the outcome to `callback` before
    /// returning it.
    ///
    /// The callback sees the response (absent on failure), the body text (empty
    /// on failure) and the errors (empty on success).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chainreq::Agent;
    ///
    /// # async fn example() {
    /// let _ = Agent::new()
    ///     .get("https://api.example.com/health")
    ///     .end_with(|response, body, errors| {
    ///         match response {
    ///             Some(r) => println!("{} {}", r.status, body),
    ///             None => println!("failed: {:?}", errors),
    ///         }
    ///     })
    ///     .await;
    /// # }
    /// ```
    pub async fn end_with<F>(self, callback: F) -> Result<(Response, String), Errors>
    where
        F: FnOnce(Option<&Response>, &str, &[Error]),
    {
        let result = self.end().await;
        match &result {
            Ok((response, body)) => callback(Some(response), body, &[]),
            Err(errors) => callback(None, "", errors),
        }
        result
    }

    async fn execute(self) -> Result<Response, Errors> {
        if !self.errors.is_empty() {
            tracing::warn!(
                errors = self.errors.len(),
                method = %self.method,
                url = %self.url,
                "Refusing to send request with recorded errors"
            );
            return Err(Errors::from(self.errors));
        }

        let prepared = self.make_request()?;

        let client = match &self.transport {
            Some(transport) => transport.build_client().map_err(Errors::from)?,
            None => self.agent.http_client.clone(),
        };
        let timeout = self.timeout.or(self.agent.timeout);
        let cookie_jar = self
            .transport
            .as_ref()
            .unwrap_or(&self.agent.transport)
            .cookie_jar
            .clone();

        if self.log_curl {
            tracing::debug!(curl = %prepared.to_curl(), "Equivalent curl command");
        }

        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            tracing::debug!(
                method = %prepared.method,
                url = %prepared.url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let mut headers = prepared.headers.clone();
            if let Some(jar) = &cookie_jar {
                merge_stored_cookies(&mut headers, jar, &prepared.url);
            }

            let mut request = client
                .request(prepared.method.clone(), prepared.url.clone())
                .headers(headers);
            if let Some(body) = &prepared.body {
                request = request.body(body.clone());
            }
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => return Err(transport_failure(e, &prepared, attempt)),
            };

            let status = response.status();
            if let Some(delay) = self.retry.delay_after(status, attempt) {
                tracing::info!(
                    status = status.as_u16(),
                    delay_ms = delay.as_millis(),
                    attempt = attempt,
                    "Retrying request after delay"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let headers = response.headers().clone();
            let final_url = response.url().clone();
            let version = response.version();
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => return Err(transport_failure(e, &prepared, attempt)),
            };
            let latency = start_time.elapsed();

            tracing::info!(
                status = status.as_u16(),
                latency_ms = latency.as_millis(),
                attempts = attempt,
                "Received HTTP response"
            );

            return Ok(Response::new(
                status, headers, final_url, version, body, latency, attempt,
            ));
        }
    }
}

// The transport only adds stored cookies when no `Cookie` header is set.
fn merge_stored_cookies(headers: &mut HeaderMap, jar: &Jar, url: &Url) {
    let Some(explicit) = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    else {
        return;
    };
    let Some(stored) = jar.cookies(url) else {
        return;
    };
    if let Ok(stored) = stored.to_str() {
        if let Ok(value) = HeaderValue::try_from(format!("{}; {}", explicit, stored)) {
            headers.insert(COOKIE, value);
        }
    }
}

fn transport_failure(error: reqwest::Error, prepared: &PreparedRequest, attempt: usize) -> Errors {
    let error = Error::from_transport(error);
    tracing::warn!(
        error = %error,
        attempt = attempt,
        method = %prepared.method,
        url = %prepared.url,
        "Request failed"
    );
    Errors::from(error)
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("forced_type", &self.forced_type)
            .field("body", &self.body)
            .field("query", &self.query)
            .field("cookies", &self.cookies)
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .field("retry", &self.retry)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Agent, ContentType, Error, ErrorKind};
    use serde::Serialize;
    use serde_json::Value;

    fn agent() -> Agent {
        Agent::builder().cookie_store(false).build().unwrap()
    }

    #[test]
    fn test_unknown_type_is_recorded_once() {
        let request = agent()
            .post("http://localhost/")
            .content_type("bogus")
            .send(r#"{"a":1}"#);

        assert_eq!(request.errors().len(), 1);
        assert!(request.errors()[0].to_string().contains("bogus"));
        assert_eq!(request.effective_type(), ContentType::Json);

        let errors = request.make_request().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_kind(ErrorKind::Configuration));
    }

    #[test]
    fn test_json_union_body() {
        let prepared = agent()
            .post("http://localhost/")
            .send(r#"{"a":"1"}"#)
            .send(r#"{"b":"2"}"#)
            .make_request()
            .unwrap();

        assert_eq!(prepared.body_text().unwrap(), r#"{"a":"1","b":"2"}"#);
        assert_eq!(prepared.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_large_id_survives_form_encoding() {
        let prepared = agent()
            .post("http://localhost/")
            .send(r#"{"id":123456789,"name":"nemo"}"#)
            .content_type("form")
            .make_request()
            .unwrap();

        assert_eq!(prepared.body_text().unwrap(), "id=123456789&name=nemo");
        assert_eq!(
            prepared.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_form_strings_are_detected() {
        let prepared = agent()
            .post("http://localhost/")
            .send("query1=test")
            .send("query2=test")
            .make_request()
            .unwrap();

        assert_eq!(prepared.body_text().unwrap(), "query1=test&query2=test");
        assert_eq!(
            prepared.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_explicit_content_type_header_wins() {
        let prepared = agent()
            .post("http://localhost/")
            .set("Content-Type", "application/json; charset=utf-8")
            .send(r#"{"a":1}"#)
            .make_request()
            .unwrap();

        assert_eq!(
            prepared.header("content-type"),
            Some("application/json; charset=utf-8")
        );
    }

    #[test]
    fn test_stored_cookies_join_chain_cookies() {
        let url = url::Url::parse("http://localhost/me").unwrap();
        let jar = reqwest::cookie::Jar::default();
        jar.add_cookie_str("session=abc; Path=/", &url);

        let mut headers = http::HeaderMap::new();
        super::merge_stored_cookies(&mut headers, &jar, &url);
        assert!(headers.get("cookie").is_none());

        headers.insert("cookie", http::HeaderValue::from_static("flavor=mint"));
        super::merge_stored_cookies(&mut headers, &jar, &url);
        assert_eq!(headers.get("cookie").unwrap(), "flavor=mint; session=abc");
    }

    #[test]
    fn test_text_type_forced_after_send() {
        let text = "Tom &amp; Jerry; 100% fun";
        let request = agent()
            .post("http://localhost/")
            .send(text)
            .content_type("text");
        assert!(request.errors().is_empty());

        let prepared = request.make_request().unwrap();
        assert_eq!(prepared.body_text().unwrap(), text);
        assert_eq!(prepared.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_unparsable_send_fails_as_json() {
        let errors = agent()
            .post("http://localhost/")
            .send("Tom &amp; Jerry; 100% fun")
            .make_request()
            .unwrap_err();
        assert!(matches!(errors[0], Error::InvalidBody { .. }));
    }

    #[test]
    fn test_content_type_header_selects_raw_body() {
        let xml = "<note><to>Tove</to></note>";
        let prepared = agent()
            .post("http://localhost/")
            .set("Content-Type", "application/xml")
            .send(xml)
            .make_request()
            .unwrap();

        assert_eq!(prepared.body_text().unwrap(), xml);
        assert_eq!(prepared.header("content-type"), Some("application/xml"));
    }

    #[test]
    fn test_no_body_means_no_content_type() {
        let prepared = agent().get("http://localhost/").make_request().unwrap();
        assert!(prepared.body.is_none());
        assert!(prepared.header("content-type").is_none());
    }

    #[test]
    fn test_query_keeps_url_params_first() {
        let prepared = agent()
            .get("http://localhost/search?z=0")
            .param("b", "1")
            .param("a", "2")
            .make_request()
            .unwrap();

        assert_eq!(prepared.url.query(), Some("z=0&b=1&a=2"));
    }

    #[test]
    fn test_basic_auth_header() {
        let prepared = agent()
            .get("http://localhost/")
            .set_basic_auth("myuser", "mypass")
            .make_request()
            .unwrap();

        assert_eq!(
            prepared.header("authorization"),
            Some("Basic bXl1c2VyOm15cGFzcw==")
        );
    }

    #[test]
    fn test_cookies_share_one_header() {
        let prepared = agent()
            .get("http://localhost/")
            .add_cookie(super::Cookie::new("API-Cookie-Name", "api-cookie-value"))
            .add_cookies([
                super::Cookie::new("a", "1"),
                super::Cookie::new("b", "2"),
            ])
            .make_request()
            .unwrap();

        assert_eq!(
            prepared.header("cookie"),
            Some("API-Cookie-Name=api-cookie-value; a=1; b=2")
        );
    }

    #[test]
    fn test_empty_method_is_rejected_at_assembly() {
        let request = agent().custom_method("", "http://localhost/");
        assert!(request.errors().is_empty());

        let errors = request.make_request().unwrap_err();
        assert!(matches!(errors[0], Error::InvalidMethod(_)));
    }

    #[test]
    fn test_bad_url_is_rejected_at_assembly() {
        let errors = agent().get("not a url").make_request().unwrap_err();
        assert!(matches!(errors[0], Error::InvalidUrl(_)));
    }

    #[test]
    fn test_invalid_header_is_soft() {
        let request = agent().get("http://localhost/").set("bad header", "x");
        assert!(matches!(request.errors()[0], Error::InvalidHeader(_)));
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let request = agent()
            .post("http://localhost/?x=1")
            .query(r#"{"b":"1","a":"2"}"#)
            .send("name=nemo")
            .attach_file("upload", "a.txt", "text/plain", "hello");

        assert_eq!(request.make_request().unwrap(), request.make_request().unwrap());
    }

    #[test]
    fn test_clones_do_not_share_state() {
        let base = agent().post("http://localhost/").send(r#"{"shared":true}"#);
        let first = base.clone().send(r#"{"first":1}"#);
        let second = base.clone().set("X-Second", "yes");

        let body: Value =
            serde_json::from_slice(first.make_request().unwrap().body.as_ref().unwrap()).unwrap();
        assert_eq!(body["first"], 1);

        let second = second.make_request().unwrap();
        let body: Value = serde_json::from_slice(second.body.as_ref().unwrap()).unwrap();
        assert!(body.get("first").is_none());
        assert_eq!(second.header("x-second"), Some("yes"));

        assert!(base.make_request().unwrap().header("x-second").is_none());
    }

    #[test]
    fn test_multipart_keeps_boundary_header() {
        let prepared = agent()
            .post("http://localhost/")
            .set("Content-Type", "multipart/form-data")
            .send("name=nemo")
            .attach_file("upload", "a.txt", "text/plain", "hello")
            .make_request()
            .unwrap();

        let content_type = prepared.header("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let boundary = content_type.trim_start_matches("multipart/form-data; boundary=");
        assert!(prepared.body_text().unwrap().contains(boundary));
    }

    #[test]
    fn test_send_record_keeps_field_names() {
        #[derive(Serialize)]
        struct Pet {
            #[serde(rename = "Name")]
            name: &'static str,
        }

        let prepared = agent()
            .post("http://localhost/")
            .send_record(&Pet { name: "nemo" })
            .make_request()
            .unwrap();

        assert_eq!(prepared.body_text().unwrap(), r#"{"Name":"nemo"}"#);
    }

    #[test]
    fn test_attach_missing_path_is_recorded() {
        let request = agent()
            .post("http://localhost/")
            .attach_path("upload", "/definitely/not/here.txt");
        assert!(matches!(request.errors()[0], Error::FileRead { .. }));
    }

    #[test]
    fn test_transport_override_is_copy_on_write() {
        let base = agent().get("http://localhost/");
        let proxied = base.clone().proxy("http://myproxy:9999");

        assert!(base.transport.is_none());
        assert!(proxied.transport.is_some());
    }
}
