//! The shared root that request chains are started from.
//!
//! An [`Agent`] owns the reqwest client (connection pool, TLS setup, cookie jar)
//! plus defaults applied to every chain. Cloning an agent is cheap and every
//! clone shares the same client.

use crate::content_type::TypeRegistry;
use crate::request::Request;
use crate::transport::{ProxySetting, RedirectPolicy, TransportConfig};
use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;

/// Starts request chains that share one HTTP client.
///
/// # Examples
///
/// ```no_run
/// use chainreq::Agent;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let agent = Agent::builder()
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
///
/// let (response, body) = agent
///     .post("https://api.example.com/search")
///     .send(r#"{"query":"sushi"}"#)
///     .end()
///     .await?;
///
/// println!("{}: {}", response.status, body);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

#[derive(Debug)]
pub(crate) struct AgentInner {
    pub(crate) http_client: reqwest::Client,
    pub(crate) transport: TransportConfig,
    pub(crate) registry: TypeRegistry,
    pub(crate) default_headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
}

impl Agent {
    /// Creates an agent with default settings.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized, like
    /// `reqwest::Client::new`. Use [`Agent::builder`] to handle that case.
    pub fn new() -> Self {
        match Self::builder().build() {
            Ok(agent) => agent,
            Err(e) => panic!("failed to build default agent: {}", e),
        }
    }

    /// Creates a new `AgentBuilder` for configuring an agent.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// The type registry chains started from this agent use.
    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    fn start(&self, method: impl Into<String>, url: impl Into<String>) -> Request {
        Request::new(Arc::clone(&self.inner), method.into(), url.into())
    }

    /// Starts a GET chain.
    pub fn get(&self, url: impl Into<String>) -> Request {
        self.start(Method::GET.as_str(), url)
    }

    /// Starts a POST chain.
    pub fn post(&self, url: impl Into<String>) -> Request {
        self.start(Method::POST.as_str(), url)
    }

    /// Starts a PUT chain.
    pub fn put(&self, url: impl Into<String>) -> Request {
        self.start(Method::PUT.as_str(), url)
    }

    /// Starts a PATCH chain.
    pub fn patch(&self, url: impl Into<String>) -> Request {
        self.start(Method::PATCH.as_str(), url)
    }

    /// Starts a DELETE chain.
    pub fn delete(&self, url: impl Into<String>) -> Request {
        self.start(Method::DELETE.as_str(), url)
    }

    /// Starts a HEAD chain.
    pub fn head(&self, url: impl Into<String>) -> Request {
        self.start(Method::HEAD.as_str(), url)
    }

    /// Starts an OPTIONS chain.
    pub fn options(&self, url: impl Into<String>) -> Request {
        self.start(Method::OPTIONS.as_str(), url)
    }

    /// Starts a chain with an arbitrary method such as `TRACE` or `PROPFIND`.
    ///
    /// The method is validated when the request is assembled; an empty or
    /// malformed method surfaces as [`Error::InvalidMethod`] from the terminal
    /// operation.
    pub fn custom_method(&self, method: impl Into<String>, url: impl Into<String>) -> Request {
        self.start(method, url)
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring and creating an [`Agent`].
///
/// # Examples
///
/// ```no_run
/// use chainreq::{AgentBuilder, RedirectPolicy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), chainreq::Error> {
/// let agent = AgentBuilder::new()
///     .timeout(Duration::from_secs(10))
///     .proxy("http://myproxy:9999")?
///     .redirect_policy(RedirectPolicy::None)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct AgentBuilder {
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    transport: TransportConfig,
    cookie_store: bool,
    registry: TypeRegistry,
}

impl AgentBuilder {
    /// Creates a new `AgentBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            default_headers: HeaderMap::new(),
            timeout: None,
            transport: TransportConfig::default(),
            cookie_store: true,
            registry: TypeRegistry::standard(),
        }
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// Headers set on a chain replace defaults of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::InvalidHeader(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::InvalidHeader(format!("invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the default timeout covering connection and the whole exchange.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bounds connection establishment separately from the overall timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = Some(timeout);
        self
    }

    /// Routes requests through a proxy. The empty string disables proxying,
    /// including any proxy configured in the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProxy`] if the URL cannot be used as a proxy.
    pub fn proxy(mut self, proxy: &str) -> Result<Self> {
        self.transport.proxy = ProxySetting::parse(proxy)?;
        Ok(self)
    }

    /// Sets the redirect policy. Defaults to following up to 10 redirects.
    pub fn redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.transport.redirect = policy;
        self
    }

    /// Accepts any server certificate. Only for testing against self-signed
    /// servers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.transport.accept_invalid_certs = accept;
        self
    }

    /// Keeps cookies set by servers and sends them back on later requests.
    /// Enabled by default.
    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    /// Replaces the table of accepted type tokens.
    pub fn type_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Builds the configured `Agent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn build(mut self) -> Result<Agent> {
        if self.cookie_store {
            self.transport.cookie_jar = Some(Arc::new(Jar::default()));
        }

        let http_client = self.transport.build_client()?;

        Ok(Agent {
            inner: Arc::new(AgentInner {
                http_client,
                transport: self.transport,
                registry: self.registry,
                default_headers: self.default_headers,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
