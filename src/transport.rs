//! Connection-level settings and the reqwest client built from them.
//!
//! An [`Agent`](crate::Agent) builds one client from its settings and shares it
//! with every chain it starts. A chain that changes any of these settings works
//! on its own copy and gets a client of its own; the agent's client is never
//! touched. The cookie jar is shared either way.

use crate::{Error, Result};
use reqwest::cookie::Jar;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Maximum redirects followed by [`RedirectPolicy::default`].
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

type RedirectFn = dyn Fn(&Url, &[Url]) -> bool + Send + Sync;

/// Decides whether redirects are followed.
///
/// # Examples
///
/// ```
/// use chainreq::RedirectPolicy;
///
/// // Follow redirects, but never leave example.com.
/// let policy = RedirectPolicy::custom(|next, _previous| {
///     next.host_str() == Some("example.com")
/// });
/// ```
#[derive(Clone)]
pub enum RedirectPolicy {
    /// Follow up to this many redirects.
    Limited(usize),
    /// Never follow redirects; the redirect response is returned as is.
    None,
    /// Follow a redirect when the function returns `true`. It receives the next
    /// URL and the URLs visited so far.
    Custom(Arc<RedirectFn>),
}

impl RedirectPolicy {
    /// Creates a [`RedirectPolicy::Custom`] from a closure.
    pub fn custom<F>(policy: F) -> Self
    where
        F: Fn(&Url, &[Url]) -> bool + Send + Sync + 'static,
    {
        RedirectPolicy::Custom(Arc::new(policy))
    }

    fn to_reqwest(&self) -> reqwest::redirect::Policy {
        match self {
            RedirectPolicy::Limited(max) => reqwest::redirect::Policy::limited(*max),
            RedirectPolicy::None => reqwest::redirect::Policy::none(),
            RedirectPolicy::Custom(policy) => {
                let policy = Arc::clone(policy);
                reqwest::redirect::Policy::custom(move |attempt| {
                    if policy(attempt.url(), attempt.previous()) {
                        attempt.follow()
                    } else {
                        attempt.stop()
                    }
                })
            }
        }
    }
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        RedirectPolicy::Limited(DEFAULT_MAX_REDIRECTS)
    }
}

impl fmt::Debug for RedirectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectPolicy::Limited(max) => f.debug_tuple("Limited").field(max).finish(),
            RedirectPolicy::None => f.write_str("None"),
            RedirectPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Which proxy requests go through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxySetting {
    /// Use the proxy configured in the environment (`HTTP_PROXY`, ...).
    #[default]
    System,
    /// Connect directly.
    Disabled,
    /// Send everything through this proxy.
    Url(Url),
}

impl ProxySetting {
    /// Parses a proxy URL. The empty string disables proxying.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProxy`] if the URL is unusable as a proxy.
    pub fn parse(proxy: &str) -> Result<Self> {
        if proxy.is_empty() {
            return Ok(ProxySetting::Disabled);
        }
        let url = Url::parse(proxy).map_err(|e| Error::InvalidProxy(format!("{}: {}", proxy, e)))?;
        reqwest::Proxy::all(url.as_str())
            .map_err(|e| Error::InvalidProxy(format!("{}: {}", proxy, e)))?;
        Ok(ProxySetting::Url(url))
    }
}

/// Settings that shape the underlying connection handling.
#[derive(Clone, Default)]
pub struct TransportConfig {
    pub(crate) proxy: ProxySetting,
    pub(crate) redirect: RedirectPolicy,
    pub(crate) accept_invalid_certs: bool,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) cookie_jar: Option<Arc<Jar>>,
}

impl TransportConfig {
    /// Builds a reqwest client from these settings.
    pub(crate) fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .redirect(self.redirect.to_reqwest())
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        builder = match &self.proxy {
            ProxySetting::System => builder,
            ProxySetting::Disabled => builder.no_proxy(),
            ProxySetting::Url(url) => builder.proxy(
                reqwest::Proxy::all(url.as_str())
                    .map_err(|e| Error::InvalidProxy(format!("{}: {}", url, e)))?,
            ),
        };

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(jar) = &self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder
            .build()
            .map_err(|e| Error::ConfigurationError(format!("Failed to build HTTP client: {}", e)))
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("proxy", &self.proxy)
            .field("redirect", &self.redirect)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("connect_timeout", &self.connect_timeout)
            .field("cookie_store", &self.cookie_jar.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_proxy_disables() {
        assert_eq!(ProxySetting::parse("").unwrap(), ProxySetting::Disabled);
    }

    #[test]
    fn test_proxy_url_is_parsed() {
        match ProxySetting::parse("http://myproxy:9999").unwrap() {
            ProxySetting::Url(url) => assert_eq!(url.port(), Some(9999)),
            other => panic!("Expected proxy URL, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_proxy_is_rejected() {
        assert!(matches!(
            ProxySetting::parse("not a url"),
            Err(Error::InvalidProxy(_))
        ));
    }

    #[test]
    fn test_default_redirect_policy_is_limited() {
        assert!(matches!(
            RedirectPolicy::default(),
            RedirectPolicy::Limited(DEFAULT_MAX_REDIRECTS)
        ));
    }
}
