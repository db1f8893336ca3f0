//! Values fetcher: downloads raw Helm values files from a fixed origin.
//!
//! Callers only ever supply the path; the scheme, host and port come from
//! the [`FetcherConfig`] the fetcher was built with. A path that would
//! resolve anywhere else is rejected before a request is made.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Origin every values path is resolved against.
pub const DEFAULT_ORIGIN: &str = "https://raw.githubusercontent.com";

/// `User-Agent` sent with every download.
pub const USER_AGENT: &str = "helm-values-schema-generator/1.0";

/// `Accept` sent with every download.
pub const ACCEPT_VALUES: &str = "text/plain, application/x-yaml, */*";

/// Upper bound on one download, from connect to the last body byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A pinned, boxed, `Send` future borrowed for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced while downloading a values file.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid values path {path:?}")]
    InvalidPath { path: String },

    #[error("invalid origin {origin:?}: {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to download file: timed out after {}s", .timeout.as_secs_f32())]
    Timeout {
        url: String,
        timeout: Duration,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to download file: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to download file: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Source of raw values documents.
///
/// The pipeline only depends on this trait so tests can substitute an
/// in-process fake for the network.
pub trait Fetcher: Send + Sync {
    /// Downloads the document at `path` and returns its full body.
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub origin: String,
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the fetcher at a different origin, e.g. a mirror or a test server.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Url,
    prefix: String,
    timeout: Duration,
}

impl HttpFetcher {
    /// Builds a fetcher for `config.origin`.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidOrigin`] if the origin is not an absolute URL,
    /// [`FetchError::Client`] if the TLS backend cannot be initialised.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let origin = Url::parse(&config.origin).map_err(|source| FetchError::InvalidOrigin {
            origin: config.origin.clone(),
            source,
        })?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            origin,
            prefix: config.origin.trim_end_matches('/').to_owned(),
            timeout: config.timeout,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolves `path` against the configured origin.
    ///
    /// The path is appended verbatim; the result must keep the origin's
    /// scheme, host and port.
    pub fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        let invalid = || FetchError::InvalidPath {
            path: path.to_owned(),
        };

        if !path.starts_with('/') {
            return Err(invalid());
        }

        let url = Url::parse(&format!("{}{}", self.prefix, path)).map_err(|_| invalid())?;
        let same_origin = url.scheme() == self.origin.scheme()
            && url.host_str() == self.origin.host_str()
            && url.port_or_known_default() == self.origin.port_or_known_default();
        if !same_origin {
            return Err(invalid());
        }

        Ok(url)
    }

    async fn download(&self, path: &str) -> Result<Bytes, FetchError> {
        let url = self.resolve(path)?;
        let source = url.to_string();
        debug!(url = %source, "downloading values file");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_VALUES)
            .send()
            .await
            .map_err(|e| self.transport_error(&source, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: source,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(&source, e)
            } else {
                FetchError::Body {
                    url: source.clone(),
                    source: e,
                }
            }
        })?;

        info!(bytes = body.len(), url = %source, "downloaded values file");
        Ok(body)
    }

    fn transport_error(&self, url: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_owned(),
                timeout: self.timeout,
                source,
            }
        } else {
            FetchError::Request {
                url: url.to_owned(),
                source,
            }
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(self.download(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn fetcher(origin: &str) -> HttpFetcher {
        HttpFetcher::new(FetcherConfig::new().with_origin(origin)).unwrap()
    }

    #[test]
    fn resolves_against_default_origin() {
        let f = HttpFetcher::new(FetcherConfig::default()).unwrap();
        let url = f.resolve("/org/repo/main/values.yaml").unwrap();
        assert_eq!(
            url.as_str(),
            "https://raw.githubusercontent.com/org/repo/main/values.yaml"
        );
    }

    #[test]
    fn trailing_slash_on_origin_is_ignored() {
        let f = fetcher("http://127.0.0.1:9000/");
        let url = f.resolve("/values.yaml").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/values.yaml");
    }

    #[test]
    fn relative_paths_are_rejected() {
        let f = fetcher(DEFAULT_ORIGIN);
        assert!(matches!(
            f.resolve("values.yaml"),
            Err(FetchError::InvalidPath { .. })
        ));
        assert!(matches!(
            f.resolve("http://evil.example/values.yaml"),
            Err(FetchError::InvalidPath { .. })
        ));
    }

    #[test]
    fn paths_cannot_change_host_or_port() {
        let f = fetcher(DEFAULT_ORIGIN);
        // Authority-looking prefixes stay inside the path.
        let url = f.resolve("//evil.example/values.yaml").unwrap();
        assert_eq!(url.host_str(), Some("raw.githubusercontent.com"));

        let url = f.resolve("/@evil.example/values.yaml").unwrap();
        assert_eq!(url.host_str(), Some("raw.githubusercontent.com"));
    }

    #[test]
    fn bad_origin_is_reported() {
        let err = HttpFetcher::new(FetcherConfig::new().with_origin("not a url")).unwrap_err();
        assert!(matches!(err, FetchError::InvalidOrigin { .. }));
    }

    #[test]
    fn status_error_mentions_code() {
        let err = FetchError::Status {
            url: "https://raw.githubusercontent.com/x".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "failed to download file: HTTP 404");
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        // Accepts connections (via the backlog) but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let f = HttpFetcher::new(
            FetcherConfig::new()
                .with_origin(format!("http://{addr}"))
                .with_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let err = f.fetch("/values.yaml").await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
        drop(listener);
    }

    #[tokio::test]
    async fn refused_connection_is_a_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let f = fetcher(&format!("http://{addr}"));
        let err = f.fetch("/values.yaml").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }), "got {err:?}");
    }
}
