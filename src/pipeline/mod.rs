//! Request pipeline: method check, cache lookup, then fetch and transform on a miss.
//!
//! One [`Pipeline`] is shared by every connection task. Its only mutable
//! state is the [`ResultCache`]; downloads and schema generation run
//! outside any lock, so a slow upstream never holds up other requests.
//!
//! Two concurrent first requests for the same path may both download and
//! generate. Both produce the same artifact and the later write wins.

use std::sync::Arc;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::{Artifact, CacheKey, ResultCache};
use crate::fetch::Fetcher;
use crate::http::{Method, Request, Response, StatusCode};
use crate::transform::{TransformError, Transformer};

mod error;

pub use error::{ErrorEnvelope, PipelineError};

/// Content type of every schema response.
pub const SCHEMA_CONTENT_TYPE: &str = "application/schema+json";

/// Body served for `GET /`.
pub const GREETING: &str = "Hello World";

/// Serves schemas for values paths, computing each at most once per
/// successful result.
pub struct Pipeline {
    cache: Arc<ResultCache>,
    fetcher: Arc<dyn Fetcher>,
    transformer: Arc<dyn Transformer>,
}

impl Pipeline {
    pub fn new(
        cache: Arc<ResultCache>,
        fetcher: Arc<dyn Fetcher>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            transformer,
        }
    }

    /// Answers one inbound request and writes an access-log line for it.
    pub async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();

        let response = match self.dispatch(request.method(), request.path()).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    PipelineError::TransformFailed(cause) => {
                        error!(path = %request.path(), error = %cause, "schema generation failed");
                    }
                    PipelineError::FetchFailed(cause) => {
                        warn!(path = %request.path(), error = %cause, "values download failed");
                    }
                    PipelineError::MethodNotAllowed => {
                        warn!(method = %request.method(), path = %request.path(), "method not allowed");
                    }
                }
                err.into_response()
            }
        };

        info!(
            "{} {} - {} ({:?})",
            request.method(),
            request.path(),
            response.status().as_u16(),
            start.elapsed()
        );
        response
    }

    async fn dispatch(&self, method: &Method, path: &str) -> Result<Response, PipelineError> {
        if *method != Method::Get {
            return Err(PipelineError::MethodNotAllowed);
        }

        if path.is_empty() || path == "/" {
            return Ok(Response::new(StatusCode::Ok).body(GREETING));
        }

        let artifact = self.resolve(path).await?;
        Ok(Response::new(StatusCode::Ok)
            .header("Content-Type", SCHEMA_CONTENT_TYPE)
            .body_bytes(artifact))
    }

    /// Returns the schema for `path`, from the cache or freshly computed.
    ///
    /// Only a successful download followed by a successful transform is
    /// stored; every failure leaves the cache untouched.
    pub async fn resolve(&self, path: &str) -> Result<Artifact, PipelineError> {
        if let Some(artifact) = self.cache.get(path) {
            debug!(path = %path, bytes = artifact.len(), "cache hit");
            return Ok(artifact);
        }

        let document = self.fetcher.fetch(path).await?;
        let artifact = self.transform(document, path).await?;

        self.cache.set(CacheKey::from(path), artifact.clone());
        Ok(artifact)
    }

    async fn transform(&self, document: Bytes, label: &str) -> Result<Artifact, TransformError> {
        let transformer = Arc::clone(&self.transformer);
        let label = label.to_owned();

        tokio::task::spawn_blocking(move || transformer.transform(&document, &label))
            .await
            .map_err(|e| TransformError::Aborted(e.to_string()))?
    }
}
