//! # values-schema
//!
//! An HTTP service that turns Helm values files into JSON Schemas.
//!
//! `GET /<org>/<repo>/<ref>/<path>/values.yaml` downloads the file from
//! `https://raw.githubusercontent.com`, derives a schema from it and answers
//! with `application/schema+json`. Each successful result is cached in
//! memory for the life of the process.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use values_schema::cache::ResultCache;
//! use values_schema::fetch::{FetcherConfig, HttpFetcher};
//! use values_schema::pipeline::Pipeline;
//! use values_schema::server::Server;
//! use values_schema::transform::ValuesSchemaTransformer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Arc::new(Pipeline::new(
//!         Arc::new(ResultCache::new()),
//!         Arc::new(HttpFetcher::new(FetcherConfig::default())?),
//!         Arc::new(ValuesSchemaTransformer::default()),
//!     ));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server
//!         .run(move |req| {
//!             let pipeline = Arc::clone(&pipeline);
//!             async move { pipeline.handle(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod fetch;
pub mod http;
pub mod pipeline;
pub mod server;
pub mod transform;

pub use cache::{Artifact, CacheKey, ResultCache};
pub use config::Config;
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use pipeline::{ErrorEnvelope, Pipeline, PipelineError};
pub use server::{Server, ServerError};
pub use transform::{TransformError, Transformer, ValuesSchemaTransformer};
