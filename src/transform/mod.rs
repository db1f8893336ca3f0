//! Schema derivation: turns a raw values document into a JSON Schema.
//!
//! The pipeline only sees the [`Transformer`] trait. [`ValuesSchemaTransformer`]
//! is the production implementation: it stages the document in a scratch
//! directory and runs the file-based [`generator`] over it.

use std::fs;
use std::io;

use bytes::Bytes;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

pub mod generator;

use generator::{GeneratorConfig, SchemaRoot};

/// Errors produced while deriving a schema.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("values document must be a mapping at the top level")]
    InvalidRoot,

    #[error("mapping keys must be scalars")]
    UnsupportedKey,

    #[error("unsupported JSON Schema draft {0}")]
    UnsupportedDraft(u32),

    #[error("failed to serialize schema: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("schema generation aborted: {0}")]
    Aborted(String),
}

/// Derives an artifact from a raw document.
///
/// Implementations are synchronous and may block; callers on an async
/// runtime should run them on a blocking thread. `label` names the document
/// in the artifact's metadata and has no other effect.
pub trait Transformer: Send + Sync {
    fn transform(&self, document: &[u8], label: &str) -> Result<Bytes, TransformError>;
}

/// Options for [`ValuesSchemaTransformer`].
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    pub draft: u32,
    pub indent: usize,
    pub id: String,
    pub title: String,
    pub additional_properties: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            draft: 2020,
            indent: 4,
            id: "https://example.com/schema".to_owned(),
            title: "Helm Values Schema".to_owned(),
            additional_properties: true,
        }
    }
}

/// Generates a Helm values JSON Schema through a per-call scratch directory.
///
/// The scratch directory is a [`TempDir`], so it is removed when the call
/// returns, whether generation succeeded or not.
///
/// # Examples
///
/// ```
/// use values_schema::transform::{Transformer, ValuesSchemaTransformer};
///
/// let transformer = ValuesSchemaTransformer::default();
/// let schema = transformer
///     .transform(b"replicaCount: 1\n", "/org/chart/main/values.yaml")
///     .unwrap();
/// let text = std::str::from_utf8(&schema).unwrap();
/// assert!(text.contains("\"replicaCount\""));
/// assert!(text.contains("Generated Helm Values Schema for /org/chart/main/values.yaml"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValuesSchemaTransformer {
    options: SchemaOptions,
}

impl ValuesSchemaTransformer {
    pub fn new(options: SchemaOptions) -> Self {
        Self { options }
    }
}

impl Transformer for ValuesSchemaTransformer {
    fn transform(&self, document: &[u8], label: &str) -> Result<Bytes, TransformError> {
        let scratch = tempfile::Builder::new()
            .prefix("values-")
            .tempdir()
            .map_err(|source| TransformError::Io {
                context: "create scratch directory",
                source,
            })?;

        let output = run_in(&scratch, document, label, &self.options)?;
        debug!(label = %label, bytes = output.len(), "generated schema");
        Ok(output)
    }
}

fn run_in(
    scratch: &TempDir,
    document: &[u8],
    label: &str,
    options: &SchemaOptions,
) -> Result<Bytes, TransformError> {
    let input = scratch.path().join("values.yaml");
    let output = scratch.path().join("values.schema.json");

    fs::write(&input, document).map_err(|source| TransformError::Io {
        context: "write values file",
        source,
    })?;

    generator::generate(&GeneratorConfig {
        inputs: vec![input],
        output: output.clone(),
        draft: options.draft,
        indent: options.indent,
        root: SchemaRoot {
            id: options.id.clone(),
            title: options.title.clone(),
            description: format!("Generated Helm Values Schema for {label}"),
            additional_properties: options.additional_properties,
        },
    })?;

    let schema = fs::read(&output).map_err(|source| TransformError::Io {
        context: "read generated schema",
        source,
    })?;
    Ok(Bytes::from(schema))
}
