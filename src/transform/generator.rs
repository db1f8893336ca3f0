//! File-based JSON Schema generator for Helm values files.
//!
//! [`generate`] reads one or more YAML inputs, merges them, infers a schema
//! from the merged values and writes it to the output path.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};
use serde_yaml::{Mapping, Value as Yaml};

use super::TransformError;

/// Top-level metadata written into every generated schema.
#[derive(Debug, Clone)]
pub struct SchemaRoot {
    pub id: String,
    pub title: String,
    pub description: String,
    pub additional_properties: bool,
}

/// Inputs, output and formatting for one [`generate`] run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// JSON Schema draft: 4, 6, 7, 2019 or 2020.
    pub draft: u32,
    pub indent: usize,
    pub root: SchemaRoot,
}

/// Returns the `$schema` URI for a draft number.
pub fn draft_uri(draft: u32) -> Result<&'static str, TransformError> {
    match draft {
        4 => Ok("http://json-schema.org/draft-04/schema#"),
        6 => Ok("http://json-schema.org/draft-06/schema#"),
        7 => Ok("http://json-schema.org/draft-07/schema#"),
        2019 => Ok("https://json-schema.org/draft/2019-09/schema"),
        2020 => Ok("https://json-schema.org/draft/2020-12/schema"),
        other => Err(TransformError::UnsupportedDraft(other)),
    }
}

/// Generates a schema from `config.inputs` and writes it to `config.output`.
pub fn generate(config: &GeneratorConfig) -> Result<(), TransformError> {
    let schema_uri = draft_uri(config.draft)?;

    let mut merged = Mapping::new();
    for input in &config.inputs {
        let raw = fs::read(input).map_err(|source| TransformError::Io {
            context: "read values file",
            source,
        })?;
        merge_into(&mut merged, parse_values(&raw)?);
    }

    let schema = build_schema(&merged, schema_uri, &config.root)?;
    let rendered = render(&schema, config.indent)?;

    fs::write(&config.output, rendered).map_err(|source| TransformError::Io {
        context: "write schema file",
        source,
    })
}

/// Parses a values document; an empty document is an empty mapping.
///
/// Only the first document of a multi-document stream is read. Merge keys
/// (`<<: *anchor`) are expanded into the mapping that holds them.
pub fn parse_values(raw: &[u8]) -> Result<Mapping, TransformError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Mapping::new());
    }
    // No document at all: comments only, or bytes that are not UTF-8.
    let mut value = match serde_yaml::Deserializer::from_slice(raw).next() {
        Some(document) => Yaml::deserialize(document)?,
        None if std::str::from_utf8(raw).is_ok() => return Ok(Mapping::new()),
        None => serde_yaml::from_slice(raw)?,
    };
    value.apply_merge()?;
    match untag(value) {
        Yaml::Mapping(map) => Ok(map),
        Yaml::Null => Ok(Mapping::new()),
        _ => Err(TransformError::InvalidRoot),
    }
}

/// Deep-merges `overlay` into `base`; overlay wins on conflicting scalars.
fn merge_into(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        let incoming = untag(value);
        if let Some(existing) = base.get_mut(&key) {
            match (existing, incoming) {
                (Yaml::Mapping(existing), Yaml::Mapping(incoming)) => merge_into(existing, incoming),
                (slot, incoming) => *slot = incoming,
            }
        } else {
            base.insert(key, incoming);
        }
    }
}

fn build_schema(values: &Mapping, schema_uri: &str, root: &SchemaRoot) -> Result<Json, TransformError> {
    let mut schema = Map::new();
    schema.insert("$schema".into(), json!(schema_uri));
    schema.insert("$id".into(), json!(root.id));
    schema.insert("title".into(), json!(root.title));
    schema.insert("description".into(), json!(root.description));
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Json::Object(properties(values)?));
    schema.insert(
        "additionalProperties".into(),
        json!(root.additional_properties),
    );
    Ok(Json::Object(schema))
}

fn properties(values: &Mapping) -> Result<Map<String, Json>, TransformError> {
    values
        .iter()
        .map(|(key, value)| -> Result<_, TransformError> { Ok((key_name(key)?, infer(value)?)) })
        .collect()
}

fn infer(value: &Yaml) -> Result<Json, TransformError> {
    Ok(match value {
        Yaml::Null => json!({ "type": "null" }),
        Yaml::Bool(_) => json!({ "type": "boolean" }),
        Yaml::Number(n) if n.is_i64() || n.is_u64() => json!({ "type": "integer" }),
        Yaml::Number(_) => json!({ "type": "number" }),
        Yaml::String(_) => json!({ "type": "string" }),
        Yaml::Sequence(items) => match items.first() {
            Some(first) => json!({ "type": "array", "items": infer(first)? }),
            None => json!({ "type": "array" }),
        },
        Yaml::Mapping(map) => json!({ "type": "object", "properties": properties(map)? }),
        Yaml::Tagged(tagged) => infer(&tagged.value)?,
    })
}

fn key_name(key: &Yaml) -> Result<String, TransformError> {
    match key {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_owned()),
        Yaml::Tagged(tagged) => key_name(&tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => Err(TransformError::UnsupportedKey),
    }
}

fn untag(value: Yaml) -> Yaml {
    match value {
        Yaml::Tagged(tagged) => untag(tagged.value),
        other => other,
    }
}

fn render(schema: &Json, indent: usize) -> Result<Vec<u8>, TransformError> {
    let indent = vec![b' '; indent];
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    schema.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root() -> SchemaRoot {
        SchemaRoot {
            id: "https://example.com/schema".into(),
            title: "Helm Values Schema".into(),
            description: "test".into(),
            additional_properties: true,
        }
    }

    fn schema_of(yaml: &str) -> Json {
        let values = parse_values(yaml.as_bytes()).unwrap();
        build_schema(&values, draft_uri(2020).unwrap(), &root()).unwrap()
    }

    #[test]
    fn infers_scalar_types() {
        let schema = schema_of(
            "replicaCount: 1\nratio: 0.5\nname: web\nenabled: true\nextra: null\n",
        );
        let props = &schema["properties"];
        assert_eq!(props["replicaCount"], json!({ "type": "integer" }));
        assert_eq!(props["ratio"], json!({ "type": "number" }));
        assert_eq!(props["name"], json!({ "type": "string" }));
        assert_eq!(props["enabled"], json!({ "type": "boolean" }));
        assert_eq!(props["extra"], json!({ "type": "null" }));
    }

    #[test]
    fn infers_nested_objects_and_arrays() {
        let schema = schema_of(
            "image:\n  repository: nginx\n  tag: \"1.25\"\nports:\n  - 80\n  - 443\ntolerations: []\n",
        );
        let props = &schema["properties"];
        assert_eq!(
            props["image"],
            json!({
                "type": "object",
                "properties": {
                    "repository": { "type": "string" },
                    "tag": { "type": "string" }
                }
            })
        );
        assert_eq!(
            props["ports"],
            json!({ "type": "array", "items": { "type": "integer" } })
        );
        assert_eq!(props["tolerations"], json!({ "type": "array" }));
    }

    #[test]
    fn root_carries_metadata() {
        let schema = schema_of("a: 1\n");
        assert_eq!(
            schema["$schema"],
            json!("https://json-schema.org/draft/2020-12/schema")
        );
        assert_eq!(schema["$id"], json!("https://example.com/schema"));
        assert_eq!(schema["title"], json!("Helm Values Schema"));
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["additionalProperties"], json!(true));
    }

    #[test]
    fn properties_keep_document_order() {
        let schema = schema_of("zeta: 1\nalpha: 2\nmid: 3\n");
        let keys: Vec<_> = schema["properties"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let schema = schema_of("80: http\ntrue: yes\n");
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("80"));
        assert!(props.contains_key("true"));
    }

    #[test]
    fn empty_document_is_an_empty_object() {
        let schema = schema_of("");
        assert_eq!(schema["properties"], json!({}));
    }

    #[test]
    fn merge_keys_are_expanded() {
        let schema = schema_of(
            "defaults: &defaults\n  x: 1\n  name: web\nother:\n  <<: *defaults\n  y: 2\n  name: api\n",
        );
        let other = schema["properties"]["other"]["properties"].as_object().unwrap();
        assert!(!other.contains_key("<<"));
        assert_eq!(other["x"], json!({ "type": "integer" }));
        assert_eq!(other["y"], json!({ "type": "integer" }));
        assert_eq!(other["name"], json!({ "type": "string" }));
    }

    #[test]
    fn only_the_first_document_is_read() {
        let schema = schema_of("a: 1\n---\nb: 2\n");
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("a"));
        assert!(!props.contains_key("b"));
    }

    #[test]
    fn comment_only_document_is_an_empty_object() {
        let schema = schema_of("# nothing to see\n");
        assert_eq!(schema["properties"], json!({}));
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        assert!(matches!(
            parse_values(b"- a\n- b\n"),
            Err(TransformError::InvalidRoot)
        ));
        assert!(matches!(parse_values(b"42"), Err(TransformError::InvalidRoot)));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        assert!(matches!(
            parse_values(b"key: [unclosed\n"),
            Err(TransformError::Yaml(_))
        ));
    }

    #[test]
    fn unknown_draft_is_rejected() {
        assert!(matches!(
            draft_uri(3),
            Err(TransformError::UnsupportedDraft(3))
        ));
        assert_eq!(draft_uri(7).unwrap(), "http://json-schema.org/draft-07/schema#");
    }

    #[test]
    fn generate_merges_inputs_and_writes_indented_output() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("values.yaml");
        let overlay = dir.path().join("values-prod.yaml");
        let output = dir.path().join("values.schema.json");
        fs::write(&base, "image:\n  tag: latest\nreplicas: 1\n").unwrap();
        fs::write(&overlay, "image:\n  pullPolicy: Always\nreplicas: two\n").unwrap();

        generate(&GeneratorConfig {
            inputs: vec![base, overlay],
            output: output.clone(),
            draft: 2020,
            indent: 4,
            root: root(),
        })
        .unwrap();

        let text = fs::read_to_string(&output).unwrap();
        assert!(text.starts_with("{\n    \"$schema\""));
        assert!(text.ends_with("}\n"));

        let schema: Json = serde_json::from_str(&text).unwrap();
        let image = &schema["properties"]["image"]["properties"];
        assert_eq!(image["tag"], json!({ "type": "string" }));
        assert_eq!(image["pullPolicy"], json!({ "type": "string" }));
        assert_eq!(schema["properties"]["replicas"], json!({ "type": "string" }));
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let err = generate(&GeneratorConfig {
            inputs: vec![dir.path().join("absent.yaml")],
            output: dir.path().join("out.json"),
            draft: 2020,
            indent: 4,
            root: root(),
        })
        .unwrap_err();
        assert!(matches!(err, TransformError::Io { .. }));
    }
}
