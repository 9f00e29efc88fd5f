//! OpenAPI document loading and read-only queries.
//!
//! [`OpenApiSpec`] owns the raw document tree. References are resolved on
//! demand for the pieces a query returns, so a recursive schema that is never
//! read cannot break registration.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::cache::CachePolicy;
use crate::error::{ReferenceError, SpecError};
use crate::resolve::{follow, resolve};

/// HTTP verbs that become commands, in their canonical listing order.
pub const SUPPORTED_METHODS: [&str; 5] = ["get", "post", "put", "patch", "delete"];

/// Where an OpenAPI document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    File(PathBuf),
    Url(String),
}

impl SpecSource {
    /// Interpret `s` as an http(s) URL or else a local path.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s.to_string())
        } else {
            Self::File(PathBuf::from(s))
        }
    }
}

impl fmt::Display for SpecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    fn from_name(name: &str) -> Option<Self> {
        let name = name.split(['?', '#']).next().unwrap_or(name);
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Yaml
        }
    }
}

/// A single API parameter.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Param {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub schema: Value,
}

impl Param {
    /// `schema.type`, defaulting to `"string"`; the first entry when it is a list.
    pub fn type_name(&self) -> String {
        match self.schema.get("type") {
            Some(Value::String(t)) => t.clone(),
            Some(Value::Array(types)) => types
                .first()
                .and_then(Value::as_str)
                .unwrap_or("string")
                .to_string(),
            _ => "string".to_string(),
        }
    }
}

/// A parsed API operation ready for command planning.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiOperation {
    /// operationId from the spec, when present
    pub operation_id: Option<String>,
    /// Uppercase HTTP method
    pub method: String,
    /// URL path template (e.g. "/pods/{podId}")
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Path parameters, ordered by position in the template
    pub path_params: Vec<Param>,
    /// Query parameters in declaration order
    pub query_params: Vec<Param>,
}

/// A loaded OpenAPI document.
#[derive(Debug, Clone)]
pub struct OpenApiSpec {
    document: Value,
}

impl OpenApiSpec {
    /// Load a spec from a file or URL.
    pub fn load(source: &SpecSource, cache: Option<&CachePolicy>) -> Result<Self, SpecError> {
        match source {
            SpecSource::File(path) => Self::from_file(path),
            SpecSource::Url(url) => {
                let content = fetch_remote(url, cache)?;
                let format = SpecFormat::from_name(url).unwrap_or_else(|| SpecFormat::sniff(&content));
                Self::parse(&content, format, url)
            }
        }
    }

    /// Load a spec from a local `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: &Path) -> Result<Self, SpecError> {
        let source_name = path.display().to_string();
        let format = SpecFormat::from_name(&source_name)
            .ok_or_else(|| SpecError::UnsupportedFormat { source_name: source_name.clone() })?;
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                SpecError::NotFound { path: path.to_path_buf() }
            } else {
                SpecError::Unreadable { path: path.to_path_buf(), source }
            }
        })?;
        info!(path = %source_name, "loaded spec file");
        Self::parse(&content, format, &source_name)
    }

    /// Parse JSON document text.
    pub fn from_json_str(content: &str) -> Result<Self, SpecError> {
        Self::parse(content, SpecFormat::Json, "<json>")
    }

    /// Parse YAML document text.
    pub fn from_yaml_str(content: &str) -> Result<Self, SpecError> {
        Self::parse(content, SpecFormat::Yaml, "<yaml>")
    }

    /// Wrap an already-decoded document. The root must be a mapping.
    pub fn from_value(document: Value) -> Result<Self, SpecError> {
        Self::checked(document, "<value>")
    }

    fn parse(content: &str, format: SpecFormat, source_name: &str) -> Result<Self, SpecError> {
        let document = match format {
            SpecFormat::Json => serde_json::from_str(content).map_err(|e| SpecError::Parse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?,
            SpecFormat::Yaml => serde_yaml::from_str::<serde_yaml::Value>(content)
                .map(yaml_to_json)
                .map_err(|e| SpecError::Parse {
                    source_name: source_name.to_string(),
                    message: e.to_string(),
                })?,
        };
        Self::checked(document, source_name)
    }

    fn checked(document: Value, source_name: &str) -> Result<Self, SpecError> {
        if !document.is_object() {
            return Err(SpecError::NotAMapping { source_name: source_name.to_string() });
        }
        Ok(Self { document })
    }

    /// The raw, unresolved document tree.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Path templates mapped to their operations, restricted to supported verbs.
    pub fn paths(&self) -> Map<String, Value> {
        let mut out = Map::new();
        let Some(paths) = self.document.get("paths").and_then(Value::as_object) else {
            return out;
        };
        for (path, item) in paths {
            let Some(item) = item.as_object() else { continue };
            let verbs: Map<String, Value> = item
                .iter()
                .filter(|(verb, _)| SUPPORTED_METHODS.contains(&verb.as_str()))
                .map(|(verb, op)| (verb.clone(), op.clone()))
                .collect();
            out.insert(path.clone(), Value::Object(verbs));
        }
        out
    }

    /// First entry of `servers`, with server variables replaced by their defaults.
    pub fn server_url(&self) -> Option<String> {
        let server = self.document.get("servers")?.as_array()?.first()?;
        let mut url = server.get("url")?.as_str()?.to_string();
        if let Some(vars) = server.get("variables").and_then(Value::as_object) {
            for (name, var) in vars {
                if let Some(default) = var.get("default").and_then(Value::as_str) {
                    url = url.replace(&format!("{{{name}}}"), default);
                }
            }
        }
        if url.is_empty() {
            return None;
        }
        Some(url)
    }

    fn operation(&self, path: &str, method: &str) -> Option<&Value> {
        self.document
            .get("paths")?
            .get(path)?
            .get(method.to_ascii_lowercase())
    }

    pub fn operation_summary(&self, path: &str, method: &str) -> Option<String> {
        self.operation_text(path, method, "summary")
    }

    pub fn operation_description(&self, path: &str, method: &str) -> Option<String> {
        self.operation_text(path, method, "description")
    }

    fn operation_text(&self, path: &str, method: &str, key: &str) -> Option<String> {
        self.operation(path, method)?
            .get(key)?
            .as_str()
            .map(str::to_string)
    }

    /// Path parameters, ordered by their position in the template.
    pub fn path_parameters(&self, path: &str, method: &str) -> Result<Vec<Param>, ReferenceError> {
        let mut params = self.parameters_in(path, method, "path")?;
        params.sort_by_cached_key(|p| path.find(&format!("{{{}}}", p.name)).unwrap_or(usize::MAX));
        Ok(params)
    }

    /// Query parameters in declaration order.
    pub fn query_parameters(&self, path: &str, method: &str) -> Result<Vec<Param>, ReferenceError> {
        self.parameters_in(path, method, "query")
    }

    /// The `application/json` request body schema, if declared.
    ///
    /// Only the schema itself and each entry of its `properties` are
    /// dereferenced; deeper nodes keep their `$ref` markers so recursive
    /// component schemas stay usable.
    pub fn request_body_schema(&self, path: &str, method: &str) -> Result<Option<Value>, ReferenceError> {
        let Some(body) = self.request_body(path, method)? else {
            return Ok(None);
        };
        let Some(schema) = body
            .get("content")
            .and_then(|c| c.get("application/json"))
            .and_then(|media| media.get("schema"))
        else {
            return Ok(None);
        };
        let mut schema = follow(schema, &self.document)?.clone();
        if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
            for property in properties.values_mut() {
                *property = follow(property, &self.document)?.clone();
            }
        }
        Ok(Some(schema))
    }

    /// Media types declared for the request body, in declaration order.
    pub fn request_body_content_types(&self, path: &str, method: &str) -> Result<Vec<String>, ReferenceError> {
        Ok(self.request_body(path, method)?.map(content_keys).unwrap_or_default())
    }

    /// Union of response media types over every documented status, in declaration order.
    pub fn response_content_types(&self, path: &str, method: &str) -> Result<Vec<String>, ReferenceError> {
        let mut types: Vec<String> = Vec::new();
        let Some(responses) = self
            .operation(path, method)
            .and_then(|op| op.get("responses"))
            .and_then(Value::as_object)
        else {
            return Ok(types);
        };
        for response in responses.values() {
            for media in content_keys(follow(response, &self.document)?) {
                if !types.contains(&media) {
                    types.push(media);
                }
            }
        }
        Ok(types)
    }

    fn request_body(&self, path: &str, method: &str) -> Result<Option<&Value>, ReferenceError> {
        self.operation(path, method)
            .and_then(|op| op.get("requestBody"))
            .map(|body| follow(body, &self.document))
            .transpose()
    }

    /// Merge path-level and operation-level parameters for one location.
    /// Operation-level entries override path-level ones with the same name.
    fn parameters_in(&self, path: &str, method: &str, location: &str) -> Result<Vec<Param>, ReferenceError> {
        let Some(item) = self.document.get("paths").and_then(|p| p.get(path)) else {
            return Ok(Vec::new());
        };
        let operation = item.get(method.to_ascii_lowercase());

        let mut merged: Vec<Param> = Vec::new();
        for source in [item.get("parameters"), operation.and_then(|op| op.get("parameters"))]
            .into_iter()
            .flatten()
        {
            let Some(list) = source.as_array() else { continue };
            for raw in list {
                let param = resolve(raw, &self.document)?;
                if param.get("in").and_then(Value::as_str) != Some(location) {
                    continue;
                }
                let Some(parsed) = parse_param(&param) else { continue };
                match merged.iter_mut().find(|p| p.name == parsed.name) {
                    Some(existing) => *existing = parsed,
                    None => merged.push(parsed),
                }
            }
        }
        Ok(merged)
    }

    /// Extract every supported operation in declaration order.
    pub fn operations(&self) -> Result<Vec<ApiOperation>, ReferenceError> {
        let mut ops = Vec::new();
        for (path, verbs) in self.paths() {
            let Some(verbs) = verbs.as_object() else { continue };
            for (verb, operation) in verbs {
                ops.push(ApiOperation {
                    operation_id: operation
                        .get("operationId")
                        .and_then(Value::as_str)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string),
                    method: verb.to_uppercase(),
                    path: path.clone(),
                    summary: self.operation_summary(&path, verb),
                    description: self.operation_description(&path, verb),
                    path_params: self.path_parameters(&path, verb)?,
                    query_params: self.query_parameters(&path, verb)?,
                });
            }
        }
        debug!(count = ops.len(), "extracted operations");
        Ok(ops)
    }
}

fn content_keys(node: &Value) -> Vec<String> {
    node.get("content")
        .and_then(Value::as_object)
        .map(|content| content.keys().cloned().collect())
        .unwrap_or_default()
}

/// Parse a single resolved parameter object.
fn parse_param(param: &Value) -> Option<Param> {
    let name = param.get("name")?.as_str()?.to_string();
    let description = param
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let required = param
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let schema = param
        .get("schema")
        .cloned()
        .unwrap_or(serde_json::json!({"type": "string"}));

    Some(Param {
        name,
        description,
        required,
        schema,
    })
}

fn fetch_remote(url: &str, cache: Option<&CachePolicy>) -> Result<String, SpecError> {
    if let Some(policy) = cache {
        if let Some(hit) = policy.get(url) {
            debug!(%url, "spec served from cache");
            return Ok(hit);
        }
    }

    info!(%url, "fetching remote spec");
    let content = reqwest::blocking::get(url)
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.text())
        .map_err(|source| SpecError::Fetch { url: url.to_string(), source })?;

    if let Some(policy) = cache {
        policy.put(url, &content);
    }
    Ok(content)
}

/// Convert a YAML tree into the JSON tree every other module works with.
/// Non-string mapping keys (e.g. bare `200:` status codes) become strings.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;

    match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Y;

    match key {
        Y::String(s) => s,
        Y::Number(n) => n.to_string(),
        Y::Bool(b) => b.to_string(),
        Y::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
