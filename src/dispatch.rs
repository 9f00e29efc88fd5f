//! Parsed command arguments → HTTP request → rendered outcome.
//!
//! [`RequestExecutor`] validates the invocation, builds a transport-neutral
//! [`HttpRequest`], sends it through a [`Transport`] and renders the response.
//! Every local failure is reported before anything goes on the wire.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::builder::CommandDescriptor;
use crate::config::CommandConfiguration;
use crate::error::DispatchError;
use crate::output::{render_error, render_success, RenderOptions};
use crate::spec::{OpenApiSpec, SUPPORTED_METHODS};
use crate::transport::{HttpRequest, MultipartPart, RequestBody, Transport};

/// What an error hook learns about the failing invocation.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub command: &'a str,
    pub method: &'a str,
    pub url: &'a str,
}

/// The values one invocation supplied, keyed by spec parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInput {
    pub path: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    /// Raw `--field` arguments
    pub fields: Vec<String>,
    /// Raw `--input` argument
    pub input: Option<String>,
    pub render: RenderOptions,
}

impl RequestInput {
    /// Collect arguments from matches of a command built for `descriptor`.
    pub fn from_matches(descriptor: &CommandDescriptor, matches: &clap::ArgMatches) -> Self {
        let path = descriptor
            .path_options
            .iter()
            .filter_map(|opt| {
                matches
                    .get_one::<String>(&opt.option)
                    .map(|val| (opt.param.clone(), val.clone()))
            })
            .collect();

        let mut query = Vec::new();
        for opt in &descriptor.query_options {
            if opt.flag {
                if matches.get_flag(&opt.option) {
                    query.push((opt.param.clone(), "true".to_string()));
                }
            } else if let Some(val) = matches.get_one::<String>(&opt.option) {
                query.push((opt.param.clone(), val.clone()));
            }
        }

        Self {
            path,
            query,
            fields: matches
                .get_many::<String>("field")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default(),
            input: matches.get_one::<String>("input").cloned(),
            render: RenderOptions {
                json: matches.get_flag("json"),
                yaml: matches.get_flag("yaml"),
                minify: matches.get_flag("minify"),
                headers: matches.get_flag("headers"),
                output_html: matches.get_flag("output-html"),
            },
        }
    }

    fn path_value(&self, param: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(name, val)| name == param && !val.is_empty())
            .map(|(_, val)| val.as_str())
    }
}

/// Terminal state of one invocation that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { output: String },
    /// `output` is `None` when an error hook handled the response.
    HttpFailure { status: u16, output: Option<String> },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Executes generated commands of one registration.
pub struct RequestExecutor<'a> {
    config: &'a CommandConfiguration,
    spec: &'a OpenApiSpec,
    transport: &'a dyn Transport,
    width: Option<usize>,
}

impl<'a> RequestExecutor<'a> {
    pub fn new(
        config: &'a CommandConfiguration,
        spec: &'a OpenApiSpec,
        transport: &'a dyn Transport,
    ) -> Self {
        Self {
            config,
            spec,
            transport,
            width: None,
        }
    }

    /// Terminal width used by the human-readable formatter.
    pub fn with_width(mut self, width: Option<usize>) -> Self {
        self.width = width;
        self
    }

    /// Validate, send and render one invocation.
    pub fn execute(
        &self,
        descriptor: &CommandDescriptor,
        input: &RequestInput,
    ) -> Result<Outcome, DispatchError> {
        let request = self.build_request(descriptor, input)?;
        let response = self.transport.execute(&request).map_err(|e| DispatchError::Network {
            url: request.url.clone(),
            cause: e.to_string(),
        })?;
        debug!(command = %descriptor.name, status = response.status, "request completed");

        let options = input.render.merged(self.config.output());
        if response.is_error() {
            let context = CommandContext {
                command: &descriptor.name,
                method: &descriptor.method,
                url: &request.url,
            };
            let handled = self
                .config
                .on_error()
                .is_some_and(|hook| hook(&response, &context));
            let output = (!handled).then(|| render_error(&response, options, self.width));
            return Ok(Outcome::HttpFailure {
                status: response.status,
                output,
            });
        }

        Ok(Outcome::Success {
            output: render_success(&response, options, self.width)?,
        })
    }

    /// Turn an invocation into a request without sending it.
    pub fn build_request(
        &self,
        descriptor: &CommandDescriptor,
        input: &RequestInput,
    ) -> Result<HttpRequest, DispatchError> {
        let missing: Vec<String> = descriptor
            .path_options
            .iter()
            .filter(|opt| input.path_value(&opt.param).is_none())
            .map(|opt| opt.option.clone())
            .collect();
        if !missing.is_empty() {
            return Err(DispatchError::MissingRequiredOptions { options: missing });
        }

        if !SUPPORTED_METHODS.contains(&descriptor.method.to_ascii_lowercase().as_str()) {
            return Err(DispatchError::UnsupportedMethod {
                method: descriptor.method.clone(),
            });
        }

        let mut path = descriptor.path.clone();
        for opt in &descriptor.path_options {
            if let Some(val) = input.path_value(&opt.param) {
                path = path.replace(&format!("{{{}}}", opt.param), &urlencoding::encode(val));
            }
        }

        let base = self.base_url()?;
        let mut url = format!("{}{}", base.trim_end_matches('/'), path);
        let query = encode_query(&input.query);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        let body = self.build_body(descriptor, input)?;

        let mut headers = Vec::new();
        let accept = self.spec.response_content_types(&descriptor.path, &descriptor.method)?;
        if !accept.is_empty() {
            headers.push(("Accept".to_string(), accept.join(", ")));
        }
        if let Some(auth) = self.config.auth().header() {
            headers.push(auth);
        }

        Ok(HttpRequest {
            method: descriptor.method.clone(),
            url,
            headers,
            body,
            follow_redirects: self.config.follow_redirects(),
        })
    }

    fn base_url(&self) -> Result<String, DispatchError> {
        self.config
            .base_url()
            .map(str::to_string)
            .or_else(|| self.spec.server_url())
            .ok_or(DispatchError::MissingBaseUrl)
    }

    fn build_body(
        &self,
        descriptor: &CommandDescriptor,
        input: &RequestInput,
    ) -> Result<RequestBody, DispatchError> {
        if !input.fields.is_empty() && input.input.is_some() {
            return Err(DispatchError::ConflictingInputModes);
        }

        if let Some(raw) = &input.input {
            let text = match raw.strip_prefix('@') {
                Some(file) => {
                    let bytes = read_file("input", Path::new(file))?;
                    String::from_utf8_lossy(&bytes).into_owned()
                }
                None => raw.clone(),
            };
            let value: Value = serde_json::from_str(&text).map_err(DispatchError::InvalidJsonInput)?;
            return Ok(RequestBody::Json(value));
        }

        if input.fields.is_empty() {
            return Ok(RequestBody::None);
        }

        let fields = input
            .fields
            .iter()
            .map(|f| parse_field(f))
            .collect::<Result<Vec<_>, _>>()?;

        let declared = self
            .spec
            .request_body_content_types(&descriptor.path, &descriptor.method)?;
        let accepts_json = declared.is_empty() || declared.iter().any(|t| t.contains("json"));
        let has_file = fields.iter().any(|f| matches!(f, Field::File { .. }));

        let body = if has_file || (!accepts_json && declared.iter().any(|t| t.starts_with("multipart/"))) {
            RequestBody::Multipart(fields.into_iter().map(Field::into_part).collect())
        } else if !accepts_json {
            RequestBody::Form(
                fields
                    .into_iter()
                    .filter_map(|f| match f {
                        Field::Text { key, raw } => Some((key, raw)),
                        Field::File { .. } => None,
                    })
                    .collect(),
            )
        } else {
            let schema = self
                .spec
                .request_body_schema(&descriptor.path, &descriptor.method)?;
            let mut obj = Map::new();
            for field in fields {
                if let Field::Text { key, raw } = field {
                    let val = if property_type(schema.as_ref(), &key) == Some("string") {
                        Value::String(raw)
                    } else {
                        // Try to parse as JSON value, fall back to string
                        serde_json::from_str(&raw).unwrap_or(Value::String(raw))
                    };
                    obj.insert(key, val);
                }
            }
            RequestBody::Json(Value::Object(obj))
        };
        Ok(body)
    }
}

fn property_type<'s>(schema: Option<&'s Value>, key: &str) -> Option<&'s str> {
    schema?.get("properties")?.get(key)?.get("type")?.as_str()
}

enum Field {
    Text { key: String, raw: String },
    File { key: String, filename: String, content: Vec<u8> },
}

impl Field {
    fn into_part(self) -> MultipartPart {
        match self {
            Self::Text { key, raw } => MultipartPart::Text { name: key, value: raw },
            Self::File { key, filename, content } => MultipartPart::File {
                name: key,
                filename,
                content,
            },
        }
    }
}

/// `key=value`, or `key=@path` for a file upload.
fn parse_field(field: &str) -> Result<Field, DispatchError> {
    let (key, val) = field
        .split_once('=')
        .ok_or_else(|| DispatchError::InvalidFieldFormat {
            field: field.to_string(),
        })?;
    if key.is_empty() {
        return Err(DispatchError::InvalidFieldFormat {
            field: field.to_string(),
        });
    }

    match val.strip_prefix('@') {
        Some(file) => {
            let path = PathBuf::from(file);
            let content = read_file(key, &path)?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| key.to_string());
            Ok(Field::File {
                key: key.to_string(),
                filename,
                content,
            })
        }
        None => Ok(Field::Text {
            key: key.to_string(),
            raw: val.to_string(),
        }),
    }
}

fn read_file(field: &str, path: &Path) -> Result<Vec<u8>, DispatchError> {
    fs::read(path).map_err(|source| {
        warn!(path = %path.display(), "cannot read upload file");
        if source.kind() == ErrorKind::NotFound {
            DispatchError::FileNotFound {
                field: field.to_string(),
                path: path.to_path_buf(),
            }
        } else {
            DispatchError::FileUnreadable {
                field: field.to_string(),
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Percent-encoded query string. Values holding a JSON object or array are
/// flattened into `outer[inner]` keys.
fn encode_query(params: &[(String, String)]) -> String {
    let mut pairs = Vec::new();
    for (name, raw) in params {
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => flatten(name, &value, &mut pairs),
            _ => pairs.push((name.clone(), raw.clone())),
        }
    }
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                flatten(&format!("{prefix}[{key}]"), val, out);
            }
        }
        Value::Array(items) => {
            for (i, val) in items.iter().enumerate() {
                flatten(&format!("{prefix}[{i}]"), val, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Null => out.push((prefix.to_string(), String::new())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_operation_command, CommandSet};
    use crate::config::CommandNaming;
    use crate::spec::SpecSource;
    use crate::transport::{HttpResponse, TransportError};
    use serde_json::json;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingTransport {
        requests: RefCell<Vec<HttpRequest>>,
        response: Option<HttpResponse>,
    }

    impl RecordingTransport {
        fn responding(status: u16, content_type: &str, body: &str) -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                response: Some(HttpResponse {
                    status,
                    headers: vec![("content-type".into(), content_type.into())],
                    body: body.as_bytes().to_vec(),
                }),
            }
        }

        fn unreachable() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                response: None,
            }
        }

        fn last(&self) -> HttpRequest {
            self.requests.borrow().last().cloned().unwrap()
        }

        fn sent(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for RecordingTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.borrow_mut().push(request.clone());
            self.response
                .clone()
                .ok_or_else(|| TransportError::new("connection refused"))
        }
    }

    fn spec() -> OpenApiSpec {
        OpenApiSpec::from_value(json!({
            "openapi": "3.0.0",
            "servers": [{ "url": "https://api.example.com/v1/" }],
            "paths": {
                "/projects/{project_id}/errors/{error_id}": {
                    "get": {
                        "parameters": [
                            { "name": "project_id", "in": "path", "required": true },
                            { "name": "error_id", "in": "path", "required": true },
                            { "name": "filter[status]", "in": "query" },
                            { "name": "verbose", "in": "query", "schema": { "type": "boolean" } }
                        ],
                        "responses": {
                            "200": { "content": { "application/json": {} } },
                            "404": { "content": { "application/problem+json": {}, "application/json": {} } }
                        }
                    }
                },
                "/pets": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": { "code": { "type": "string" } }
                                    }
                                }
                            }
                        },
                        "responses": { "201": { "description": "created" } }
                    }
                },
                "/login": {
                    "post": {
                        "requestBody": { "content": { "application/x-www-form-urlencoded": {} } }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn config() -> CommandConfiguration {
        CommandConfiguration::builder(SpecSource::parse("api.yaml")).build()
    }

    fn run(args: &[&str], config: &CommandConfiguration, transport: &RecordingTransport) -> Result<Outcome, DispatchError> {
        let spec = spec();
        let set = CommandSet::plan(&spec, CommandNaming::Path, false).unwrap();
        let descriptor = set.find(args[0]).unwrap();
        let matches = build_operation_command(descriptor)
            .try_get_matches_from(args)
            .unwrap();
        let input = RequestInput::from_matches(descriptor, &matches);
        RequestExecutor::new(config, &spec, transport).execute(descriptor, &input)
    }

    fn ok_transport() -> RecordingTransport {
        RecordingTransport::responding(200, "application/json", r#"{"id":1}"#)
    }

    #[test]
    fn substitutes_path_and_encodes_query() {
        let transport = ok_transport();
        let outcome = run(
            &[
                "get-projects-errors",
                "--project-id",
                "a b",
                "--error-id",
                "7",
                "--filter-status",
                "open",
                "--verbose",
            ],
            &config(),
            &transport,
        )
        .unwrap();

        assert!(outcome.is_success());
        let req = transport.last();
        assert_eq!(req.method, "GET");
        assert_eq!(
            req.url,
            "https://api.example.com/v1/projects/a%20b/errors/7?filter%5Bstatus%5D=open&verbose=true"
        );
        assert_eq!(req.body, RequestBody::None);
        assert!(!req.follow_redirects);
    }

    #[test]
    fn structured_query_values_are_flattened() {
        let transport = ok_transport();
        run(
            &[
                "get-projects-errors",
                "--project-id",
                "1",
                "--error-id",
                "2",
                "--filter-status",
                r#"{"in":["open","new"]}"#,
            ],
            &config(),
            &transport,
        )
        .unwrap();
        assert!(transport
            .last()
            .url
            .ends_with("?filter%5Bstatus%5D%5Bin%5D%5B0%5D=open&filter%5Bstatus%5D%5Bin%5D%5B1%5D=new"));
    }

    #[test]
    fn no_query_means_no_question_mark() {
        let transport = ok_transport();
        run(&["get-projects-errors", "--project-id", "1", "--error-id", "2"], &config(), &transport).unwrap();
        assert_eq!(transport.last().url, "https://api.example.com/v1/projects/1/errors/2");
    }

    #[test]
    fn accept_header_joins_declared_response_types() {
        let transport = ok_transport();
        run(&["get-projects-errors", "--project-id", "1", "--error-id", "2"], &config(), &transport).unwrap();
        let req = transport.last();
        assert!(req
            .headers
            .contains(&("Accept".to_string(), "application/json, application/problem+json".to_string())));
    }

    #[test]
    fn accept_header_is_omitted_without_response_content() {
        let transport = ok_transport();
        run(&["post-pets"], &config(), &transport).unwrap();
        assert!(transport.last().headers.iter().all(|(k, _)| k != "Accept"));
    }

    #[test]
    fn reports_every_missing_path_option() {
        let spec = spec();
        let set = CommandSet::plan(&spec, CommandNaming::Path, false).unwrap();
        let descriptor = set.find("get-projects-errors").unwrap();
        let config = config();
        let transport = ok_transport();

        let err = RequestExecutor::new(&config, &spec, &transport)
            .execute(descriptor, &RequestInput::default())
            .unwrap_err();
        match err {
            DispatchError::MissingRequiredOptions { options } => {
                assert_eq!(options, ["project-id", "error-id"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.sent(), 0);
    }

    #[test]
    fn field_and_input_together_fail_before_sending() {
        let transport = ok_transport();
        let err = run(&["post-pets", "-f", "name=Rex", "--input", "{}"], &config(), &transport).unwrap_err();
        assert!(matches!(err, DispatchError::ConflictingInputModes));
        assert!(err.to_string().contains("cannot combine"));
        assert_eq!(transport.sent(), 0);
    }

    #[test]
    fn missing_base_url_fails() {
        let spec = OpenApiSpec::from_value(json!({
            "openapi": "3.0.0",
            "servers": [],
            "paths": { "/pets": { "get": {} } }
        }))
        .unwrap();
        let set = CommandSet::plan(&spec, CommandNaming::Path, false).unwrap();
        let config = config();
        let transport = ok_transport();

        let err = RequestExecutor::new(&config, &spec, &transport)
            .build_request(set.find("get-pets").unwrap(), &RequestInput::default())
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingBaseUrl));
    }

    #[test]
    fn base_url_override_wins_over_servers() {
        let transport = ok_transport();
        let config = CommandConfiguration::builder(SpecSource::parse("api.yaml"))
            .base_url("http://localhost:8080/")
            .build();
        run(&["post-pets"], &config, &transport).unwrap();
        assert_eq!(transport.last().url, "http://localhost:8080/pets");
    }

    #[test]
    fn fields_are_json_encoded_with_string_fallback() {
        let transport = ok_transport();
        run(
            &["post-pets", "-f", "name=Rex", "-f", "age=3", "-f", r#"tags=["a"]"#, "-f", "note=hello world"],
            &config(),
            &transport,
        )
        .unwrap();
        assert_eq!(
            transport.last().body,
            RequestBody::Json(json!({"name": "Rex", "age": 3, "tags": ["a"], "note": "hello world"}))
        );
    }

    #[test]
    fn string_typed_body_properties_are_not_parsed_as_json() {
        let transport = ok_transport();
        run(&["post-pets", "-f", "code=42", "-f", "age=3"], &config(), &transport).unwrap();
        assert_eq!(
            transport.last().body,
            RequestBody::Json(json!({"code": "42", "age": 3}))
        );
    }

    #[test]
    fn recursive_schemas_still_build_requests() {
        let spec = OpenApiSpec::from_value(json!({
            "servers": [{ "url": "https://api.example.com" }],
            "paths": {
                "/categories": {
                    "get": {
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": { "schema": { "$ref": "#/components/schemas/Category" } }
                                }
                            }
                        }
                    },
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": { "schema": { "$ref": "#/components/schemas/Category" } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Category": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "children": { "type": "array", "items": { "$ref": "#/components/schemas/Category" } }
                        }
                    }
                }
            }
        }))
        .unwrap();
        let config = config();
        let transport = ok_transport();
        let executor = RequestExecutor::new(&config, &spec, &transport);
        let set = CommandSet::plan(&spec, CommandNaming::Path, false).unwrap();

        let get = set.find("get-categories").unwrap();
        let request = executor.build_request(get, &RequestInput::default()).unwrap();
        assert!(request
            .headers
            .contains(&("Accept".to_string(), "application/json".to_string())));

        let post = set.find("post-categories").unwrap();
        let input = RequestInput {
            fields: vec!["name=7".to_string()],
            ..RequestInput::default()
        };
        let request = executor.build_request(post, &input).unwrap();
        assert_eq!(request.body, RequestBody::Json(json!({ "name": "7" })));
    }

    #[test]
    fn fields_are_form_encoded_for_non_json_bodies() {
        let transport = ok_transport();
        run(&["post-login", "-f", "user=alice", "-f", "remember=true"], &config(), &transport).unwrap();
        assert_eq!(
            transport.last().body,
            RequestBody::Form(vec![
                ("user".into(), "alice".into()),
                ("remember".into(), "true".into()),
            ])
        );
    }

    #[test]
    fn file_fields_force_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("rex.png");
        std::fs::write(&photo, b"png-bytes").unwrap();
        let arg = format!("photo=@{}", photo.display());

        let transport = ok_transport();
        run(&["post-pets", "-f", arg.as_str(), "-f", "name=Rex"], &config(), &transport).unwrap();
        assert_eq!(
            transport.last().body,
            RequestBody::Multipart(vec![
                MultipartPart::File {
                    name: "photo".into(),
                    filename: "rex.png".into(),
                    content: b"png-bytes".to_vec(),
                },
                MultipartPart::Text { name: "name".into(), value: "Rex".into() },
            ])
        );
    }

    #[test]
    fn missing_upload_file_aborts_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let arg = format!("photo=@{}", dir.path().join("absent.png").display());

        let transport = ok_transport();
        let err = run(&["post-pets", "-f", arg.as_str()], &config(), &transport).unwrap_err();
        match err {
            DispatchError::FileNotFound { field, .. } => assert_eq!(field, "photo"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.sent(), 0);
    }

    #[test]
    fn field_without_equals_is_rejected() {
        let transport = ok_transport();
        let err = run(&["post-pets", "-f", "no-equals-sign"], &config(), &transport).unwrap_err();
        assert!(err.to_string().contains("invalid --field format"));
    }

    #[test]
    fn raw_input_is_sent_as_json() {
        let transport = ok_transport();
        run(&["post-pets", "--input", r#"{"name":"pod1","gpu":2}"#], &config(), &transport).unwrap();
        assert_eq!(transport.last().body, RequestBody::Json(json!({"name": "pod1", "gpu": 2})));
    }

    #[test]
    fn raw_input_can_come_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"from":"file"}"#).unwrap();
        let arg = format!("@{}", file.path().display());

        let transport = ok_transport();
        run(&["post-pets", "--input", arg.as_str()], &config(), &transport).unwrap();
        assert_eq!(transport.last().body, RequestBody::Json(json!({"from": "file"})));
    }

    #[test]
    fn invalid_raw_input_is_rejected() {
        let transport = ok_transport();
        let err = run(&["post-pets", "--input", "{invalid json}"], &config(), &transport).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidJsonInput(_)));
        assert_eq!(transport.sent(), 0);
    }

    #[test]
    fn callable_auth_is_invoked_per_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = CommandConfiguration::builder(SpecSource::parse("api.yaml"))
            .auth_with(move || format!("token-{}", counter.fetch_add(1, Ordering::SeqCst) + 1))
            .build();

        let transport = ok_transport();
        run(&["post-pets"], &config, &transport).unwrap();
        run(&["post-pets"], &config, &transport).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let requests = transport.requests.borrow();
        let auth: Vec<&str> = requests
            .iter()
            .filter_map(|r| r.headers.iter().find(|(k, _)| k == "Authorization"))
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(auth, ["Bearer token-1", "Bearer token-2"]);
    }

    #[test]
    fn only_the_highest_priority_auth_is_sent() {
        let config = CommandConfiguration::builder(SpecSource::parse("api.yaml"))
            .api_key("X-Api-Key", "k")
            .bearer("t")
            .build();
        let transport = ok_transport();
        run(&["post-pets"], &config, &transport).unwrap();
        let headers = transport.last().headers;
        assert!(headers.contains(&("Authorization".to_string(), "Bearer t".to_string())));
        assert!(headers.iter().all(|(k, _)| k != "X-Api-Key"));
    }

    #[test]
    fn follow_redirects_comes_from_configuration() {
        let config = CommandConfiguration::builder(SpecSource::parse("api.yaml"))
            .follow_redirects(true)
            .build();
        let transport = ok_transport();
        run(&["post-pets"], &config, &transport).unwrap();
        assert!(transport.last().follow_redirects);
    }

    #[test]
    fn success_is_rendered() {
        let transport = ok_transport();
        let outcome = run(&["post-pets", "--json"], &config(), &transport).unwrap();
        assert_eq!(outcome, Outcome::Success { output: "{\n  \"id\": 1\n}".into() });
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn http_error_renders_status_and_body() {
        let transport = RecordingTransport::responding(404, "application/json", r#"{"message":"Not here"}"#);
        let outcome = run(&["post-pets"], &config(), &transport).unwrap();
        assert_eq!(
            outcome,
            Outcome::HttpFailure {
                status: 404,
                output: Some("HTTP 404 Not Found\n\n| Message | Not here |".into()),
            }
        );
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn handled_http_error_suppresses_rendering_but_still_fails() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let config = CommandConfiguration::builder(SpecSource::parse("api.yaml"))
            .on_error(move |resp, ctx| {
                log.lock().unwrap().push(format!("{} {} {}", resp.status, ctx.method, ctx.command));
                true
            })
            .build();

        let transport = RecordingTransport::responding(500, "text/plain", "boom");
        let outcome = run(&["post-pets"], &config, &transport).unwrap();
        assert_eq!(outcome, Outcome::HttpFailure { status: 500, output: None });
        assert!(!outcome.is_success());
        assert_eq!(*seen.lock().unwrap(), ["500 POST post-pets"]);
    }

    #[test]
    fn unhandled_http_error_falls_through_to_default_rendering() {
        let config = CommandConfiguration::builder(SpecSource::parse("api.yaml"))
            .on_error(|_, _| false)
            .build();
        let transport = RecordingTransport::responding(500, "text/plain", "boom");
        match run(&["post-pets"], &config, &transport).unwrap() {
            Outcome::HttpFailure { output: Some(out), .. } => assert!(out.starts_with("HTTP 500 Internal Server Error")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn network_failure_names_the_url() {
        let transport = RecordingTransport::unreachable();
        let err = run(&["post-pets"], &config(), &transport).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Network error: could not connect to https://api.example.com/v1/pets"));
        assert!(msg.contains("connection refused"));
        assert_eq!(transport.sent(), 1);
    }

    #[test]
    fn encode_query_handles_scalars_and_nesting() {
        let params = vec![
            ("q".to_string(), "a&b".to_string()),
            ("page".to_string(), json!({"size": 10, "cursor": null}).to_string()),
        ];
        assert_eq!(encode_query(&params), "q=a%26b&page%5Bsize%5D=10&page%5Bcursor%5D=");
    }
}
