//! Error types for the openapi-cmd crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while dereferencing internal `$ref` pointers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ReferenceError {
    #[error("unsupported $ref {pointer}: only same-document references starting with '#/' are supported")]
    UnsupportedReferenceKind { pointer: String },

    #[error("broken $ref {pointer}: segment '{segment}' does not exist")]
    BrokenReference { pointer: String, segment: String },

    #[error("$ref {pointer} exceeds the maximum resolution depth of {depth}")]
    ReferenceCycle { pointer: String, depth: usize },
}

/// Errors raised while loading an OpenAPI document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecError {
    #[error("spec file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read spec file: {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported spec format for {source_name} (expected .json, .yaml or .yml)")]
    UnsupportedFormat { source_name: String },

    #[error("failed to parse spec {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("failed to fetch spec from {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("spec root must be a mapping: {source_name}")]
    NotAMapping { source_name: String },

    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

/// Errors raised while planning the command surface of a spec.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanError {
    #[error("command name '{name}' is generated by both {first} and {second}")]
    DuplicateCommand {
        name: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Errors that can occur while executing a generated command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("{}", missing_list(.options))]
    MissingRequiredOptions { options: Vec<String> },

    #[error("cannot combine --field and --input; use one way to send the request body")]
    ConflictingInputModes,

    #[error("invalid JSON in --input argument")]
    InvalidJsonInput(#[source] serde_json::Error),

    #[error("invalid --field format: {field} (expected key=value)")]
    InvalidFieldFormat { field: String },

    #[error("file not found for field '{field}': {}", .path.display())]
    FileNotFound { field: String, path: PathBuf },

    #[error("failed to read file for field '{field}': {}", .path.display())]
    FileUnreadable {
        field: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no base URL: configure one for this spec or declare a server in the spec's 'servers' list")]
    MissingBaseUrl,

    #[error("Network error: could not connect to {url}\n{cause}")]
    Network { url: String, cause: String },

    #[error("unsupported HTTP method: {method}")]
    UnsupportedMethod { method: String },

    #[error("failed to render response")]
    Render(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

fn missing_list(options: &[String]) -> String {
    options
        .iter()
        .map(|o| format!("missing required option --{o}"))
        .collect::<Vec<_>>()
        .join("\n")
}
