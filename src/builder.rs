//! Spec operations → command descriptors → clap `Command`s.
//!
//! Planning derives one [`CommandDescriptor`] per operation, resolves name
//! collisions, and fails fast when names still clash.

use std::collections::HashMap;

use clap::{Arg, ArgAction, Command};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::CommandNaming;
use crate::error::{PlanError, SpecError};
use crate::matcher::{match_path, RouteMatch};
use crate::naming::{
    from_operation_id, from_path, from_path_disambiguated, parameter_to_option_name,
    query_param_to_option_name,
};
use crate::spec::{ApiOperation, OpenApiSpec, Param};

/// Name of the synthetic listing command added to namespaced registrations.
pub const LIST_COMMAND: &str = "list";

/// Flags every operation command carries.
pub const RESERVED_OPTIONS: [&str; 8] = [
    "field", "input", "json", "yaml", "minify", "headers", "output-html", "help",
];

/// One CLI option backed by a spec parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSpec {
    /// Parameter name as written in the spec (sent on the wire)
    pub param: String,
    /// CLI option name, without leading dashes
    pub option: String,
    pub description: String,
    pub required: bool,
    /// Boolean query parameters become value-less flags
    pub flag: bool,
    /// `schema.type` of the parameter
    pub value_type: String,
}

/// Everything needed to expose and invoke one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDescriptor {
    pub name: String,
    /// Uppercase HTTP method
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub path_options: Vec<OptionSpec>,
    pub query_options: Vec<OptionSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommandDescriptor {
    /// Short help text: summary, else description.
    pub fn about(&self) -> &str {
        self.summary
            .as_deref()
            .or(self.description.as_deref())
            .unwrap_or("")
    }

    fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// The planned command surface of one spec.
#[derive(Debug, Clone)]
pub struct CommandSet {
    descriptors: Vec<CommandDescriptor>,
}

impl CommandSet {
    /// Plan every operation of `spec`. With `with_list`, the name `list` is reserved.
    pub fn plan(spec: &OpenApiSpec, naming: CommandNaming, with_list: bool) -> Result<Self, PlanError> {
        let ops = spec.operations().map_err(SpecError::from)?;
        let descriptors = plan_operations(&ops, naming)?;

        if with_list {
            if let Some(clash) = descriptors.iter().find(|d| d.name == LIST_COMMAND) {
                return Err(PlanError::DuplicateCommand {
                    name: LIST_COMMAND.to_string(),
                    first: "the built-in list command".to_string(),
                    second: clash.endpoint(),
                });
            }
        }
        Ok(Self { descriptors })
    }

    pub fn descriptors(&self) -> &[CommandDescriptor] {
        &self.descriptors
    }

    pub fn find(&self, name: &str) -> Option<&CommandDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Descriptors sorted by path, then GET, POST, PUT, PATCH, DELETE, then others.
    pub fn listing(&self) -> Vec<&CommandDescriptor> {
        let mut sorted: Vec<&CommandDescriptor> = self.descriptors.iter().collect();
        sorted.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| method_rank(&a.method).cmp(&method_rank(&b.method)))
        });
        sorted
    }

    /// Templates accepting the concrete `path`, exact routes first.
    pub fn matching_routes(&self, path: &str) -> Vec<RouteMatch> {
        let mut paths: Map<String, Value> = Map::new();
        for d in &self.descriptors {
            let entry = paths
                .entry(d.path.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(verbs) = entry {
                verbs.insert(d.method.to_lowercase(), Value::Null);
            }
        }
        match_path(path, &paths)
    }

    /// Resolve a method and concrete path to a command plus extracted path parameters.
    pub fn route(&self, method: &str, path: &str) -> Option<(&CommandDescriptor, Vec<(String, String)>)> {
        let method = method.to_uppercase();
        self.matching_routes(path).into_iter().find_map(|m| {
            self.descriptors
                .iter()
                .find(|d| d.path == m.path && d.method == method)
                .map(|d| (d, m.parameters))
        })
    }
}

fn method_rank(method: &str) -> usize {
    match method {
        "GET" => 0,
        "POST" => 1,
        "PUT" => 2,
        "PATCH" => 3,
        "DELETE" => 4,
        _ => 5,
    }
}

fn base_name(op: &ApiOperation, naming: CommandNaming) -> String {
    match (naming, &op.operation_id) {
        (CommandNaming::OperationId, Some(id)) => from_operation_id(id),
        _ => from_path(&op.method, &op.path),
    }
}

/// Name every operation, disambiguating collision groups by their trailing parameter.
pub fn plan_operations(ops: &[ApiOperation], naming: CommandNaming) -> Result<Vec<CommandDescriptor>, PlanError> {
    let base: Vec<String> = ops.iter().map(|op| base_name(op, naming)).collect();

    // Detect duplicate names before choosing final ones
    let mut name_count: HashMap<&str, usize> = HashMap::new();
    for name in &base {
        *name_count.entry(name.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<String, String> = HashMap::new();
    let mut descriptors = Vec::with_capacity(ops.len());
    for (op, base) in ops.iter().zip(&base) {
        let name = if name_count.get(base.as_str()).copied().unwrap_or(0) > 1 {
            let name = from_path_disambiguated(&op.method, &op.path);
            debug!(%base, %name, "disambiguated colliding command");
            name
        } else {
            base.clone()
        };

        let endpoint = format!("{} {}", op.method, op.path);
        if let Some(first) = seen.get(&name) {
            return Err(PlanError::DuplicateCommand {
                name,
                first: first.clone(),
                second: endpoint,
            });
        }
        seen.insert(name.clone(), endpoint);
        descriptors.push(describe(op, name));
    }
    Ok(descriptors)
}

fn describe(op: &ApiOperation, name: String) -> CommandDescriptor {
    let mut path_params = op.path_params.clone();
    for placeholder in template_params(&op.path) {
        if !path_params.iter().any(|p| p.name == placeholder) {
            path_params.push(Param {
                name: placeholder,
                description: String::new(),
                required: true,
                schema: serde_json::json!({"type": "string"}),
            });
        }
    }
    path_params.sort_by_cached_key(|p| op.path.find(&format!("{{{}}}", p.name)).unwrap_or(usize::MAX));

    let mut taken: Vec<String> = Vec::new();
    let path_options: Vec<OptionSpec> = path_params
        .iter()
        .map(|p| {
            let option = unique_option(parameter_to_option_name(&p.name), "path", &taken);
            taken.push(option.clone());
            OptionSpec {
                param: p.name.clone(),
                option,
                description: p.description.clone(),
                required: true,
                flag: false,
                value_type: p.type_name(),
            }
        })
        .collect();

    let query_options = op
        .query_params
        .iter()
        .map(|p| {
            let option = unique_option(query_param_to_option_name(&p.name), "query", &taken);
            taken.push(option.clone());
            OptionSpec {
                param: p.name.clone(),
                option,
                description: p.description.clone(),
                required: false,
                flag: is_bool_schema(&p.schema),
                value_type: p.type_name(),
            }
        })
        .collect();

    CommandDescriptor {
        name,
        method: op.method.clone(),
        path: op.path.clone(),
        operation_id: op.operation_id.clone(),
        path_options,
        query_options,
        summary: op.summary.clone(),
        description: op.description.clone(),
    }
}

/// Prefix an option name that would shadow a built-in flag or an earlier option.
fn unique_option(option: String, prefix: &str, taken: &[String]) -> String {
    let clashes = |o: &str| o.is_empty() || RESERVED_OPTIONS.contains(&o) || taken.iter().any(|t| t == o);
    if !clashes(&option) {
        return option;
    }
    let mut candidate = if option.is_empty() { prefix.to_string() } else { format!("{prefix}-{option}") };
    let mut n = 2;
    while clashes(&candidate) {
        candidate = format!("{prefix}-{option}-{n}");
        n += 1;
    }
    candidate
}

fn template_params(path: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else { break };
        params.push(rest[open + 1..open + len].to_string());
        rest = &rest[open + len + 1..];
    }
    params
}

/// Check if a JSON schema describes a boolean type.
pub fn is_bool_schema(schema: &Value) -> bool {
    schema.get("type").and_then(|v| v.as_str()) == Some("boolean")
}

/// Three padded columns: method, command, summary.
pub fn render_listing(descriptors: &[&CommandDescriptor]) -> String {
    let method_width = descriptors.iter().map(|d| d.method.len()).max().unwrap_or(0);
    let name_width = descriptors.iter().map(|d| d.name.chars().count()).max().unwrap_or(0);
    descriptors
        .iter()
        .map(|d| {
            format!("{:<method_width$}  {:<name_width$}  {}", d.method, d.name, d.about())
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the clap `Command` for one operation.
pub fn build_operation_command(descriptor: &CommandDescriptor) -> Command {
    let mut cmd = Command::new(descriptor.name.clone()).about(descriptor.about().to_string());
    if let Some(description) = &descriptor.description {
        cmd = cmd.long_about(format!("{} {}\n\n{}", descriptor.method, descriptor.path, description));
    }

    // Path parameters → required --options
    for opt in &descriptor.path_options {
        cmd = cmd.arg(
            Arg::new(opt.option.clone())
                .long(opt.option.clone())
                .value_name(opt.param.to_uppercase())
                .help(opt.description.clone())
                .required(true)
                .action(ArgAction::Set),
        );
    }

    // Query parameters → optional --options
    for opt in &descriptor.query_options {
        let arg = Arg::new(opt.option.clone())
            .long(opt.option.clone())
            .help(opt.description.clone());

        let arg = if opt.flag {
            arg.action(ArgAction::SetTrue)
        } else {
            arg.value_name(opt.value_type.to_uppercase()).action(ArgAction::Set)
        };

        cmd = cmd.arg(arg);
    }

    cmd.arg(
        Arg::new("field")
            .long("field")
            .short('f')
            .value_name("KEY=VALUE")
            .help("Set body field: key=value, or key=@path to upload a file (repeatable)")
            .action(ArgAction::Append),
    )
    .arg(
        Arg::new("input")
            .long("input")
            .value_name("JSON")
            .help("Request body as raw JSON (or @file.json)")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("json")
            .long("json")
            .help("Print the response as JSON")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("yaml")
            .long("yaml")
            .help("Print the response as YAML")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("minify")
            .long("minify")
            .help("Print minified JSON (implies --json)")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("headers")
            .long("headers")
            .help("Include the status line and response headers")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("output-html")
            .long("output-html")
            .help("Print HTML response bodies instead of a summary")
            .action(ArgAction::SetTrue),
    )
}

/// Build the `list` command of a namespace.
pub fn build_list_command() -> Command {
    Command::new(LIST_COMMAND)
        .about("List every available command")
        .arg(
            Arg::new("path")
                .long("path")
                .value_name("PATH")
                .help("Only show commands routable for a concrete request path"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit machine-readable JSON")
                .action(ArgAction::SetTrue),
        )
}
