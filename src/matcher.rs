//! Path template matching.
//!
//! Converts `/projects/{id}` style templates into anchored regexes and routes
//! concrete request paths back to the templates that accept them.

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
    params: Vec<String>,
}

impl PathPattern {
    /// Parameter names in template order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Extract `(name, value)` pairs if `path` matches the whole template.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.params
                .iter()
                .enumerate()
                .filter_map(|(i, name)| caps.get(i + 1).map(|m| (name.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}

/// One spec path that accepts a concrete request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub path: String,
    pub parameters: Vec<(String, String)>,
    /// Uppercase verbs declared for the path, in declaration order
    pub methods: Vec<String>,
    /// The template has no parameters
    pub is_exact: bool,
}

/// Compile a path template. Static text is escaped; each `{name}` matches one
/// or more non-slash characters. A trailing slash is optional.
pub fn convert_to_regex(template: &str) -> Result<PathPattern, regex::Error> {
    let trimmed = template.trim_end_matches('/');
    let mut pattern = String::from("^");
    let mut params = Vec::new();
    let mut rest = trimmed;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        pattern.push_str(&regex::escape(&rest[..open]));
        pattern.push_str("([^/]+)");
        params.push(rest[open + 1..close].to_string());
        rest = &rest[close + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push_str("/?$");

    Ok(PathPattern {
        regex: Regex::new(&pattern)?,
        params,
    })
}

/// `projects/active/` → `/projects/active`.
pub fn normalize_path(input: &str) -> String {
    format!("/{}", input.trim_matches('/'))
}

/// Every spec path accepting `input`, exact (parameter-free) templates first.
///
/// `spec_paths` maps templates to their operations by verb, as returned by
/// [`OpenApiSpec::paths`](crate::spec::OpenApiSpec::paths).
pub fn match_path(input: &str, spec_paths: &Map<String, Value>) -> Vec<RouteMatch> {
    let input = normalize_path(input);
    let mut matches = Vec::new();

    for (template, verbs) in spec_paths {
        let pattern = match convert_to_regex(template) {
            Ok(p) => p,
            Err(err) => {
                warn!(%template, error = %err, "skipping unmatchable path template");
                continue;
            }
        };
        let Some(parameters) = pattern.captures(&input) else { continue };
        let methods = verbs
            .as_object()
            .map(|v| v.keys().map(|m| m.to_uppercase()).collect::<Vec<_>>())
            .unwrap_or_default();
        matches.push(RouteMatch {
            path: template.clone(),
            is_exact: pattern.params().is_empty(),
            parameters,
            methods,
        });
    }

    matches.sort_by_key(|m| !m.is_exact);
    matches
}
