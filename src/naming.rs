//! Command and option name derivation.
//!
//! Pure string transformations from HTTP method + path template, or from an
//! `operationId`, to kebab-case CLI names.

/// `GET /projects/{id}/errors` → `get-projects-errors`.
///
/// Every `{...}` placeholder is dropped. The root path yields just the method.
pub fn from_path(method: &str, path: &str) -> String {
    let method = method.to_ascii_lowercase();
    let rest = dashed(&strip_placeholders(path));
    if rest.is_empty() {
        method
    } else {
        format!("{method}-{rest}")
    }
}

/// Like [`from_path`], but a trailing `{param}` segment is kept as its option name.
///
/// `DELETE /teams/{team_id}/users/{user_id}` → `delete-teams-users-user-id`.
pub fn from_path_disambiguated(method: &str, path: &str) -> String {
    let base = from_path(method, path);
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    match last.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(param) if !param.is_empty() => format!("{base}-{}", parameter_to_option_name(param)),
        _ => base,
    }
}

/// `getHTTPErrors` → `get-http-errors`.
pub fn from_operation_id(id: &str) -> String {
    kebab(id)
}

/// `projectId` / `project_id` → `project-id`.
pub fn parameter_to_option_name(name: &str) -> String {
    kebab(name)
}

/// Clean a query parameter name into a CLI-safe option name.
///
/// Bracket notation becomes dash-separated (`filter[status]` → `filter-status`),
/// any other character outside `[A-Za-z0-9_-]` is treated as a separator, and
/// the result is kebab-cased: `filter[p95:>=]` → `filter-p95`.
pub fn query_param_to_option_name(name: &str) -> String {
    let flattened: String = name
        .chars()
        .filter(|c| *c != ']')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    kebab(&flattened)
}

fn strip_placeholders(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Replace path separators with dashes and collapse runs.
fn dashed(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if matches!(c, '/' | '_' | '.') { '-' } else { c })
        .collect();
    collapse_dashes(&replaced)
}

/// camelCase / PascalCase / snake_case → kebab-case, acronym aware.
fn kebab(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for i in 0..chars.len() {
        let c = chars[i];
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                    result.push('-');
                }
            }
            result.extend(c.to_lowercase());
        } else if matches!(c, '_' | '.' | ' ') {
            result.push('-');
        } else {
            result.push(c);
        }
    }
    collapse_dashes(&result)
}

fn collapse_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- from_path --

    #[test]
    fn from_path_drops_placeholders() {
        assert_eq!(from_path("GET", "/projects/{project_id}/errors"), "get-projects-errors");
    }

    #[test]
    fn from_path_replaces_separators() {
        assert_eq!(from_path("post", "/v1/user_groups/export.csv"), "post-v1-user-groups-export-csv");
    }

    #[test]
    fn from_path_collapses_slashes_left_by_placeholders() {
        assert_eq!(from_path("PATCH", "/{org}/{repo}/issues/"), "patch-issues");
    }

    #[test]
    fn from_path_root_is_method_only() {
        assert_eq!(from_path("GET", "/"), "get");
    }

    // -- from_path_disambiguated --

    #[test]
    fn disambiguated_keeps_trailing_parameter() {
        assert_eq!(
            from_path_disambiguated("DELETE", "/teams/{team_id}/users/{user_id}"),
            "delete-teams-users-user-id"
        );
    }

    #[test]
    fn disambiguated_without_trailing_parameter_matches_from_path() {
        assert_eq!(
            from_path_disambiguated("GET", "/teams/{team_id}/users"),
            from_path("GET", "/teams/{team_id}/users")
        );
    }

    #[test]
    fn disambiguated_splits_collision() {
        let a = from_path("GET", "/projects/{id}");
        let b = from_path("GET", "/projects");
        assert_eq!(a, b);
        assert_ne!(
            from_path_disambiguated("GET", "/projects/{id}"),
            from_path_disambiguated("GET", "/projects")
        );
    }

    // -- from_operation_id --

    #[test]
    fn from_operation_id_pascal_case() {
        assert_eq!(from_operation_id("CreatePod"), "create-pod");
    }

    #[test]
    fn from_operation_id_camel_case() {
        assert_eq!(from_operation_id("getPods"), "get-pods");
    }

    #[test]
    fn from_operation_id_consecutive_uppercase() {
        assert_eq!(from_operation_id("getHTTPErrors"), "get-http-errors");
    }

    #[test]
    fn from_operation_id_acronym_at_start_and_end() {
        assert_eq!(from_operation_id("HTMLParser"), "html-parser");
        assert_eq!(from_operation_id("getAPI"), "get-api");
    }

    #[test]
    fn from_operation_id_snake_case() {
        assert_eq!(from_operation_id("list_team_members"), "list-team-members");
    }

    #[test]
    fn from_operation_id_empty() {
        assert_eq!(from_operation_id(""), "");
    }

    // -- option names --

    #[test]
    fn parameter_to_option_name_converts_case() {
        assert_eq!(parameter_to_option_name("projectId"), "project-id");
        assert_eq!(parameter_to_option_name("project_id"), "project-id");
        assert_eq!(parameter_to_option_name("id"), "id");
    }

    #[test]
    fn query_param_flattens_bracket_notation() {
        assert_eq!(
            query_param_to_option_name("filter[exception_message]"),
            "filter-exception-message"
        );
        assert_eq!(query_param_to_option_name("page[size]"), "page-size");
        assert_eq!(query_param_to_option_name("filter[a][b]"), "filter-a-b");
    }

    #[test]
    fn query_param_strips_operator_characters() {
        assert_eq!(query_param_to_option_name("filter[p95:>=]"), "filter-p95");
        assert_eq!(query_param_to_option_name("ids[]"), "ids");
    }

    #[test]
    fn query_param_plain_names_use_parameter_rules() {
        assert_eq!(query_param_to_option_name("perPage"), "per-page");
    }
}
