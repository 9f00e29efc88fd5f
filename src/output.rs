//! Response rendering.
//!
//! Chooses between JSON, YAML and human-readable output, and degrades to raw
//! text for bodies that are not JSON.

use reqwest::StatusCode;
use serde_json::Value;

use crate::config::OutputPreferences;
use crate::error::DispatchError;
use crate::format::HumanReadableFormatter;
use crate::transport::HttpResponse;

/// Output flags of one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub json: bool,
    pub yaml: bool,
    pub minify: bool,
    pub headers: bool,
    pub output_html: bool,
}

impl RenderOptions {
    /// Combine invocation flags with the registration's defaults.
    pub fn merged(self, prefs: OutputPreferences) -> Self {
        Self {
            json: self.json || prefs.json || self.minify || prefs.minify,
            yaml: self.yaml || prefs.yaml,
            minify: self.minify || prefs.minify,
            headers: self.headers,
            output_html: self.output_html || prefs.show_html_body,
        }
    }
}

/// `HTTP 404 Not Found`.
pub fn status_line(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason());
    match reason {
        Some(reason) => format!("HTTP {status} {reason}"),
        None => format!("HTTP {status}"),
    }
}

fn headers_block(response: &HttpResponse) -> String {
    let mut out = status_line(response.status);
    for (name, value) in &response.headers {
        out.push('\n');
        out.push_str(&format!("{name}: {value}"));
    }
    out
}

/// Render a successful (< 400) response.
pub fn render_success(
    response: &HttpResponse,
    options: RenderOptions,
    width: Option<usize>,
) -> Result<String, DispatchError> {
    let body = render_body(response, options, width)?;
    if options.headers {
        Ok(format!("{}\n\n{}", headers_block(response), body))
    } else {
        Ok(body)
    }
}

/// Default rendering of an HTTP error: status line, then the best-effort body.
pub fn render_error(
    response: &HttpResponse,
    options: RenderOptions,
    width: Option<usize>,
) -> String {
    let head = if options.headers {
        headers_block(response)
    } else {
        status_line(response.status)
    };
    let body = render_body(response, RenderOptions { json: false, yaml: false, minify: false, ..options }, width)
        .unwrap_or_else(|_| response.text().into_owned());
    format!("{head}\n\n{body}")
}

fn render_body(
    response: &HttpResponse,
    options: RenderOptions,
    width: Option<usize>,
) -> Result<String, DispatchError> {
    let text = response.text();
    if text.trim().is_empty() {
        return Ok("(empty response)".to_string());
    }

    let content_type = response.content_type().unwrap_or("unknown");
    if content_type.contains("text/html") && !options.output_html {
        return Ok(format!(
            "HTML response ({} bytes) not shown; use --output-html to print it",
            response.body.len()
        ));
    }

    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => {
            return Ok(format!(
                "Response is not JSON (content-type: {content_type}, {} bytes):\n{text}",
                response.body.len()
            ))
        }
    };

    if options.minify {
        Ok(value.to_string())
    } else if options.json {
        serde_json::to_string_pretty(&value).map_err(|e| DispatchError::Render(Box::new(e)))
    } else if options.yaml {
        serde_yaml::to_string(&value)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| DispatchError::Render(Box::new(e)))
    } else {
        Ok(HumanReadableFormatter::new(width).format(&value))
    }
}
