//! HTTP transport boundary.
//!
//! The executor builds a transport-neutral [`HttpRequest`]; a [`Transport`]
//! performs it. [`ReqwestTransport`] is the production implementation.

use std::borrow::Cow;
use std::error::Error as StdError;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    None,
    Json(Value),
    Form(Vec<(String, String)>),
    Multipart(Vec<MultipartPart>),
}

/// One multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    Text { name: String, value: String },
    File { name: String, filename: String, content: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase; repeated headers appear once per value.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// The request never produced a response.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { message }
    }
}

/// Performs one HTTP exchange.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking reqwest transport with redirects off unless a request asks for them.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    redirecting: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let user_agent = concat!("openapi-cmd/", env!("CARGO_PKG_VERSION"));
        Ok(Self {
            client: Client::builder()
                .user_agent(user_agent)
                .redirect(Policy::none())
                .build()?,
            redirecting: Client::builder().user_agent(user_agent).build()?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method: Method = request
            .method
            .parse()
            .map_err(|_| TransportError::new(format!("invalid HTTP method {}", request.method)))?;
        let client = if request.follow_redirects { &self.redirecting } else { &self.client };

        let mut req = client.request(method, &request.url);
        for (name, value) in &request.headers {
            req = req.header(name, value);
        }
        req = match &request.body {
            RequestBody::None => req,
            RequestBody::Json(value) => req.json(value),
            RequestBody::Form(pairs) => req.form(pairs),
            RequestBody::Multipart(parts) => req.multipart(multipart_form(parts)),
        };

        debug!(method = %request.method, url = %request.url, "sending request");
        let resp = req.send()?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = resp.bytes()?.to_vec();
        debug!(status, bytes = body.len(), "received response");

        Ok(HttpResponse { status, headers, body })
    }
}

fn multipart_form(parts: &[MultipartPart]) -> Form {
    parts.iter().fold(Form::new(), |form, part| match part {
        MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
        MultipartPart::File { name, filename, content } => {
            form.part(name.clone(), Part::bytes(content.clone()).file_name(filename.clone()))
        }
    })
}
