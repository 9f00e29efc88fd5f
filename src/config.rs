//! Per-registration configuration.
//!
//! A [`ConfigBuilder`] accumulates options and is frozen into an immutable
//! [`CommandConfiguration`] that every command of one spec shares.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::cache::{CachePolicy, SpecCache};
use crate::dispatch::CommandContext;
use crate::spec::SpecSource;
use crate::transport::HttpResponse;

/// Strategy for generating CLI command names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandNaming {
    /// Method + path: `GET /pods/{id}/logs` → `get-pods-logs`.
    #[default]
    Path,
    /// Kebab-cased `operationId`, falling back to the path name when absent.
    OperationId,
}

/// Default rendering of successful responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputPreferences {
    pub json: bool,
    pub yaml: bool,
    pub minify: bool,
    pub show_html_body: bool,
    /// Columns available to the human-readable formatter
    pub width: Option<usize>,
}

/// Produces a bearer token; called once per request.
pub type TokenProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// Receives every HTTP error response. Returning `true` suppresses default rendering.
pub type ErrorHook = Arc<dyn Fn(&HttpResponse, &CommandContext<'_>) -> bool + Send + Sync>;

/// Produces text printed once before the command listing.
pub type BannerHook = Arc<dyn Fn() -> String + Send + Sync>;

/// The single authentication scheme applied to requests.
#[derive(Clone, Default)]
pub enum AuthStrategy {
    #[default]
    None,
    Bearer(String),
    ApiKey { header: String, value: String },
    Basic { username: String, password: String },
    Callable(TokenProvider),
}

impl AuthStrategy {
    /// The header to send, invoking a callable strategy afresh.
    pub fn header(&self) -> Option<(String, String)> {
        match self {
            Self::None => None,
            Self::Bearer(token) => Some(("Authorization".into(), format!("Bearer {token}"))),
            Self::ApiKey { header, value } => Some((header.clone(), value.clone())),
            Self::Basic { username, password } => Some((
                "Authorization".into(),
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))),
            )),
            Self::Callable(provider) => Some(("Authorization".into(), format!("Bearer {}", provider()))),
        }
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
            Self::ApiKey { header, .. } => f.debug_struct("ApiKey").field("header", header).finish_non_exhaustive(),
            Self::Basic { username, .. } => f.debug_struct("Basic").field("username", username).finish_non_exhaustive(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Frozen configuration for one spec registration.
#[derive(Clone)]
pub struct CommandConfiguration {
    spec: SpecSource,
    namespace: Option<String>,
    base_url: Option<String>,
    auth: AuthStrategy,
    cache: Option<CachePolicy>,
    output: OutputPreferences,
    follow_redirects: bool,
    naming: CommandNaming,
    on_error: Option<ErrorHook>,
    banner: Option<BannerHook>,
}

impl CommandConfiguration {
    pub fn builder(spec: SpecSource) -> ConfigBuilder {
        ConfigBuilder::new(spec)
    }

    pub fn spec(&self) -> &SpecSource {
        &self.spec
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    pub fn cache(&self) -> Option<&CachePolicy> {
        self.cache.as_ref()
    }

    pub fn output(&self) -> OutputPreferences {
        self.output
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn naming(&self) -> CommandNaming {
        self.naming
    }

    pub fn on_error(&self) -> Option<&ErrorHook> {
        self.on_error.as_ref()
    }

    pub fn banner(&self) -> Option<&BannerHook> {
        self.banner.as_ref()
    }
}

impl fmt::Debug for CommandConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandConfiguration")
            .field("spec", &self.spec)
            .field("namespace", &self.namespace)
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("cache", &self.cache)
            .field("output", &self.output)
            .field("follow_redirects", &self.follow_redirects)
            .field("naming", &self.naming)
            .field("on_error", &self.on_error.is_some())
            .field("banner", &self.banner.is_some())
            .finish()
    }
}

/// Builder for [`CommandConfiguration`].
///
/// Several auth methods may be set; `build` keeps one by priority:
/// bearer, API key, basic, callable.
#[must_use]
pub struct ConfigBuilder {
    spec: SpecSource,
    namespace: Option<String>,
    base_url: Option<String>,
    bearer: Option<String>,
    api_key: Option<(String, String)>,
    basic: Option<(String, String)>,
    callable: Option<TokenProvider>,
    cache: Option<CachePolicy>,
    output: OutputPreferences,
    follow_redirects: bool,
    naming: CommandNaming,
    on_error: Option<ErrorHook>,
    banner: Option<BannerHook>,
}

impl ConfigBuilder {
    pub fn new(spec: SpecSource) -> Self {
        Self {
            spec,
            namespace: None,
            base_url: None,
            bearer: None,
            api_key: None,
            basic: None,
            callable: None,
            cache: None,
            output: OutputPreferences::default(),
            follow_redirects: false,
            naming: CommandNaming::default(),
            on_error: None,
            banner: None,
        }
    }

    /// Group the generated commands under `namespace` and add a `list` command.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Override the spec's server URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn api_key(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.api_key = Some((header.into(), value.into()));
        self
    }

    pub fn basic(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic = Some((username.into(), password.into()));
        self
    }

    /// Compute a bearer token for every request.
    pub fn auth_with<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.callable = Some(Arc::new(provider));
        self
    }

    /// Cache remote specs in `store` for `ttl`.
    pub fn cache(mut self, store: Arc<dyn SpecCache>, ttl: Duration) -> Self {
        self.cache = Some(CachePolicy::new(store, ttl));
        self
    }

    pub fn json(mut self) -> Self {
        self.output.json = true;
        self
    }

    pub fn yaml(mut self) -> Self {
        self.output.yaml = true;
        self
    }

    /// Minified JSON output; implies `json`.
    pub fn minify(mut self) -> Self {
        self.output.minify = true;
        self.output.json = true;
        self
    }

    pub fn show_html_body(mut self) -> Self {
        self.output.show_html_body = true;
        self
    }

    /// Fixed output width; without it `COLUMNS` is consulted.
    pub fn width(mut self, columns: usize) -> Self {
        self.output.width = Some(columns);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Set the command naming strategy.
    pub fn command_naming(mut self, naming: CommandNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HttpResponse, &CommandContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn banner<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.banner = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> CommandConfiguration {
        let auth = if let Some(token) = self.bearer {
            AuthStrategy::Bearer(token)
        } else if let Some((header, value)) = self.api_key {
            AuthStrategy::ApiKey { header, value }
        } else if let Some((username, password)) = self.basic {
            AuthStrategy::Basic { username, password }
        } else if let Some(provider) = self.callable {
            AuthStrategy::Callable(provider)
        } else {
            AuthStrategy::None
        };

        CommandConfiguration {
            spec: self.spec,
            namespace: self.namespace,
            base_url: self.base_url,
            auth,
            cache: self.cache,
            output: self.output,
            follow_redirects: self.follow_redirects,
            naming: self.naming,
            on_error: self.on_error,
            banner: self.banner,
        }
    }
}
