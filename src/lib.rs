//! Auto-generate clap CLI commands from OpenAPI specs.
//!
//! Loads an OpenAPI 3 document (JSON or YAML, file or URL), plans one command
//! per operation, builds a clap `Command` tree and executes the selected
//! operation over HTTP, rendering the response for a terminal.
//!
//! # Usage
//!
//! ```no_run
//! use openapi_cmd::{CommandConfiguration, Registry, ReqwestTransport, SpecSource};
//!
//! let config = CommandConfiguration::builder(SpecSource::parse("petstore.yaml"))
//!     .namespace("pets")
//!     .bearer("secret")
//!     .build();
//!
//! let mut registry = Registry::new();
//! registry.register(config)?;
//!
//! let matches = registry.command("petctl", "Petstore CLI").get_matches();
//! let transport = ReqwestTransport::new()?;
//! let code = registry.run(&matches, &transport, &mut std::io::stdout(), &mut std::io::stderr())?;
//! std::process::exit(code);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod matcher;
pub mod naming;
pub mod output;
pub mod registry;
pub mod resolve;
pub mod spec;
pub mod transport;

pub use builder::{CommandDescriptor, CommandSet, OptionSpec};
pub use cache::{CachePolicy, FileCache, SpecCache};
pub use config::{
    AuthStrategy, CommandConfiguration, CommandNaming, ConfigBuilder, OutputPreferences,
};
pub use dispatch::{CommandContext, Outcome, RequestExecutor, RequestInput};
pub use error::{DispatchError, PlanError, ReferenceError, SpecError};
pub use format::{HumanReadableFormatter, Shape};
pub use matcher::{convert_to_regex, match_path, RouteMatch};
pub use registry::{Registration, Registry};
pub use spec::{ApiOperation, OpenApiSpec, Param, SpecSource};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

// Re-export dependencies for downstream crates
pub use clap;
pub use reqwest;
