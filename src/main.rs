use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use openapi_cmd::{
    CommandConfiguration, CommandNaming, ConfigBuilder, FileCache, Registry, ReqwestTransport,
    SpecSource,
};

const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout only carries command output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().collect();

    // The command tree depends on the spec, so read the settings first.
    let settings = Command::new("openapi-cmd")
        .args(settings_args())
        .ignore_errors(true)
        .allow_external_subcommands(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .disable_help_subcommand(true)
        .try_get_matches_from(&args)
        .context("failed to parse settings")?;

    let Some(spec) = settings.get_one::<String>("spec") else {
        bail!("no spec given: pass --spec <PATH|URL> or set OPENAPI_CMD_SPEC");
    };

    let mut registry = Registry::new();
    let config = configure(CommandConfiguration::builder(SpecSource::parse(spec)), &settings);
    registry
        .register(config.build())
        .with_context(|| format!("failed to load commands from {spec}"))?;

    let matches = registry
        .command("openapi-cmd", "Run OpenAPI operations from the command line")
        .version(env!("CARGO_PKG_VERSION"))
        .args(settings_args())
        .get_matches_from(&args);

    let transport = ReqwestTransport::new().context("failed to build HTTP client")?;
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    let code = registry.run(&matches, &transport, &mut stdout, &mut stderr)?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

fn configure(mut builder: ConfigBuilder, settings: &ArgMatches) -> ConfigBuilder {
    if let Some(namespace) = settings.get_one::<String>("namespace") {
        builder = builder.namespace(namespace.clone());
    }
    if let Some(url) = settings.get_one::<String>("base-url") {
        builder = builder.base_url(url.clone());
    }
    if let Some(token) = settings.get_one::<String>("token") {
        builder = builder.bearer(token.clone());
    }
    if settings.get_flag("operation-ids") {
        builder = builder.command_naming(CommandNaming::OperationId);
    }
    if let Some(dir) = settings.get_one::<PathBuf>("cache-dir") {
        let ttl = settings
            .get_one::<u64>("cache-ttl")
            .copied()
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);
        builder = builder.cache(Arc::new(FileCache::new(dir.clone())), Duration::from_secs(ttl));
    }
    if let Some(width) = settings.get_one::<usize>("width") {
        builder = builder.width(*width);
    }
    builder.follow_redirects(settings.get_flag("follow-redirects"))
}

fn settings_args() -> Vec<Arg> {
    vec![
        Arg::new("spec")
            .long("spec")
            .env("OPENAPI_CMD_SPEC")
            .value_name("PATH|URL")
            .help("OpenAPI document (.json, .yaml or http(s) URL)"),
        Arg::new("base-url")
            .long("base-url")
            .env("OPENAPI_CMD_BASE_URL")
            .value_name("URL")
            .help("Override the spec's server URL"),
        Arg::new("token")
            .long("token")
            .env("OPENAPI_CMD_TOKEN")
            .hide_env_values(true)
            .value_name("TOKEN")
            .help("Bearer token sent with every request"),
        Arg::new("namespace")
            .long("namespace")
            .value_name("NAME")
            .help("Group commands under NAME and add a list command"),
        Arg::new("operation-ids")
            .long("operation-ids")
            .help("Name commands after operationId instead of method and path")
            .action(ArgAction::SetTrue),
        Arg::new("follow-redirects")
            .long("follow-redirects")
            .help("Follow HTTP redirects")
            .action(ArgAction::SetTrue),
        Arg::new("width")
            .long("width")
            .value_name("COLUMNS")
            .value_parser(value_parser!(usize))
            .help("Output width for tables [default: $COLUMNS]"),
        Arg::new("cache-dir")
            .long("cache-dir")
            .env("OPENAPI_CMD_CACHE_DIR")
            .value_name("DIR")
            .value_parser(value_parser!(PathBuf))
            .help("Cache remote specs in DIR"),
        Arg::new("cache-ttl")
            .long("cache-ttl")
            .value_name("SECONDS")
            .value_parser(value_parser!(u64))
            .help("Lifetime of cached remote specs [default: 3600]"),
    ]
}
