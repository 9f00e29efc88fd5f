//! Registry of spec registrations and the command tree they produce.
//!
//! Specs are registered up front; the registry then builds one clap
//! `Command` tree and routes parsed matches back to the right executor.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use clap::{ArgMatches, Command};
use tracing::{debug, info};

use crate::builder::{
    build_list_command, build_operation_command, render_listing, CommandDescriptor, CommandSet,
    LIST_COMMAND,
};
use crate::config::CommandConfiguration;
use crate::dispatch::{Outcome, RequestExecutor, RequestInput};
use crate::error::PlanError;
use crate::spec::OpenApiSpec;
use crate::transport::Transport;

/// One loaded spec with its planned commands.
#[derive(Debug)]
pub struct Registration {
    config: Arc<CommandConfiguration>,
    spec: OpenApiSpec,
    commands: CommandSet,
}

impl Registration {
    pub fn config(&self) -> &CommandConfiguration {
        &self.config
    }

    pub fn spec(&self) -> &OpenApiSpec {
        &self.spec
    }

    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }
}

/// Every registration of the process, built once before dispatch.
#[derive(Debug, Default)]
pub struct Registry {
    registrations: Vec<Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Load the configured spec and plan its commands.
    pub fn register(&mut self, config: CommandConfiguration) -> Result<(), PlanError> {
        let spec = OpenApiSpec::load(config.spec(), config.cache())?;
        self.register_spec(config, spec)
    }

    /// Plan commands for an already loaded spec.
    pub fn register_spec(
        &mut self,
        config: CommandConfiguration,
        spec: OpenApiSpec,
    ) -> Result<(), PlanError> {
        let commands = CommandSet::plan(&spec, config.naming(), config.namespace().is_some())?;

        let mut taken = self.top_level_names();
        let new_names: Vec<(String, String)> = match config.namespace() {
            Some(ns) => vec![(ns.to_string(), format!("namespace '{ns}'"))],
            None => commands
                .descriptors()
                .iter()
                .map(|d| (d.name.clone(), format!("{} {}", d.method, d.path)))
                .collect(),
        };
        for (name, origin) in new_names {
            if let Some(first) = taken.insert(name.clone(), origin.clone()) {
                return Err(PlanError::DuplicateCommand {
                    name,
                    first,
                    second: origin,
                });
            }
        }

        info!(
            spec = %config.spec(),
            namespace = config.namespace().unwrap_or("-"),
            commands = commands.descriptors().len(),
            "registered spec"
        );
        self.registrations.push(Registration {
            config: Arc::new(config),
            spec,
            commands,
        });
        Ok(())
    }

    fn top_level_names(&self) -> HashMap<String, String> {
        let mut names = HashMap::new();
        for reg in &self.registrations {
            match reg.config.namespace() {
                Some(ns) => {
                    names.insert(ns.to_string(), format!("namespace '{ns}'"));
                }
                None => {
                    for d in reg.commands.descriptors() {
                        names.insert(d.name.clone(), format!("{} {}", d.method, d.path));
                    }
                }
            }
        }
        names
    }

    /// Build the root command. Namespaced registrations become subcommand groups.
    pub fn command(&self, name: &str, about: &str) -> Command {
        let mut root = Command::new(name.to_string())
            .about(about.to_string())
            .subcommand_required(true)
            .arg_required_else_help(true);

        for reg in &self.registrations {
            match reg.config.namespace() {
                Some(ns) => {
                    let mut group = Command::new(ns.to_string())
                        .about(format!("Commands generated from {}", reg.config.spec()))
                        .subcommand_required(true)
                        .arg_required_else_help(true)
                        .subcommand(build_list_command());
                    for d in reg.commands.descriptors() {
                        group = group.subcommand(build_operation_command(d));
                    }
                    root = root.subcommand(group);
                }
                None => {
                    for d in reg.commands.descriptors() {
                        root = root.subcommand(build_operation_command(d));
                    }
                }
            }
        }
        root
    }

    /// Run the subcommand selected in `matches` and return the exit code.
    pub fn run(
        &self,
        matches: &ArgMatches,
        transport: &dyn Transport,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<i32> {
        let Some((name, sub)) = matches.subcommand() else {
            writeln!(err, "Error: no command given")?;
            return Ok(2);
        };

        if let Some(reg) = self
            .registrations
            .iter()
            .find(|r| r.config.namespace() == Some(name))
        {
            let Some((cmd, cmd_matches)) = sub.subcommand() else {
                writeln!(err, "Error: no command given for namespace '{name}'")?;
                return Ok(2);
            };
            if cmd == LIST_COMMAND {
                return list(reg, cmd_matches, out, err);
            }
            return invoke(reg, cmd, cmd_matches, transport, out, err);
        }

        match self
            .registrations
            .iter()
            .filter(|r| r.config.namespace().is_none())
            .find(|r| r.commands.find(name).is_some())
        {
            Some(reg) => invoke(reg, name, sub, transport, out, err),
            None => {
                writeln!(err, "Error: unknown command '{name}'")?;
                Ok(2)
            }
        }
    }
}

fn invoke(
    reg: &Registration,
    name: &str,
    matches: &ArgMatches,
    transport: &dyn Transport,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<i32> {
    let Some(descriptor) = reg.commands.find(name) else {
        writeln!(err, "Error: unknown command '{name}'")?;
        return Ok(2);
    };
    debug!(command = %descriptor.name, "dispatching");

    let input = RequestInput::from_matches(descriptor, matches);
    let width = reg.config.output().width.or_else(terminal_width);
    let executor = RequestExecutor::new(&reg.config, &reg.spec, transport).with_width(width);
    match executor.execute(descriptor, &input) {
        Ok(outcome) => {
            match &outcome {
                Outcome::Success { output } => writeln!(out, "{output}")?,
                Outcome::HttpFailure { output: Some(output), .. } => writeln!(err, "{output}")?,
                Outcome::HttpFailure { output: None, .. } => {}
            }
            Ok(outcome.exit_code())
        }
        Err(e) => {
            writeln!(err, "Error: {e}")?;
            Ok(1)
        }
    }
}

fn list(
    reg: &Registration,
    matches: &ArgMatches,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<i32> {
    let as_json = matches.get_flag("json");
    if let Some(banner) = reg.config.banner() {
        // Keep stdout parseable when listing as JSON
        let target: &mut dyn Write = if as_json { &mut *err } else { &mut *out };
        writeln!(target, "{}", banner())?;
    }

    let listing = match matches.get_one::<String>("path") {
        Some(path) => {
            let routable = routable(&reg.commands, path);
            if routable.is_empty() {
                writeln!(err, "Error: no command matches path {path}")?;
                return Ok(1);
            }
            routable
        }
        None => reg.commands.listing(),
    };

    if as_json {
        let text = serde_json::to_string_pretty(&listing).map_err(io::Error::other)?;
        writeln!(out, "{text}")?;
    } else {
        writeln!(out, "{}", render_listing(&listing))?;
    }
    Ok(0)
}

/// Descriptors whose template accepts `path`, exact templates first.
fn routable<'a>(commands: &'a CommandSet, path: &str) -> Vec<&'a CommandDescriptor> {
    let listing = commands.listing();
    let mut selected = Vec::new();
    for route in commands.matching_routes(path) {
        selected.extend(listing.iter().copied().filter(|d| d.path == route.path));
    }
    selected
}

/// Width from the `COLUMNS` environment variable, if set.
pub fn terminal_width() -> Option<usize> {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|w| *w > 0)
}
