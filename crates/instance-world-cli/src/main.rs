// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless driver for instance worlds.
//!
//! Builds one or more instances from JSON templates on disk, ticks the host,
//! disposes every instance and writes a JSON summary to stdout.
//!
//! ```text
//! instance-world --templates ./templates --template Scenes/Showcase \
//!     --instances 2 --shared-context --ticks 30 --stream Scenes/Showcase_Sub
//! ```

mod config;
mod templates;

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use instance_world::{Host, InstanceWorld, OwningContext, TeardownReport, WorldOptions};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigService, FsConfigStore, OptionsFile};
use crate::templates::DirTemplateSource;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build, tick and dispose isolated instance worlds")]
struct Args {
    /// Directory holding `<package>.json` template files
    #[arg(long)]
    templates: PathBuf,
    /// Template package or object path to instantiate (empty graph if omitted)
    #[arg(long)]
    template: Option<String>,
    /// Options file (flat options plus extension packages)
    #[arg(long)]
    options: Option<PathBuf>,
    /// Number of instances to build
    #[arg(long, default_value_t = 1)]
    instances: usize,
    /// Put every instance under one shared owning context
    #[arg(long)]
    shared_context: bool,
    /// Update ticks to run before disposing
    #[arg(long, default_value_t = 1)]
    ticks: usize,
    /// Seconds per tick
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,
    /// Streaming level to request on every instance (repeatable)
    #[arg(long)]
    stream: Vec<String>,
    /// Treat the host as an editor/offline context
    #[arg(long)]
    editor: bool,
}

#[derive(Debug, Serialize)]
struct TeardownSummary {
    performed: bool,
    released_holds: usize,
    cancelled_streams: usize,
    unloaded_streams: usize,
    marked_packages: usize,
    forced_collection: bool,
}

impl From<&TeardownReport> for TeardownSummary {
    fn from(report: &TeardownReport) -> Self {
        Self {
            performed: report.performed,
            released_holds: report.released_holds.len(),
            cancelled_streams: report.cancelled_streams,
            unloaded_streams: report.unloaded_streams,
            marked_packages: report.marked_packages,
            forced_collection: report.forced_collection,
        }
    }
}

#[derive(Debug, Serialize)]
struct InstanceSummary {
    id: u64,
    graph: String,
    from_template: bool,
    registered: Vec<String>,
    teardown: TeardownSummary,
}

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    instances: Vec<InstanceSummary>,
    ticks: usize,
    graphs_updated: usize,
    timers_fired: usize,
    deferred_run: usize,
    levels_streamed: usize,
    collections: usize,
    leftover_packages: Vec<String>,
}

fn load_options(args: &Args) -> Result<WorldOptions> {
    let mut options = WorldOptions::new();
    if let Some(path) = &args.options {
        let (store, key) = FsConfigStore::for_file(path)
            .ok_or_else(|| anyhow!("options path has no file name: {}", path.display()))?;
        let file: Option<OptionsFile> = ConfigService::new(store)
            .load(&key)
            .with_context(|| format!("read options file {}", path.display()))?;
        match file {
            Some(file) => {
                file.apply_to(&mut options);
            }
            None => warn!(path = %path.display(), "options file missing; using defaults"),
        }
    }
    if let Some(template) = &args.template {
        options.template = Some(template.clone());
    }
    Ok(options)
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let options = load_options(&args)?;
    let mut host = Host::new(DirTemplateSource::new(&args.templates)).with_editor(args.editor);
    let session = args
        .shared_context
        .then(|| OwningContext::new("cli-session").into_handle());

    let mut worlds: Vec<InstanceWorld> = Vec::with_capacity(args.instances);
    for _ in 0..args.instances {
        let mut instance_options = options.clone();
        if let Some(session) = &session {
            instance_options = instance_options.with_owning_context(Rc::clone(session));
        }
        let world = match InstanceWorld::new(&mut host, instance_options) {
            Ok(world) => world,
            Err(err) => {
                for mut built in worlds {
                    built.dispose(&mut host);
                }
                return Err(anyhow::Error::new(err)
                    .context(format!("build instance from {:?}", options.template)));
            }
        };
        if let Some(graph) = world.graph() {
            let mut g = graph.borrow_mut();
            for package in &args.stream {
                if !g.request_stream_in(package) {
                    warn!(instance = %world.id(), package, "no streaming slot for package");
                }
            }
        }
        worlds.push(world);
    }
    info!(instances = worlds.len(), ticks = args.ticks, "instances running");

    let mut summary = RunSummary {
        ticks: args.ticks,
        ..RunSummary::default()
    };
    for _ in 0..args.ticks {
        let report = host.tick(args.dt);
        summary.graphs_updated += report.graphs_updated;
        summary.timers_fired += report.timers_fired.len();
        summary.deferred_run += report.deferred_run.len();
        summary.levels_streamed += report.levels_streamed;
    }

    for mut world in worlds {
        let graph = world
            .graph()
            .map(|g| g.borrow().name().to_owned())
            .unwrap_or_default();
        let registered = host.registry().entries_for(world.id());
        let report = world.dispose(&mut host);
        summary.instances.push(InstanceSummary {
            id: world.id().get(),
            graph,
            from_template: world.was_loaded_from_template(),
            registered,
            teardown: TeardownSummary::from(&report),
        });
    }
    summary.collections = host.collections();
    summary.leftover_packages = host.packages().names().map(str::to_owned).collect();

    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &summary).context("write summary")?;
    writeln!(out)?;
    Ok(())
}
