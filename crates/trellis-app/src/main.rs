use std::env;
use std::io::{self, BufRead};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn};
use trellis_host::logging::{self, TRACE_FILE};
use trellis_host::{
    channel_transport, Collaborators, FolderResolver, FrameClock, Host, MessageBus, OptionsBuilder,
    ProcessContext, ResourceRoots, TracingObserver, TransportPeer, WindowGeometry,
};

mod headless;
mod plugins;

use headless::{HeadlessGraphics, HeadlessUi, HeadlessWindow};

#[derive(Debug, Parser)]
#[command(author, version, about = "Trellis plugin host")]
struct Cli {
    /// Start in fullscreen mode (window geometry is never saved)
    #[arg(long)]
    fullscreen: bool,

    /// Plugin to start with; prefix with `_` to keep it from becoming the default
    #[arg(long)]
    startup_plugin: Option<String>,

    /// Keep per-user files in the working directory
    #[arg(long)]
    ignore_user_local: bool,

    /// Copy the front buffer before drawing when the backend redraws dirty rectangles only
    #[arg(long)]
    copy_pixels: Option<bool>,

    /// Extra option as key=value; may be repeated and overrides config files
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Number of frames to run before closing the headless window
    #[arg(long, default_value_t = 120)]
    frames: u64,

    /// Run until the window is closed instead of after --frames
    #[arg(long)]
    unbounded: bool,

    /// Delay between headless frames in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_interval_ms: u64,

    /// Developer mode: read dev.cfg and show the null plugin in the chooser
    #[arg(long)]
    dev: bool,

    /// Search for the resource root from this directory instead of the executable's
    #[arg(long)]
    root: Option<PathBuf>,

    /// Read wire-form messages from stdin, one line at a time
    #[arg(long)]
    messages_from_stdin: bool,

    /// List the built-in plugins and exit
    #[arg(long)]
    list_plugins: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.list_plugins {
        let bus: MessageBus<()> = MessageBus::new();
        let registry = plugins::builtin_registry(Path::new("."), &bus.sender());
        println!("Built-in plugins:");
        for descriptor in registry.enumerate() {
            println!("  - {}", descriptor.name());
        }
        return;
    }

    let roots = match resolve_roots(&cli) {
        Ok(roots) => roots,
        Err(err) => {
            eprintln!("trellis: {err:#}");
            process::abort();
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| run(cli, roots))) {
        Ok(Ok(frames)) => {
            info!(frames, "clean exit");
        }
        Ok(Err(err)) => {
            error!("fatal: {err:#}");
            process::abort();
        }
        Err(_) => {
            error!("fatal: panic escaped the frame loop");
            process::abort();
        }
    }
}

fn resolve_roots(cli: &Cli) -> anyhow::Result<ResourceRoots> {
    let resolver = FolderResolver::new();
    let roots = match &cli.root {
        Some(start) => resolver.resolve(start),
        None => resolver.resolve_from_executable(),
    }
    .context("cannot find the resource root")?;
    Ok(roots)
}

fn run(cli: Cli, roots: ResourceRoots) -> anyhow::Result<u64> {
    let app_root = roots.app_root().to_path_buf();
    let chdir = env::set_current_dir(&app_root);
    let trace_file = logging::init(Some(Path::new(TRACE_FILE)));
    if let Err(err) = chdir {
        warn!(%err, root = %app_root.display(), "cannot enter the application root");
    }
    debug!(trace = ?trace_file, "logging ready");
    info!(root = %app_root.display(), ui = %roots.ui_entry.display(), "resource root found");

    let mut builder = OptionsBuilder::new();
    builder
        .load_folder(&roots.options_folder, cli.dev)
        .context("failed to load configuration")?;
    apply_cli(&mut builder, &cli)?;
    let options = builder.build();
    debug!(options = %options.to_json(), "options");

    let process = ProcessContext::new(roots, options, cli.dev);
    let (transport, peer) = channel_transport();
    if cli.messages_from_stdin {
        spawn_stdin_reader(peer);
    }

    let frames = (!cli.unbounded).then_some(cli.frames);
    let collaborators = Collaborators {
        window: Box::new(HeadlessWindow::new(
            WindowGeometry::new(100, 100, 640, 480),
            frames,
            Duration::from_millis(cli.frame_interval_ms),
        )),
        graphics: Box::new(HeadlessGraphics::default()),
        ui: Box::new(HeadlessUi::new()),
        console: None,
        transport: Some(Box::new(transport)),
    };

    let bus = MessageBus::new();
    let registry = plugins::builtin_registry(&app_root, &bus.sender());
    info!(plugins = registry.len(), "plugins registered");

    let mut host = Host::new(bus, process, registry, collaborators)
        .with_clock(FrameClock::wall())
        .with_observer(TracingObserver);
    plugins::register_vars(host.vars_mut());

    let frames = host.run()?;
    Ok(frames)
}

fn apply_cli(builder: &mut OptionsBuilder, cli: &Cli) -> anyhow::Result<()> {
    if cli.fullscreen {
        builder.set("fullscreen", "1");
    }
    if cli.ignore_user_local {
        builder.set("ignoreUserLocal", "1");
    }
    if let Some(copy) = cli.copy_pixels {
        builder.set("copyPixels", if copy { "1" } else { "0" });
    }
    if let Some(plugin) = &cli.startup_plugin {
        builder.set("startupPlugin", plugin.as_str());
    }
    for pair in &cli.set {
        builder.set_pair(pair)?;
    }
    Ok(())
}

fn spawn_stdin_reader(peer: TransportPeer) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if peer.to_host.send(line).is_err() {
                break;
            }
        }
    });
}
